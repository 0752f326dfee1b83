//! Core domain for the ST Manager client.
//!
//! This crate contains every identifier, normalized DTO, error type and port
//! trait used throughout the client. Infrastructure crates implement the traits
//! defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate has no I/O dependencies.
//! It defines *what* callers see; the `transport`, `resources` and `backend`
//! crates define *how* it is fetched.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`CharacterId`, `WorldbookName`, etc.) |
//! | [`types`] | Normalized DTOs (characters, worldbooks, presets, regex scripts, backups) |
//! | [`errors`] | `ClientError` taxonomy and `RetryPolicy` |
//! | [`ports`] | Host capability traits and the header-source port |

pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ClientError, ClientResult, RetryPolicy};
pub use identifiers::{
    ApiName, BackupId, CharacterId, PresetName, RegexScriptId, RequestId, WorldbookEntryId,
    WorldbookName,
};
pub use ports::{
    CharacterApi, HeaderSource, HostCapabilities, NoHeaders, PresetApi, RegexScriptApi,
    WorldbookApi,
};
pub use types::{
    Acknowledgement, BackendStats, BackupInfo, BackupOptions, BackupResult, BackupSchedule,
    CharacterData, CharacterInfo, CharacterPatch, PresetData, PresetInfo, PresetPatch,
    RegexScriptData, RegexScriptInfo, RegexScriptPatch, ResourceKind, ScheduleKind, SyncOutcome,
    Timestamp, WorldbookData, WorldbookEntry, WorldbookEntryPatch, WorldbookInfo,
};
