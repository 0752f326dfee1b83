//! Host resource families for the ST Manager client.
//!
//! Characters, worldbooks, presets and regex scripts are served either by the
//! host's native capability API or, when the host does not expose one, by its
//! REST endpoints with the wire payloads translated into the normalized DTOs
//! from [`model`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** [`ResourceFacade`] binds each family to a strategy
//! once; the REST strategies sequence calls to [`transport::RequestClient`] and
//! own the wire translation. Domain types and ports come from [`model`].

mod character;
mod facade;
mod preset;
mod regex_script;
mod wire;
mod worldbook;

pub use character::RestCharacters;
pub use facade::{CapabilitySet, ResourceFacade, Strategy, StrategyKind};
pub use preset::RestPresets;
pub use regex_script::RestRegexScripts;
pub use worldbook::RestWorldbooks;
