//! Port traits implemented by the host runtime and by the REST strategies.
//!
//! Each resource family has one trait. A host that natively supports a family
//! hands an implementation to [`HostCapabilities`]; families it leaves empty are
//! served by the REST fallback in the `resources` crate, which implements the
//! very same trait. Callers cannot tell the two apart.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    ApiName, CharacterData, CharacterId, CharacterInfo, CharacterPatch, ClientResult,
    PresetData, PresetInfo, PresetName, PresetPatch, RegexScriptData, RegexScriptId,
    RegexScriptInfo, RegexScriptPatch, WorldbookData, WorldbookEntry, WorldbookEntryId,
    WorldbookEntryPatch, WorldbookInfo, WorldbookName,
};

/// Character card operations.
#[async_trait]
pub trait CharacterApi: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<CharacterInfo>>;

    /// Returns `Ok(None)` when the host confirms the card does not exist.
    async fn get(&self, id: &CharacterId) -> ClientResult<Option<CharacterData>>;

    /// Creates a card and returns the identity the host assigned to it.
    async fn create(&self, data: &CharacterData) -> ClientResult<CharacterId>;

    async fn update(&self, id: &CharacterId, patch: &CharacterPatch) -> ClientResult<()>;

    async fn delete(&self, id: &CharacterId) -> ClientResult<()>;
}

/// Worldbook (lorebook) operations.
#[async_trait]
pub trait WorldbookApi: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<WorldbookInfo>>;

    /// Returns `Ok(None)` when the host confirms the worldbook does not exist.
    async fn get(&self, name: &WorldbookName) -> ClientResult<Option<WorldbookData>>;

    /// Adds an entry and returns the `uid` the host assigned to it.
    async fn create_entry(
        &self,
        book: &WorldbookName,
        entry: &WorldbookEntry,
    ) -> ClientResult<WorldbookEntryId>;

    async fn update_entry(
        &self,
        book: &WorldbookName,
        entry: WorldbookEntryId,
        patch: &WorldbookEntryPatch,
    ) -> ClientResult<()>;

    async fn delete_entry(&self, book: &WorldbookName, entry: WorldbookEntryId) -> ClientResult<()>;
}

/// Generation preset operations.
#[async_trait]
pub trait PresetApi: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<PresetInfo>>;

    async fn get(&self, name: &PresetName, api: &ApiName) -> ClientResult<Option<PresetData>>;

    async fn update(&self, name: &PresetName, patch: &PresetPatch) -> ClientResult<()>;
}

/// Regex script operations.
#[async_trait]
pub trait RegexScriptApi: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<RegexScriptInfo>>;

    async fn get(&self, id: &RegexScriptId) -> ClientResult<Option<RegexScriptData>>;

    async fn update(&self, id: &RegexScriptId, patch: &RegexScriptPatch) -> ClientResult<()>;

    async fn delete(&self, id: &RegexScriptId) -> ClientResult<()>;
}

/// The native capabilities a host exposes, resolved once when the client is
/// built. A `None` family is served over REST.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    pub character: Option<Arc<dyn CharacterApi>>,
    pub worldbook: Option<Arc<dyn WorldbookApi>>,
    pub preset: Option<Arc<dyn PresetApi>>,
    pub regex_script: Option<Arc<dyn RegexScriptApi>>,
}

impl std::fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCapabilities")
            .field("character", &self.character.is_some())
            .field("worldbook", &self.worldbook.is_some())
            .field("preset", &self.preset.is_some())
            .field("regex_script", &self.regex_script.is_some())
            .finish()
    }
}

/// Supplies the extra headers the host requires on requests sent to its own
/// origin (session and CSRF tokens).
pub trait HeaderSource: Send + Sync {
    fn request_headers(&self) -> Vec<(String, String)>;
}

/// A header source that contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeaders;

impl HeaderSource for NoHeaders {
    fn request_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
