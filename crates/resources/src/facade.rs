//! Per-family strategy selection.
//!
//! Each family is bound once, at construction, to either the host's native
//! implementation or the REST fallback. Both implement the same port trait, so
//! callers hold an `Arc<dyn ...Api>` and never learn which one answered.

use std::fmt;
use std::sync::Arc;

use model::{CharacterApi, HostCapabilities, PresetApi, RegexScriptApi, WorldbookApi};
use serde::Serialize;
use tracing::info;
use transport::RequestClient;

use crate::character::RestCharacters;
use crate::preset::RestPresets;
use crate::regex_script::RestRegexScripts;
use crate::worldbook::RestWorldbooks;

/// Which implementation serves a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Native,
    Rest,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Rest => write!(f, "rest"),
        }
    }
}

/// A bound implementation together with how it was chosen.
pub struct Strategy<T: ?Sized> {
    kind: StrategyKind,
    api: Arc<T>,
}

impl<T: ?Sized> Strategy<T> {
    /// Prefers `native` when the host supplied one.
    pub fn select(native: Option<Arc<T>>, rest: impl FnOnce() -> Arc<T>) -> Self {
        match native {
            Some(api) => Self {
                kind: StrategyKind::Native,
                api,
            },
            None => Self {
                kind: StrategyKind::Rest,
                api: rest(),
            },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn api(&self) -> &Arc<T> {
        &self.api
    }
}

impl<T: ?Sized> Clone for Strategy<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            api: Arc::clone(&self.api),
        }
    }
}

/// The strategy chosen for every family, as reported by `stm status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub character: StrategyKind,
    pub worldbook: StrategyKind,
    pub preset: StrategyKind,
    pub regex_script: StrategyKind,
}

impl CapabilitySet {
    pub fn of(capabilities: &HostCapabilities) -> Self {
        fn kind<T: ?Sized>(native: &Option<Arc<T>>) -> StrategyKind {
            if native.is_some() {
                StrategyKind::Native
            } else {
                StrategyKind::Rest
            }
        }
        Self {
            character: kind(&capabilities.character),
            worldbook: kind(&capabilities.worldbook),
            preset: kind(&capabilities.preset),
            regex_script: kind(&capabilities.regex_script),
        }
    }
}

/// Uniform entry point for the four host resource families.
#[derive(Clone)]
pub struct ResourceFacade {
    characters: Strategy<dyn CharacterApi>,
    worldbooks: Strategy<dyn WorldbookApi>,
    presets: Strategy<dyn PresetApi>,
    regex_scripts: Strategy<dyn RegexScriptApi>,
}

impl ResourceFacade {
    pub fn new(capabilities: &HostCapabilities, client: RequestClient) -> Self {
        let facade = Self {
            characters: Strategy::select(capabilities.character.clone(), || {
                Arc::new(RestCharacters::new(client.clone())) as Arc<dyn CharacterApi>
            }),
            worldbooks: Strategy::select(capabilities.worldbook.clone(), || {
                Arc::new(RestWorldbooks::new(client.clone())) as Arc<dyn WorldbookApi>
            }),
            presets: Strategy::select(capabilities.preset.clone(), || {
                Arc::new(RestPresets::new(client.clone())) as Arc<dyn PresetApi>
            }),
            regex_scripts: Strategy::select(capabilities.regex_script.clone(), || {
                Arc::new(RestRegexScripts::new(client.clone())) as Arc<dyn RegexScriptApi>
            }),
        };
        let chosen = facade.capabilities();
        info!(
            character = %chosen.character,
            worldbook = %chosen.worldbook,
            preset = %chosen.preset,
            regex_script = %chosen.regex_script,
            "resource strategies selected"
        );
        facade
    }

    pub fn characters(&self) -> &dyn CharacterApi {
        self.characters.api().as_ref()
    }

    pub fn worldbooks(&self) -> &dyn WorldbookApi {
        self.worldbooks.api().as_ref()
    }

    pub fn presets(&self) -> &dyn PresetApi {
        self.presets.api().as_ref()
    }

    pub fn regex_scripts(&self) -> &dyn RegexScriptApi {
        self.regex_scripts.api().as_ref()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            character: self.characters.kind(),
            worldbook: self.worldbooks.kind(),
            preset: self.presets.kind(),
            regex_script: self.regex_scripts.kind(),
        }
    }
}
