//! The `stm` settings file.
//!
//! Lives at `<config dir>/st-manager/config.toml` unless `--config` says
//! otherwise. A missing file means defaults everywhere.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use transport::TransportSettings;

/// Output shape of the log stream on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// OTLP collector endpoint; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

/// How long resource commands wait for the host to come up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostReadySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for HostReadySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    }
}

impl HostReadySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    pub transport: TransportSettings,
    /// Backend URL saved by `stm set-url`. Takes precedence over
    /// `transport.backend_url`.
    pub backend_url_override: Option<String>,
    pub logging: LoggingSettings,
    pub host_ready: HostReadySettings,
}

/// Values supplied on the command line or through `STM_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub host_url: Option<String>,
    pub log_format: Option<LogFormat>,
    pub otlp_endpoint: Option<String>,
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("st-manager").join("config.toml"))
}

impl CliSettings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write settings to {}", path.display()))
    }

    /// Command-line values win over the saved override, which wins over the
    /// file's transport table.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.backend_url {
            self.backend_url_override = Some(url);
        }
        if let Some(url) = overrides.host_url {
            self.transport.host_url = url;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        if overrides.otlp_endpoint.is_some() {
            self.logging.otlp_endpoint = overrides.otlp_endpoint;
        }
    }

    /// Transport settings with the backend URL override folded in.
    pub fn effective_transport(&self) -> TransportSettings {
        let mut transport = self.transport.clone();
        if let Some(url) = &self.backend_url_override {
            transport.backend_url = url.clone();
        }
        transport
    }
}
