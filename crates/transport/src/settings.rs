//! Transport configuration and the fixed paths of the backend protocol.

use std::time::Duration;

use model::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Standalone backend address used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Address of the host's own web server.
pub const DEFAULT_HOST_URL: &str = "http://localhost:8000";

/// Route under which the backend is mounted when it runs as a host plugin.
pub const DEFAULT_PLUGIN_MOUNT: &str = "/api/plugins/st-manager";

/// Version prefix carried by every backend path. The host-plugin mount does not
/// replicate it.
pub const VERSION_PREFIX: &str = "/api/v2";

/// Health path of a standalone backend.
pub const STANDALONE_HEALTH_PATH: &str = "/api/v2/health";

/// Health path relative to the host-plugin mount.
pub const PLUGIN_HEALTH_PATH: &str = "/health";

/// Host endpoint that issues the CSRF token required on mutating host requests.
pub const CSRF_TOKEN_PATH: &str = "/csrf-token";

/// Connection settings shared by the resolver, the request client and the host
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Base URL of a standalone backend (no trailing slash).
    pub backend_url: String,
    /// Base URL of the host's own web server (no trailing slash).
    pub host_url: String,
    /// Mount point of the backend when it runs as a host plugin.
    pub plugin_mount: String,
    /// Deadline for every resource and backup request.
    pub request_timeout_secs: u64,
    /// Deadline for each health probe during detection.
    pub health_timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            host_url: DEFAULT_HOST_URL.to_string(),
            plugin_mount: DEFAULT_PLUGIN_MOUNT.to_string(),
            request_timeout_secs: 30,
            health_timeout_secs: 5,
        }
    }
}

impl TransportSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// Validates every field and returns a copy with URLs and the mount point
    /// in canonical form.
    pub fn normalized(&self) -> ClientResult<Self> {
        if self.request_timeout_secs == 0 || self.health_timeout_secs == 0 {
            return Err(ClientError::InvalidConfiguration {
                message: "timeouts must be at least one second".to_string(),
            });
        }
        Ok(Self {
            backend_url: normalize_base_url(&self.backend_url)?,
            host_url: normalize_base_url(&self.host_url)?,
            plugin_mount: normalize_mount(&self.plugin_mount)?,
            request_timeout_secs: self.request_timeout_secs,
            health_timeout_secs: self.health_timeout_secs,
        })
    }
}

/// Checks that `raw` is an absolute http(s) URL and strips trailing slashes so
/// paths can be appended directly.
pub fn normalize_base_url(raw: &str) -> ClientResult<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| ClientError::InvalidConfiguration {
        message: format!("invalid base URL '{trimmed}': {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ClientError::InvalidConfiguration {
            message: format!("base URL '{trimmed}' must be an http or https address"),
        });
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(ClientError::InvalidConfiguration {
            message: format!("base URL '{trimmed}' must not carry a query or fragment"),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn normalize_mount(raw: &str) -> ClientResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !trimmed.starts_with('/') {
        return Err(ClientError::InvalidConfiguration {
            message: format!("plugin mount '{raw}' must start with '/'"),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slashes_are_trimmed() {
        assert_eq!(
            normalize_base_url("http://127.0.0.1:5000//").unwrap(),
            "http://127.0.0.1:5000"
        );
        assert_eq!(
            normalize_base_url(" https://st.example/base/ ").unwrap(),
            "https://st.example/base"
        );
    }

    #[test]
    fn test_non_http_urls_are_rejected() {
        for bad in ["localhost:5000", "ftp://host", "not a url", "http://host/?a=1"] {
            assert!(
                matches!(normalize_base_url(bad), Err(ClientError::InvalidConfiguration { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_defaults_normalize_cleanly() {
        let settings = TransportSettings::default().normalized().unwrap();
        assert_eq!(settings, TransportSettings::default());
    }

    #[test]
    fn test_mount_must_be_absolute() {
        let settings = TransportSettings {
            plugin_mount: "api/plugins/x".to_string(),
            ..Default::default()
        };
        assert!(settings.normalized().is_err());

        let settings = TransportSettings {
            plugin_mount: "/api/plugins/x/".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.normalized().unwrap().plugin_mount, "/api/plugins/x");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let settings = TransportSettings {
            health_timeout_secs: 0,
            ..Default::default()
        };
        assert!(settings.normalized().is_err());
    }
}
