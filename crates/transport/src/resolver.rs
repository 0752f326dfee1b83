//! Backend transport detection and path rewriting.
//!
//! The backend can be reached in two ways: mounted as a plugin route inside the
//! host's own server, or as a standalone process at a configured base URL. The
//! [`TransportResolver`] probes both, in that order, and owns the single
//! [`TransportConfig`] that every backend request is routed through.
//!
//! ```text
//!   Unknown ──detect──► HostPlugin | Standalone | Unavailable
//!      ▲                          │
//!      └──────── set_base_url ────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use model::{ClientError, ClientResult, HeaderSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::http::{HttpRequest, HttpTransport};
use crate::settings::{
    normalize_base_url, TransportSettings, PLUGIN_HEALTH_PATH, STANDALONE_HEALTH_PATH,
    VERSION_PREFIX,
};

// ---------------------------------------------------------------------------
// Connection mode
// ---------------------------------------------------------------------------

/// Which transport currently serves backend requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Not yet detected, or invalidated by a base-URL change.
    Unknown,
    /// Backend mounted as a route inside the host server.
    HostPlugin,
    /// Backend running as its own process at the configured base URL.
    Standalone,
    /// Neither transport answered its health probe.
    Unavailable,
}

impl ConnectionMode {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::HostPlugin | Self::Standalone)
    }

    /// Applies this mode's path-rewrite rule to a backend path.
    ///
    /// In host-plugin mode the version prefix is stripped; other modes use the
    /// path unmodified. A path that merely starts with the same characters
    /// (`/api/v2x`) is not a prefix match.
    pub fn rewrite(self, path: &str) -> &str {
        if self != Self::HostPlugin {
            return path;
        }
        match path.strip_prefix(VERSION_PREFIX) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        }
    }
}

impl std::fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::HostPlugin => "host-plugin",
            Self::Standalone => "standalone",
            Self::Unavailable => "unavailable",
        })
    }
}

/// The configured standalone base URL and the current mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportConfig {
    pub base_url: String,
    pub mode: ConnectionMode,
}

/// Snapshot reported to lifecycle code polling the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub mode: ConnectionMode,
    pub connected: bool,
    /// Standalone base URL as configured.
    pub base_url: String,
    /// Where backend requests are actually sent, when connected.
    pub effective_base: Option<String>,
    /// Version reported by the backend's health endpoint.
    pub backend_version: Option<String>,
}

/// Where a backend request goes once the mode is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub mode: ConnectionMode,
    pub base: String,
    /// Whether `base` is on the host's origin (and so needs host headers).
    pub on_host_origin: bool,
}

impl Route {
    /// Joins the rewritten `path` onto the route's base.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base, self.mode.rewrite(path))
    }
}

#[derive(Debug, Deserialize)]
struct HealthPayload {
    status: String,
    #[serde(default)]
    version: Option<String>,
}

struct State {
    config: TransportConfig,
    /// Bumped by every `set_base_url`; detections started under an older epoch
    /// are discarded.
    epoch: u64,
    backend_version: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Owns [`TransportConfig`] and serializes detection.
///
/// Reads never block on detection. Overlapping [`check_connection`] calls
/// coalesce: a caller that arrives while a detection is in flight waits for it
/// and adopts its outcome instead of probing again.
///
/// [`check_connection`]: TransportResolver::check_connection
pub struct TransportResolver {
    transport: Arc<dyn HttpTransport>,
    headers: Arc<dyn HeaderSource>,
    host_url: String,
    plugin_mount: String,
    health_timeout: Duration,
    state: RwLock<State>,
    detection: tokio::sync::Mutex<()>,
    completed: AtomicU64,
}

impl TransportResolver {
    pub fn new(
        settings: &TransportSettings,
        transport: Arc<dyn HttpTransport>,
        headers: Arc<dyn HeaderSource>,
    ) -> ClientResult<Self> {
        let settings = settings.normalized()?;
        Ok(Self {
            transport,
            headers,
            host_url: settings.host_url.clone(),
            plugin_mount: settings.plugin_mount.clone(),
            health_timeout: settings.health_timeout(),
            state: RwLock::new(State {
                config: TransportConfig {
                    base_url: settings.backend_url,
                    mode: ConnectionMode::Unknown,
                },
                epoch: 0,
                backend_version: None,
            }),
            detection: tokio::sync::Mutex::new(()),
            completed: AtomicU64::new(0),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> ConnectionMode {
        self.read().config.mode
    }

    pub fn base_url(&self) -> String {
        self.read().config.base_url.clone()
    }

    /// Last detected connectivity. Does not probe.
    pub fn is_connected(&self) -> bool {
        self.mode().is_connected()
    }

    /// Base URL of the host-plugin mount.
    pub fn plugin_base(&self) -> String {
        format!("{}{}", self.host_url, self.plugin_mount)
    }

    pub fn status(&self) -> ConnectionStatus {
        let state = self.read();
        let mode = state.config.mode;
        ConnectionStatus {
            mode,
            connected: mode.is_connected(),
            base_url: state.config.base_url.clone(),
            effective_base: self.route_for(mode, &state.config.base_url).map(|r| r.base),
            backend_version: state.backend_version.clone(),
        }
    }

    /// Points the standalone transport at a new base URL and forgets the
    /// detected mode; the next backend operation re-detects.
    ///
    /// An invalid URL is rejected and leaves the current configuration intact.
    pub fn set_base_url(&self, url: &str) -> ClientResult<()> {
        let url = normalize_base_url(url)?;
        let mut state = self.write();
        state.config.base_url = url.clone();
        state.config.mode = ConnectionMode::Unknown;
        state.backend_version = None;
        state.epoch += 1;
        info!(base_url = %url, "Backend base URL changed; connection mode reset");
        Ok(())
    }

    /// Runs detection and reports whether any backend is reachable.
    ///
    /// Never fails: an all-unreachable outcome is `false` with mode
    /// [`ConnectionMode::Unavailable`].
    pub async fn check_connection(&self) -> bool {
        let seen = self.completed.load(Ordering::Acquire);
        let _guard = self.detection.lock().await;
        if self.completed.load(Ordering::Acquire) != seen {
            debug!("Joined an in-flight detection");
            return self.is_connected();
        }

        let (epoch, base_url) = {
            let state = self.read();
            (state.epoch, state.config.base_url.clone())
        };
        let (mode, version) = self.detect(&base_url).await;

        {
            let mut state = self.write();
            if state.epoch != epoch {
                warn!("Base URL changed during detection; discarding result");
                return false;
            }
            let previous = state.config.mode;
            state.config.mode = mode;
            state.backend_version = version;
            if previous != mode {
                info!(from = %previous, to = %mode, base_url = %base_url, "Connection mode changed");
            }
        }
        self.completed.fetch_add(1, Ordering::AcqRel);
        mode.is_connected()
    }

    /// Returns the route for backend requests, detecting first when the mode
    /// is still [`ConnectionMode::Unknown`].
    ///
    /// A detection discarded by a concurrent base-URL change is followed by one
    /// more against the new URL.
    pub async fn route(&self) -> ClientResult<Route> {
        for _ in 0..2 {
            if self.mode() != ConnectionMode::Unknown {
                break;
            }
            self.check_connection().await;
        }
        let state = self.read();
        let mode = state.config.mode;
        self.route_for(mode, &state.config.base_url)
            .ok_or_else(|| ClientError::NetworkUnreachable {
                url: state.config.base_url.clone(),
                reason: match mode {
                    ConnectionMode::Unknown => {
                        "base URL changed while detecting the backend".to_string()
                    }
                    _ => "no backend transport is reachable".to_string(),
                },
            })
    }

    fn route_for(&self, mode: ConnectionMode, base_url: &str) -> Option<Route> {
        match mode {
            ConnectionMode::HostPlugin => Some(Route {
                mode,
                base: self.plugin_base(),
                on_host_origin: true,
            }),
            ConnectionMode::Standalone => Some(Route {
                mode,
                base: base_url.to_string(),
                on_host_origin: false,
            }),
            ConnectionMode::Unknown | ConnectionMode::Unavailable => None,
        }
    }

    /// Probes the host-plugin route, then the standalone backend. The order is
    /// fixed: a live plugin route always wins.
    async fn detect(&self, base_url: &str) -> (ConnectionMode, Option<String>) {
        let plugin_health = format!("{}{}", self.plugin_base(), PLUGIN_HEALTH_PATH);
        if let Some(health) = self.probe(&plugin_health, true).await {
            return (ConnectionMode::HostPlugin, health.version);
        }

        let standalone_health = format!("{base_url}{STANDALONE_HEALTH_PATH}");
        if let Some(health) = self.probe(&standalone_health, false).await {
            return (ConnectionMode::Standalone, health.version);
        }

        warn!(base_url = %base_url, "No backend transport answered its health probe");
        (ConnectionMode::Unavailable, None)
    }

    async fn probe(&self, url: &str, on_host_origin: bool) -> Option<HealthPayload> {
        let mut request = HttpRequest::get(url, self.health_timeout);
        request
            .headers
            .push(("Accept".to_string(), "application/json".to_string()));
        if on_host_origin {
            request.headers.extend(self.headers.request_headers());
        }

        let outcome =
            tokio::time::timeout(self.health_timeout, self.transport.execute(request)).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!(url = %url, error = %e, "Health probe failed");
                return None;
            }
            Err(_) => {
                debug!(url = %url, timeout = ?self.health_timeout, "Health probe timed out");
                return None;
            }
        };
        if !response.is_success() {
            debug!(url = %url, status = response.status, "Health probe rejected");
            return None;
        }
        match serde_json::from_slice::<HealthPayload>(&response.body) {
            Ok(health) if health.status == "ok" => Some(health),
            Ok(health) => {
                debug!(url = %url, status = %health.status, "Health probe reported not ok");
                None
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Health probe body unreadable");
                None
            }
        }
    }
}
