//! Host session headers.
//!
//! The host rejects mutating requests that do not carry its CSRF token. The
//! token is issued per session by `GET /csrf-token`; the session cookie that
//! binds it lives in the transport's cookie store.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use model::{ClientError, ClientResult, HeaderSource};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::http::{HttpRequest, HttpTransport};
use crate::settings::{TransportSettings, CSRF_TOKEN_PATH};

/// Header the host checks on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Deserialize)]
struct CsrfToken {
    token: String,
}

/// Holds the host's CSRF token and contributes it to requests sent to the host
/// origin.
pub struct HostSession {
    transport: Arc<dyn HttpTransport>,
    host_url: String,
    timeout: Duration,
    token: RwLock<Option<String>>,
}

impl HostSession {
    pub fn new(
        settings: &TransportSettings,
        transport: Arc<dyn HttpTransport>,
    ) -> ClientResult<Self> {
        let settings = settings.normalized()?;
        Ok(Self {
            transport,
            host_url: settings.host_url.clone(),
            timeout: settings.health_timeout(),
            token: RwLock::new(None),
        })
    }

    /// Whether a token has been obtained, i.e. the host has answered at least
    /// once.
    pub fn is_ready(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Fetches a fresh token from the host.
    #[instrument(skip(self), fields(host = %self.host_url))]
    pub async fn refresh(&self) -> ClientResult<()> {
        let url = format!("{}{}", self.host_url, CSRF_TOKEN_PATH);
        let request = HttpRequest::get(url.clone(), self.timeout);
        let outcome = tokio::time::timeout(self.timeout, self.transport.execute(request)).await;
        let response = match outcome {
            Ok(result) => result?,
            Err(_) => {
                return Err(ClientError::Timeout {
                    url,
                    after: self.timeout,
                })
            }
        };
        if !response.is_success() {
            return Err(ClientError::HttpApplicationError {
                status: response.status,
                message: response.status_text,
            });
        }
        let CsrfToken { token } = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::malformed(CSRF_TOKEN_PATH, e.to_string()))?;

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        debug!("Host session token refreshed");
        Ok(())
    }
}

impl HeaderSource for HostSession {
    fn request_headers(&self) -> Vec<(String, String)> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| vec![(CSRF_HEADER.to_string(), token.clone())])
            .unwrap_or_default()
    }
}
