//! JSON-over-HTTP request execution.
//!
//! [`RequestClient`] is the single place where URLs are assembled, headers are
//! injected, deadlines and cancellation are enforced, and non-success responses
//! are normalized into [`ClientError`] values.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use model::{ClientError, ClientResult, HeaderSource, RequestId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::resolver::TransportResolver;
use crate::settings::TransportSettings;

/// Which server a path is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The host's own REST API (`/api/characters/*`, `/api/worldinfo/*`, ...).
    Host,
    /// The backend, routed through the resolver's current mode.
    Backend,
}

/// Shared, cheaply cloneable request executor.
#[derive(Clone)]
pub struct RequestClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    resolver: Arc<TransportResolver>,
    headers: Arc<dyn HeaderSource>,
    host_url: String,
    timeout: Duration,
    cancel: Mutex<CancellationToken>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl RequestClient {
    pub fn new(
        settings: &TransportSettings,
        transport: Arc<dyn HttpTransport>,
        resolver: Arc<TransportResolver>,
        headers: Arc<dyn HeaderSource>,
    ) -> ClientResult<Self> {
        let settings = settings.normalized()?;
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                resolver,
                headers,
                host_url: settings.host_url.clone(),
                timeout: settings.request_timeout(),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        })
    }

    pub fn resolver(&self) -> &Arc<TransportResolver> {
        &self.inner.resolver
    }

    /// Cancels every request currently in flight. They resolve to
    /// [`ClientError::Cancelled`]; requests issued afterwards are unaffected.
    pub fn abort_pending(&self) {
        let mut token = self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        token.cancel();
        *token = CancellationToken::new();
        debug!("Aborted pending requests");
    }

    fn cancellation(&self) -> CancellationToken {
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // -----------------------------------------------------------------------
    // Typed entry points
    // -----------------------------------------------------------------------

    /// `GET path` and decode the JSON body as `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        target: Target,
        path: &str,
    ) -> ClientResult<T> {
        let response = self.execute(target, Method::Get, path, None).await?;
        decode(path, &response)
    }

    /// Send `body` as JSON and decode the JSON response as `T`.
    pub async fn send_json<B, T>(
        &self,
        target: Target,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .execute(target, method, path, Some(encode(path, body)?))
            .await?;
        decode(path, &response)
    }

    /// Send `body` as JSON and ignore the response body. Some host endpoints
    /// answer with plain text (`"OK"`) or nothing at all.
    pub async fn send_unit<B>(
        &self,
        target: Target,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(target, method, path, Some(encode(path, body)?))
            .await
            .map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    async fn execute(
        &self,
        target: Target,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<HttpResponse> {
        let request_id = RequestId::new_random();
        let span = tracing::debug_span!("request", %request_id, ?target, %method, path);
        async move {
            let (url, on_host_origin) = match target {
                Target::Host => (format!("{}{}", self.inner.host_url, path), true),
                Target::Backend => {
                    let route = self.inner.resolver.route().await?;
                    (route.url_for(path), route.on_host_origin)
                }
            };

            let mut headers = vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ];
            if on_host_origin {
                headers.extend(self.inner.headers.request_headers());
            }
            let request = HttpRequest {
                method,
                url: url.clone(),
                headers,
                body,
                timeout: self.inner.timeout,
            };

            let cancel = self.cancellation();
            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ClientError::Cancelled { url });
                }
                outcome = tokio::time::timeout(self.inner.timeout, self.inner.transport.execute(request)) => {
                    match outcome {
                        Ok(result) => result?,
                        Err(_) => {
                            return Err(ClientError::Timeout { url, after: self.inner.timeout });
                        }
                    }
                }
            };

            debug!(url = %url, status = response.status, "Response received");
            if response.is_success() {
                Ok(response)
            } else {
                Err(application_error(&response))
            }
        }
        .instrument(span)
        .await
    }
}

/// Turns a confirmed "not found" into a successful absence.
pub fn found<T>(result: ClientResult<T>) -> ClientResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn encode<B: Serialize + ?Sized>(path: &str, body: &B) -> ClientResult<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| ClientError::InvalidConfiguration {
        message: format!("cannot encode request body for {path}: {e}"),
    })
}

fn decode<T: DeserializeOwned>(path: &str, response: &HttpResponse) -> ClientResult<T> {
    serde_json::from_slice(&response.body).map_err(|e| ClientError::malformed(path, e.to_string()))
}

/// Prefers the `message` of a structured error body, then the status text.
fn application_error(response: &HttpResponse) -> ClientError {
    let fallback = || format!("request failed: {}", response.status);
    let message = match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(ErrorBody { message: Some(message) }) if !message.is_empty() => message,
        Ok(_) => fallback(),
        Err(_) if !response.status_text.is_empty() => response.status_text.clone(),
        Err(_) => fallback(),
    };
    ClientError::HttpApplicationError {
        status: response.status,
        message,
    }
}
