//! The HTTP port and its `reqwest` implementation.
//!
//! Everything above this module speaks in [`HttpRequest`] / [`HttpResponse`]
//! values so the resolver and the request client can be exercised without a
//! network.

use std::time::Duration;

use async_trait::async_trait;
use model::{ClientError, ClientResult};
use serde::Serialize;

/// HTTP methods used by the backend and host protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        })
    }
}

/// A fully resolved outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decodes the body as JSON, if there is one.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

/// A response as received, before any status or body interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`; empty when unknown.
    pub status_text: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Builds a response with a JSON body.
    pub fn json(status: u16, body: &impl Serialize) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            body: serde_json::to_vec(body).unwrap_or_default(),
        }
    }

    /// Builds a response with a plain-text body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            body: body.into().into_bytes(),
        }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
}

/// Executes one HTTP exchange.
///
/// Implementations report only transport-level failures
/// ([`ClientError::NetworkUnreachable`], [`ClientError::Timeout`]); any response
/// the server produced, whatever its status, is returned as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> ClientResult<HttpResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client with a cookie store,
/// so host session cookies survive between requests.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::InvalidConfiguration {
                message: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&request.url, request.timeout, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&request.url, request.timeout, e))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body: body.to_vec(),
        })
    }
}

fn classify(url: &str, timeout: Duration, error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout {
            url: url.to_string(),
            after: timeout,
        }
    } else {
        ClientError::NetworkUnreachable {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_response_carries_reason_phrase() {
        let response = HttpResponse::json(404, &json!({"message": "missing"}));
        assert_eq!(response.status_text, "Not Found");
        assert!(!response.is_success());
        assert!(HttpResponse::text(204, "").is_success());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut request = HttpRequest::get("http://h/x", Duration::from_secs(1));
        request
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("x-csrf-token"), None);
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        let err = transport
            .execute(HttpRequest::get("http://127.0.0.1:9/health", Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(err.is_unreachable(), "{err}");
    }
}
