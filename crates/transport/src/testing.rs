//! In-memory [`HttpTransport`] for tests.
//!
//! Available to this crate's own tests and, through the `test-util` feature, to
//! the tests of downstream crates.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use model::{ClientError, ClientResult};

use crate::http::{HttpRequest, HttpResponse, HttpTransport};

type Handler = dyn Fn(&HttpRequest) -> ClientResult<HttpResponse> + Send + Sync;

/// Answers every request with a caller-supplied handler and records what it
/// was asked.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    delay: Option<Duration>,
    log: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&HttpRequest) -> ClientResult<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Delays every response, so tests can overlap requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received for exactly `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    /// The most recent request received for exactly `url`.
    pub fn last_request(&self, url: &str) -> Option<HttpRequest> {
        self.requests().into_iter().rev().find(|r| r.url == url)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}

/// The error a transport reports for a refused connection.
pub fn unreachable(url: &str) -> ClientError {
    ClientError::NetworkUnreachable {
        url: url.to_string(),
        reason: "connection refused".to_string(),
    }
}
