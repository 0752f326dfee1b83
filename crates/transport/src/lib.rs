//! ST Manager transport layer.
//!
//! Decides at runtime which backend transport is live and executes JSON
//! requests against it.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL assembly, header injection, health probing, path
//! rewriting, deadlines and cancellation all live here. The `resources` and
//! `backend` crates see only [`RequestClient`] and [`Target`].
//!
//! ## Transport
//!
//! The backend is reached in one of two ways, probed in this order:
//!
//! - **Host plugin**: mounted at `<host>/api/plugins/st-manager`. The mount
//!   does not replicate the `/api/v2` prefix, so it is stripped from every path.
//! - **Standalone**: a separate process at the configured base URL
//!   (default `http://localhost:5000`); paths are used unmodified.
//!
//! Host-native resource paths (`/api/characters/*`, ...) always go to the
//! host origin and never depend on the detected mode.

pub mod client;
pub mod http;
pub mod resolver;
pub mod session;
pub mod settings;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{found, RequestClient, Target};
pub use http::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
pub use resolver::{ConnectionMode, ConnectionStatus, Route, TransportConfig, TransportResolver};
pub use session::{HostSession, CSRF_HEADER};
pub use settings::TransportSettings;
