//! ST Manager backend client.
//!
//! [`BackupClient`] maps each backend operation (backups, schedules, stats,
//! config, sync and change tracking) one-to-one onto a REST call. Requests go
//! through [`transport::RequestClient`] with [`transport::Target::Backend`], so
//! they follow whichever transport the resolver has detected and pick up the
//! host-plugin path rewrite automatically.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** No payload is translated here; the backend already
//! speaks the normalized DTO shapes defined in [`model`].

mod client;

pub use client::BackupClient;
