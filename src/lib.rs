//! Proxy management-plane configuration engine.
//!
//! # Architecture Overview
//!
//! ```text
//!   mgmt-cli / mgmt-sdk ──HTTP──▶ admin ──▶ Session ─┬─▶ CfgContext ──▶ ConfigStore (files)
//!                                                    │        │
//!                                                    │        └─▶ rules (line codec)
//!                                                    │
//!                                                    └─▶ RecordStore (typed records)
//!
//!   config (TOML + watcher) · observability (tracing, metrics) · lifecycle (shutdown)
//! ```
//!
//! Library users open a [`Session`] directly; the daemon serves the same
//! operations over the admin API.

// Engine
pub mod container;
pub mod context;
pub mod error;
pub mod records;
pub mod rules;
pub mod session;

// Daemon
pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::MgmtConfig;
pub use context::CfgContext;
pub use error::{MgmtError, MgmtResult, ParseError};
pub use http::AdminServer;
pub use lifecycle::Shutdown;
pub use rules::{FileKind, Rule};
pub use session::Session;
