//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → admin auth (bearer key from the live config)
//!     → admin handlers (blocking work on spawn_blocking)
//!     → JSON response
//! ```

pub mod server;

pub use server::{AdminServer, AppState};
