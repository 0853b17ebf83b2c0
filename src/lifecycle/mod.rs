//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Finish in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup lives in main: config, logging, session, then listener
//! - In-flight commits complete before exit; nothing is written on shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
