//! Typed async client for the proxy management API.

mod client;

pub use client::*;
