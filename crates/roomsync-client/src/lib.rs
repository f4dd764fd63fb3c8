//! HTTP client for the chat server's method-call endpoint.
//!
//! Implements [`roomsync_core::remote::RoomDirectory`] so remote room lookups
//! can be driven by the resolution flows in `roomsync-core`.

mod client;
mod wire;

pub mod error;

pub use client::{ApiClient, ApiConfig};
pub use error::{Error, Result};
