//! Core types for roomsync: remote-to-local synchronization of chat room
//! subscriptions.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement [`store::EntityStore`]; server clients implement
//! [`remote::RoomDirectory`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod auth;
pub mod connection;
pub mod document;
pub mod error;
pub mod message;
pub mod remote;
pub mod resolve;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod user;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod testing;
