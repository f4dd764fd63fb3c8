//! Error types for `roomsync-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subscription not found: {0}")]
  SubscriptionNotFound(Uuid),

  /// A remote document without `_id` cannot be mapped onto a local entity.
  #[error("remote document has no identifier")]
  MissingIdentifier,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
