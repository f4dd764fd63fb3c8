//! The `EntityStore` trait.
//!
//! Implemented by storage backends (e.g. `roomsync-store-sqlite`). The sync
//! and resolution layers depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  auth::Auth,
  document::SubscriptionDocument,
  message::Message,
  subscription::{Subscription, SubscriptionKind},
  user::User,
};

/// Abstraction over the local entity store.
///
/// Every mutating method runs as a single atomic write: concurrent readers
/// see either the previous or the new state of an entity, never a partial
/// update.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tasks on a multi-threaded runtime.
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Auth sessions ─────────────────────────────────────────────────────

  /// Record an auth session, or return the existing one for the same
  /// server and user.
  fn ensure_auth(
    &self,
    server_url: String,
    user_id: String,
  ) -> impl Future<Output = Result<Auth, Self::Error>> + Send + '_;

  fn get_auth(
    &self,
    auth_id: Uuid,
  ) -> impl Future<Output = Result<Option<Auth>, Self::Error>> + Send + '_;

  /// Remove an auth session. Subscriptions referencing it keep existing with
  /// their back-reference cleared. Returns `false` if it did not exist.
  fn remove_auth(
    &self,
    auth_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Subscriptions ─────────────────────────────────────────────────────

  /// Create a subscription locally, before the server has assigned it a
  /// room.
  fn open_subscription(
    &self,
    kind: SubscriptionKind,
    display_name: String,
    owner_auth: Option<Uuid>,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + '_;

  fn get_subscription(
    &self,
    local_id: Uuid,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  /// Look a subscription up by its server identifier.
  fn find_subscription(
    &self,
    identifier: String,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  /// List subscriptions, optionally restricted to one auth session.
  fn list_subscriptions(
    &self,
    owner_auth: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + '_;

  /// Apply a remote document to the subscription with the same identifier,
  /// creating it if unknown. Lookup, mapping, and write happen in one
  /// transaction. Returns the stored subscription and whether it was
  /// created.
  ///
  /// When `owner_auth` is `Some`, the back-reference is set to it.
  fn sync_subscription(
    &self,
    owner_auth: Option<Uuid>,
    document: SubscriptionDocument,
  ) -> impl Future<Output = Result<(Subscription, bool), Self::Error>> + Send + '_;

  /// Mutate a subscription inside a write transaction. Returns `None` if it
  /// no longer exists, in which case `mutate` is not called.
  fn update_subscription<F>(
    &self,
    local_id: Uuid,
    mutate: F,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_
  where
    F: FnOnce(&mut Subscription) + Send + 'static;

  /// Apply a remote document to the locally opened subscription `local_id`
  /// in one transaction. Returns `None` if `local_id` no longer exists.
  ///
  /// If `local_id` has no identifier yet and another subscription already
  /// carries the document's, the document is applied to that one instead:
  /// messages of `local_id` move over, an unset owner is taken from
  /// `local_id`, and `local_id` is removed. The returned subscription is the
  /// one that remains.
  fn merge_subscription(
    &self,
    local_id: Uuid,
    document: SubscriptionDocument,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  /// Remove a subscription and its messages. Returns `false` if it did not
  /// exist.
  fn remove_subscription(
    &self,
    local_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  fn upsert_user(
    &self,
    user: User,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn find_user(
    &self,
    identifier: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  fn upsert_message(
    &self,
    message: Message,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All messages of a subscription, ordered by `created_at` ascending.
  fn messages_for(
    &self,
    subscription_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;
}
