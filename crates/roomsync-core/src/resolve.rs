//! Remote resolution of room references.
//!
//! A subscription opened locally has no room reference until the server
//! assigns one. Channels are looked up by name and the full returned
//! document is applied; direct-message rooms are created (or fetched) and
//! only their `rid` is taken.
//!
//! Every flow is single-shot and returns an explicit result. Flows started
//! with [`RoomResolver::spawn`] are tied to the returned [`ResolveTask`]:
//! dropping it cancels the flow, and a cancelled flow never writes.

use std::{future::Future, sync::Arc};

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  document::{Parsed, SubscriptionDocument},
  remote::{MethodResponse, RoomDirectory},
  store::EntityStore,
  subscription::{Subscription, SubscriptionKind},
};

#[derive(Debug, Error)]
pub enum ResolveError {
  /// The subscription does not exist, or was removed while the flow was in
  /// flight.
  #[error("subscription not found: {0}")]
  SubscriptionNotFound(Uuid),

  #[error("{0:?} subscriptions cannot be resolved remotely")]
  Unsupported(SubscriptionKind),

  /// The server answered with an error; the subscription is unchanged.
  #[error("server reported an error: {0}")]
  Remote(String),

  #[error("server response carried no room reference")]
  MissingRoomReference,

  #[error("resolution cancelled")]
  Cancelled,

  #[error("transport error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("resolution task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl ResolveError {
  fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Runs resolution flows against a store and a remote room directory.
pub struct RoomResolver<S, R> {
  store:     Arc<S>,
  directory: Arc<R>,
}

impl<S, R> Clone for RoomResolver<S, R> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      directory: Arc::clone(&self.directory),
    }
  }
}

impl<S, R> RoomResolver<S, R>
where
  S: EntityStore + 'static,
  R: RoomDirectory + 'static,
{
  pub fn new(store: Arc<S>, directory: Arc<R>) -> Self { Self { store, directory } }

  /// Resolve the room reference of `local_id` according to its kind.
  pub async fn resolve(
    &self,
    local_id: Uuid,
    cancel: &CancellationToken,
  ) -> Result<Subscription, ResolveError> {
    let subscription = self
      .store
      .get_subscription(local_id)
      .await
      .map_err(ResolveError::store)?
      .ok_or(ResolveError::SubscriptionNotFound(local_id))?;

    match subscription.kind() {
      SubscriptionKind::Channel => {
        self
          .resolve_channel_room(local_id, subscription.display_name, cancel)
          .await
      }
      SubscriptionKind::DirectMessage => {
        self
          .resolve_direct_message_room(local_id, subscription.display_name, cancel)
          .await
      }
      kind @ SubscriptionKind::Group => Err(ResolveError::Unsupported(kind)),
    }
  }

  /// Look the channel up by name and apply the returned document. If the
  /// server's subscription is already stored, `local_id` is merged into it
  /// and the stored one is returned.
  pub async fn resolve_channel_room(
    &self,
    local_id: Uuid,
    display_name: String,
    cancel: &CancellationToken,
  ) -> Result<Subscription, ResolveError> {
    debug!(%local_id, %display_name, "looking up channel room");
    let result = self
      .call(cancel, self.directory.room_by_name(display_name))
      .await?;

    let Parsed { document, issues } = SubscriptionDocument::parse(&result);
    for issue in &issues {
      warn!(%local_id, field = issue.field, kind = ?issue.kind, "defaulted field in room document");
    }

    if cancel.is_cancelled() {
      return Err(ResolveError::Cancelled);
    }
    let subscription = self
      .store
      .merge_subscription(local_id, document)
      .await
      .map_err(ResolveError::store)?
      .ok_or(ResolveError::SubscriptionNotFound(local_id))?;
    info!(
      %local_id,
      resolved_id = %subscription.local_id,
      rid = %subscription.room_reference,
      "resolved channel room"
    );
    Ok(subscription)
  }

  /// Create or fetch the direct-message room and take only its `rid`.
  pub async fn resolve_direct_message_room(
    &self,
    local_id: Uuid,
    username: String,
    cancel: &CancellationToken,
  ) -> Result<Subscription, ResolveError> {
    debug!(%local_id, %username, "creating direct message room");
    let result = self
      .call(cancel, self.directory.create_direct_message(username))
      .await?;

    let rid = result
      .get("rid")
      .and_then(Value::as_str)
      .filter(|rid| !rid.is_empty())
      .ok_or(ResolveError::MissingRoomReference)?
      .to_owned();

    let subscription = self
      .write(local_id, cancel, move |s| s.room_reference = rid)
      .await?;
    info!(%local_id, rid = %subscription.room_reference, "resolved direct message room");
    Ok(subscription)
  }

  /// Run [`Self::resolve`] on a background task owned by the returned
  /// handle.
  pub fn spawn(&self, local_id: Uuid) -> ResolveTask {
    let token = CancellationToken::new();
    let resolver = self.clone();
    let task_token = token.clone();
    let handle =
      tokio::spawn(async move { resolver.resolve(local_id, &task_token).await });
    ResolveTask { handle, token: token.clone(), guard: token.drop_guard() }
  }

  async fn call<F>(
    &self,
    cancel: &CancellationToken,
    request: F,
  ) -> Result<Value, ResolveError>
  where
    F: Future<Output = Result<MethodResponse, R::Error>>,
  {
    let response = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
      response = request => response.map_err(|e| ResolveError::Transport(Box::new(e)))?,
    };

    if let Some(reason) = response.error_reason() {
      warn!(%reason, "server rejected room lookup");
      return Err(ResolveError::Remote(reason));
    }
    Ok(response.result)
  }

  async fn write<F>(
    &self,
    local_id: Uuid,
    cancel: &CancellationToken,
    mutate: F,
  ) -> Result<Subscription, ResolveError>
  where
    F: FnOnce(&mut Subscription) + Send + 'static,
  {
    if cancel.is_cancelled() {
      return Err(ResolveError::Cancelled);
    }
    self
      .store
      .update_subscription(local_id, mutate)
      .await
      .map_err(ResolveError::store)?
      .ok_or(ResolveError::SubscriptionNotFound(local_id))
  }
}

// ─── Task handle ─────────────────────────────────────────────────────────────

/// A spawned resolution flow. Dropping the handle cancels the flow.
pub struct ResolveTask {
  handle: JoinHandle<Result<Subscription, ResolveError>>,
  token:  CancellationToken,
  guard:  DropGuard,
}

impl ResolveTask {
  /// Cancel the flow. It completes with [`ResolveError::Cancelled`] unless
  /// its write has already happened.
  pub fn cancel(&self) { self.token.cancel(); }

  pub fn is_finished(&self) -> bool { self.handle.is_finished() }

  /// Wait for the flow to complete.
  pub async fn join(self) -> Result<Subscription, ResolveError> {
    let Self { handle, guard, .. } = self;
    let result = handle.await?;
    guard.disarm();
    result
  }
}
