//! Applying remote subscription documents to the entity store.

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  document::{ParseIssue, Parsed, SubscriptionDocument},
  store::EntityStore,
  subscription::Subscription,
};

/// The result of syncing one remote document.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
  pub subscription: Subscription,
  /// Fields that fell back to their defaults.
  pub issues:       Vec<ParseIssue>,
  /// Whether the document introduced a subscription unknown to the store.
  pub created:      bool,
}

/// Per-document results of [`sync_batch`].
#[derive(Debug, Default)]
pub struct SyncReport {
  pub synced:   Vec<SyncOutcome>,
  /// Position in the input and the reason the document was not applied.
  pub rejected: Vec<(usize, Error)>,
}

/// Parse `value` and apply it to the matching subscription in one store
/// transaction.
///
/// Malformed fields are defaulted and reported in
/// [`SyncOutcome::issues`]. Only a document without `_id` is rejected, since
/// it cannot be matched to a local entity.
pub async fn sync_document<S: EntityStore>(
  store: &S,
  owner_auth: Option<Uuid>,
  value: &Value,
) -> Result<SyncOutcome> {
  let Parsed { document, issues } = SubscriptionDocument::parse(value);

  let Some(identifier) = document.identifier.clone() else {
    warn!("rejecting subscription document without _id");
    return Err(Error::MissingIdentifier);
  };

  for issue in &issues {
    warn!(
      %identifier,
      field = issue.field,
      kind = ?issue.kind,
      "defaulted field in subscription document"
    );
  }

  let (subscription, created) = store
    .sync_subscription(owner_auth, document)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;

  debug!(
    %identifier,
    local_id = %subscription.local_id,
    created,
    "synced subscription"
  );

  Ok(SyncOutcome { subscription, issues, created })
}

/// Sync a list of documents, one transaction each. A rejected document does
/// not stop the rest.
pub async fn sync_batch<S: EntityStore>(
  store: &S,
  owner_auth: Option<Uuid>,
  values: &[Value],
) -> SyncReport {
  let mut report = SyncReport::default();
  for (index, value) in values.iter().enumerate() {
    match sync_document(store, owner_auth, value).await {
      Ok(outcome) => report.synced.push(outcome),
      Err(e) => report.rejected.push((index, e)),
    }
  }
  report
}

/// Remove the subscription a server-side removal record points to. The
/// record only needs `_id`. Returns `false` if nothing was removed.
pub async fn remove_document<S: EntityStore>(store: &S, value: &Value) -> Result<bool> {
  let Some(identifier) = value.get("_id").and_then(Value::as_str) else {
    warn!("ignoring removal record without _id");
    return Err(Error::MissingIdentifier);
  };

  let store_err = |e: S::Error| Error::Store(Box::new(e));
  let Some(subscription) = store
    .find_subscription(identifier.to_owned())
    .await
    .map_err(store_err)?
  else {
    debug!(%identifier, "removal of unknown subscription");
    return Ok(false);
  };

  let removed = store
    .remove_subscription(subscription.local_id)
    .await
    .map_err(store_err)?;
  debug!(%identifier, removed, "removed subscription");
  Ok(removed)
}
