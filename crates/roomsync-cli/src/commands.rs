//! Subcommand implementations.

use std::{path::Path, sync::Arc};

use anyhow::{Context as _, bail};
use roomsync_client::{ApiClient, ApiConfig};
use roomsync_core::{
  resolve::{ResolveError, RoomResolver},
  store::EntityStore,
  subscription::{Subscription, SubscriptionKind},
  sync::{remove_document, sync_batch},
};
use roomsync_store_sqlite::SqliteStore;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;

/// Everything a command needs: the local store, the server client, and the
/// auth session new subscriptions belong to.
pub struct Session {
  store:  Arc<SqliteStore>,
  client: Arc<ApiClient>,
  auth:   Option<Uuid>,
}

impl Session {
  pub async fn open(cfg: &ClientConfig) -> anyhow::Result<Self> {
    if let Some(parent) = cfg.store_path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {parent:?}"))?;
    }

    let store = SqliteStore::open(&cfg.store_path)
      .await
      .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

    let auth = if cfg.user_id.is_empty() {
      None
    } else {
      let auth = store
        .ensure_auth(cfg.server_url.clone(), cfg.user_id.clone())
        .await
        .context("failed to record auth session")?;
      Some(auth.auth_id)
    };

    let client = ApiClient::new(ApiConfig {
      server_url: cfg.server_url.clone(),
      user_id:    cfg.user_id.clone(),
      auth_token: cfg.auth_token.clone(),
    })
    .context("failed to build HTTP client")?;

    Ok(Self { store: Arc::new(store), client: Arc::new(client), auth })
  }

  fn resolver(&self) -> RoomResolver<SqliteStore, ApiClient> {
    RoomResolver::new(self.store.clone(), self.client.clone())
  }

  // ─── import ────────────────────────────────────────────────────────────────

  pub async fn import(&self, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
      .with_context(|| format!("failed to read {file:?}"))?;
    let value: Value = serde_json::from_str(&text)
      .with_context(|| format!("{file:?} is not valid JSON"))?;
    let changes = ChangeSet::from_value(value)?;

    // defaulted fields are already logged per document by `sync_document`
    let report = sync_batch(self.store.as_ref(), self.auth, &changes.update).await;
    for (index, e) in &report.rejected {
      warn!(index, error = %e, "document rejected");
    }

    let mut removed = 0;
    for record in &changes.remove {
      match remove_document(self.store.as_ref(), record).await {
        Ok(true) => removed += 1,
        Ok(false) => {}
        Err(e) => warn!(error = %e, "removal record rejected"),
      }
    }

    let created = report.synced.iter().filter(|o| o.created).count();
    info!(
      synced = report.synced.len(),
      created,
      rejected = report.rejected.len(),
      removed,
      "import finished"
    );
    println!(
      "synced {} ({created} new), rejected {}, removed {removed}",
      report.synced.len(),
      report.rejected.len(),
    );
    Ok(())
  }

  // ─── list ──────────────────────────────────────────────────────────────────

  pub async fn list(&self) -> anyhow::Result<()> {
    let subscriptions = self.store.list_subscriptions(self.auth).await?;
    println!("{}", serde_json::to_string_pretty(&subscriptions)?);
    Ok(())
  }

  // ─── open / resolve ────────────────────────────────────────────────────────

  /// Create a local subscription for `name` and resolve it against the
  /// server. The subscription is kept even if resolution fails.
  pub async fn open_subscription(&self, kind: SubscriptionKind, name: String) -> anyhow::Result<()> {
    let subscription = self.store.open_subscription(kind, name, self.auth).await?;
    info!(local_id = %subscription.local_id, ?kind, "opened local subscription");
    self.resolve(subscription.local_id).await
  }

  /// Resolve `local_id`. Ctrl-C drops the task handle, which cancels the
  /// flow before it writes.
  pub async fn resolve(&self, local_id: Uuid) -> anyhow::Result<()> {
    let task = self.resolver().spawn(local_id);

    let outcome = tokio::select! {
      outcome = task.join() => outcome,
      signal = tokio::signal::ctrl_c() => {
        signal.context("failed to listen for Ctrl-C")?;
        bail!("resolution of {local_id} interrupted");
      }
    };

    match outcome {
      Ok(subscription) => print_subscription(&subscription),
      Err(ResolveError::Cancelled) => bail!("resolution of {local_id} cancelled"),
      Err(e) => Err(e).with_context(|| format!("failed to resolve {local_id}")),
    }
  }

  // ─── messages ──────────────────────────────────────────────────────────────

  pub async fn messages(&self, local_id: Uuid) -> anyhow::Result<()> {
    let Some(subscription) = self.store.get_subscription(local_id).await? else {
      bail!("no subscription {local_id}");
    };

    for message in subscription.messages(self.store.as_ref()).await? {
      let at = message
        .created_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_owned());
      let from = message.user_id.as_deref().unwrap_or("?");
      println!("{at} {from}: {}", message.text);
    }
    Ok(())
  }
}

fn print_subscription(subscription: &Subscription) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(subscription)?);
  Ok(())
}

// ─── Import file shape ───────────────────────────────────────────────────────

/// Documents to sync and removal records, as read from an import file.
///
/// Accepted shapes: a single document, an array of documents, or the
/// server's `{"update": [...], "remove": [...]}` change set.
#[derive(Debug, Default, PartialEq)]
pub struct ChangeSet {
  pub update: Vec<Value>,
  pub remove: Vec<Value>,
}

impl ChangeSet {
  pub fn from_value(value: Value) -> anyhow::Result<Self> {
    match value {
      Value::Array(update) => Ok(Self { update, remove: Vec::new() }),
      Value::Object(mut map)
        if map.contains_key("update") || map.contains_key("remove") =>
      {
        let mut take = |key: &str| -> anyhow::Result<Vec<Value>> {
          match map.remove(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => bail!("`{key}` must be an array"),
          }
        };
        let update = take("update")?;
        let remove = take("remove")?;
        Ok(Self { update, remove })
      }
      Value::Object(map) => Ok(Self {
        update: vec![Value::Object(map)],
        remove: Vec::new(),
      }),
      _ => bail!("expected a subscription document, an array, or a change set"),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  async fn session() -> (Session, std::path::PathBuf) {
    let dir = std::env::temp_dir().join(format!("roomsync-{}", Uuid::new_v4()));
    let cfg = ClientConfig {
      server_url: "http://127.0.0.1:9".into(),
      user_id:    "U1".into(),
      auth_token: String::new(),
      store_path: dir.join("store.db"),
    };
    (Session::open(&cfg).await.unwrap(), dir)
  }

  #[tokio::test]
  async fn import_applies_updates_and_removals() {
    let (session, dir) = session().await;
    let file = dir.join("changes.json");

    std::fs::write(
      &file,
      json!([
        { "_id": "a", "rid": "ra", "name": "alpha", "unread": "many" },
        { "_id": "b", "rid": "rb", "name": "beta" },
        { "rid": "orphan" },
      ])
      .to_string(),
    )
    .unwrap();
    session.import(&file).await.unwrap();

    std::fs::write(
      &file,
      json!({ "update": [], "remove": [{ "_id": "b" }, { "_id": "zz" }] }).to_string(),
    )
    .unwrap();
    session.import(&file).await.unwrap();

    let stored = session.store.list_subscriptions(session.auth).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].identifier.as_deref(), Some("a"));
    assert_eq!(stored[0].unread_count, 0);

    std::fs::remove_dir_all(dir).ok();
  }

  #[test]
  fn single_document() {
    let set = ChangeSet::from_value(json!({ "_id": "s1", "rid": "r1" })).unwrap();
    assert_eq!(set.update, vec![json!({ "_id": "s1", "rid": "r1" })]);
    assert!(set.remove.is_empty());
  }

  #[test]
  fn document_array() {
    let set = ChangeSet::from_value(json!([{ "_id": "a" }, { "_id": "b" }])).unwrap();
    assert_eq!(set.update.len(), 2);
  }

  #[test]
  fn change_set_with_removals() {
    let set = ChangeSet::from_value(json!({
      "update": [{ "_id": "a" }],
      "remove": [{ "_id": "b", "_deletedAt": { "$date": 1_000 } }],
    }))
    .unwrap();
    assert_eq!(set.update, vec![json!({ "_id": "a" })]);
    assert_eq!(set.remove[0]["_id"], "b");
  }

  #[test]
  fn change_set_with_only_removals() {
    let set = ChangeSet::from_value(json!({ "remove": [{ "_id": "b" }] })).unwrap();
    assert!(set.update.is_empty());
    assert_eq!(set.remove.len(), 1);
  }

  #[test]
  fn malformed_inputs_are_rejected() {
    assert!(ChangeSet::from_value(json!("nope")).is_err());
    assert!(ChangeSet::from_value(json!({ "update": "nope" })).is_err());
  }
}
