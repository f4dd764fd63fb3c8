//! [`SqliteStore`]: the SQLite implementation of [`EntityStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use roomsync_core::{
  auth::Auth,
  document::SubscriptionDocument,
  message::Message,
  store::EntityStore,
  subscription::{Subscription, SubscriptionKind},
  user::User,
};

use crate::{
  encode::{
    RawAuth, RawMessage, RawSubscription, SUBSCRIPTION_COLUMNS, encode_dt, encode_uuid,
    user_from_row,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A roomsync entity store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let shown = path.as_ref().display().to_string();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %shown, "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn select_subscription(
  conn: &rusqlite::Connection,
  column: &str,
  value: &str,
) -> rusqlite::Result<Option<RawSubscription>> {
  conn
    .query_row(
      &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE {column} = ?1"),
      rusqlite::params![value],
      RawSubscription::from_row,
    )
    .optional()
}

/// Insert or fully overwrite a subscription row, keyed by `local_id`.
fn write_subscription(
  conn: &rusqlite::Connection,
  raw: &RawSubscription,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
       ON CONFLICT (local_id) DO UPDATE SET
         identifier    = excluded.identifier,
         auth_id       = excluded.auth_id,
         kind          = excluded.kind,
         rid           = excluded.rid,
         name          = excluded.name,
         unread        = excluded.unread,
         open          = excluded.open,
         alert         = excluded.alert,
         favorite      = excluded.favorite,
         created_at    = excluded.created_at,
         last_seen     = excluded.last_seen,
         other_user_id = excluded.other_user_id"
    ),
    rusqlite::params![
      raw.local_id,
      raw.identifier,
      raw.auth_id,
      raw.kind,
      raw.rid,
      raw.name,
      raw.unread,
      raw.open,
      raw.alert,
      raw.favorite,
      raw.created_at,
      raw.last_seen,
      raw.other_user_id,
    ],
  )?;
  Ok(())
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  // ── Auth sessions ─────────────────────────────────────────────────────────

  async fn ensure_auth(&self, server_url: String, user_id: String) -> Result<Auth> {
    let new_id = encode_uuid(Uuid::new_v4());
    let now    = encode_dt(Utc::now());

    let raw: RawAuth = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existing = tx
          .query_row(
            "SELECT auth_id, server_url, user_id, created_at FROM auths
             WHERE server_url = ?1 AND user_id = ?2",
            rusqlite::params![server_url, user_id],
            RawAuth::from_row,
          )
          .optional()?;

        let raw = match existing {
          Some(raw) => raw,
          None => {
            tx.execute(
              "INSERT INTO auths (auth_id, server_url, user_id, created_at)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![new_id, server_url, user_id, now],
            )?;
            RawAuth { auth_id: new_id, server_url, user_id, created_at: now }
          }
        };
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_auth()
  }

  async fn get_auth(&self, auth_id: Uuid) -> Result<Option<Auth>> {
    let id_str = encode_uuid(auth_id);

    let raw: Option<RawAuth> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT auth_id, server_url, user_id, created_at FROM auths WHERE auth_id = ?1",
            rusqlite::params![id_str],
            RawAuth::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAuth::into_auth).transpose()
  }

  async fn remove_auth(&self, auth_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(auth_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM auths WHERE auth_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    Ok(removed > 0)
  }

  // ── Subscriptions ─────────────────────────────────────────────────────────

  async fn open_subscription(
    &self,
    kind:         SubscriptionKind,
    display_name: String,
    owner_auth:   Option<Uuid>,
  ) -> Result<Subscription> {
    let subscription = Subscription::new_local(kind, display_name, owner_auth);
    let raw = RawSubscription::from_subscription(&subscription);

    self
      .conn
      .call(move |conn| {
        write_subscription(conn, &raw)?;
        Ok(())
      })
      .await?;

    Ok(subscription)
  }

  async fn get_subscription(&self, local_id: Uuid) -> Result<Option<Subscription>> {
    let id_str = encode_uuid(local_id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_subscription(conn, "local_id", &id_str)?))
      .await?;

    raw.map(RawSubscription::into_subscription).transpose()
  }

  async fn find_subscription(&self, identifier: String) -> Result<Option<Subscription>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_subscription(conn, "identifier", &identifier)?))
      .await?;

    raw.map(RawSubscription::into_subscription).transpose()
  }

  async fn list_subscriptions(&self, owner_auth: Option<Uuid>) -> Result<Vec<Subscription>> {
    let auth_str = owner_auth.map(encode_uuid);

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(a) = auth_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE auth_id = ?1 ORDER BY name, local_id"
          ))?;
          stmt
            .query_map(rusqlite::params![a], RawSubscription::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY name, local_id"
          ))?;
          stmt
            .query_map([], RawSubscription::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscription::into_subscription).collect()
  }

  async fn sync_subscription(
    &self,
    owner_auth: Option<Uuid>,
    document:   SubscriptionDocument,
  ) -> Result<(Subscription, bool)> {
    let identifier = document
      .identifier
      .clone()
      .ok_or(Error::Core(roomsync_core::Error::MissingIdentifier))?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing = select_subscription(&tx, "identifier", &identifier)?;
        let created  = existing.is_none();
        let mut subscription = match existing {
          Some(raw) => raw.into_subscription().map_err(Error::into_db)?,
          None => Subscription::new_local(SubscriptionKind::Channel, "", None),
        };

        subscription.apply(&document);
        if owner_auth.is_some() {
          subscription.owner_auth = owner_auth;
        }

        write_subscription(&tx, &RawSubscription::from_subscription(&subscription))?;
        tx.commit()?;
        Ok((subscription, created))
      })
      .await
      .map_err(Error::from_db)
  }

  async fn update_subscription<F>(
    &self,
    local_id: Uuid,
    mutate:   F,
  ) -> Result<Option<Subscription>>
  where
    F: FnOnce(&mut Subscription) + Send + 'static,
  {
    let id_str = encode_uuid(local_id);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(raw) = select_subscription(&tx, "local_id", &id_str)? else {
          return Ok(None);
        };
        let mut subscription = raw.into_subscription().map_err(Error::into_db)?;

        let identifier = subscription.identifier.clone();
        mutate(&mut subscription);
        // identifier is immutable once assigned
        if identifier.is_some() {
          subscription.identifier = identifier;
        }
        subscription.local_id = local_id;

        write_subscription(&tx, &RawSubscription::from_subscription(&subscription))?;
        tx.commit()?;
        Ok(Some(subscription))
      })
      .await
      .map_err(Error::from_db)
  }

  async fn merge_subscription(
    &self,
    local_id: Uuid,
    document: SubscriptionDocument,
  ) -> Result<Option<Subscription>> {
    let id_str = encode_uuid(local_id);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(raw) = select_subscription(&tx, "local_id", &id_str)? else {
          return Ok(None);
        };
        let placeholder = raw.into_subscription().map_err(Error::into_db)?;

        let holder = match (&placeholder.identifier, &document.identifier) {
          (None, Some(identifier)) => select_subscription(&tx, "identifier", identifier)?,
          _ => None,
        };

        let mut subscription = match holder {
          Some(raw) => {
            let mut holder = raw.into_subscription().map_err(Error::into_db)?;
            let holder_str = encode_uuid(holder.local_id);
            tx.execute(
              "UPDATE messages SET subscription_id = ?1 WHERE subscription_id = ?2",
              rusqlite::params![holder_str, id_str],
            )?;
            tx.execute(
              "DELETE FROM subscriptions WHERE local_id = ?1",
              rusqlite::params![id_str],
            )?;
            holder.owner_auth = holder.owner_auth.or(placeholder.owner_auth);
            tracing::debug!(
              from = %local_id,
              into = %holder.local_id,
              "merged local subscription into synced one"
            );
            holder
          }
          None => placeholder,
        };

        subscription.apply(&document);
        write_subscription(&tx, &RawSubscription::from_subscription(&subscription))?;
        tx.commit()?;
        Ok(Some(subscription))
      })
      .await
      .map_err(Error::from_db)
  }

  async fn remove_subscription(&self, local_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(local_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM subscriptions WHERE local_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn upsert_user(&self, user: User) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (identifier, username, name) VALUES (?1, ?2, ?3)
           ON CONFLICT (identifier) DO UPDATE SET
             username = excluded.username,
             name     = excluded.name",
          rusqlite::params![user.identifier, user.username, user.name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_user(&self, identifier: String) -> Result<Option<User>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row(
              "SELECT identifier, username, name FROM users WHERE identifier = ?1",
              rusqlite::params![identifier],
              user_from_row,
            )
            .optional()?)
        })
        .await?,
    )
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn upsert_message(&self, message: Message) -> Result<()> {
    let sub_str = encode_uuid(message.subscription_id);
    let at_str  = message.created_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (identifier, subscription_id, user_id, text, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (identifier) DO UPDATE SET
             subscription_id = excluded.subscription_id,
             user_id         = excluded.user_id,
             text            = excluded.text,
             created_at      = excluded.created_at",
          rusqlite::params![message.identifier, sub_str, message.user_id, message.text, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn messages_for(&self, subscription_id: Uuid) -> Result<Vec<Message>> {
    let sub_str = encode_uuid(subscription_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT identifier, subscription_id, user_id, text, created_at
           FROM messages
           WHERE subscription_id = ?1
           ORDER BY created_at ASC, identifier ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![sub_str], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }
}
