//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order matches time order. UUIDs
//! are stored as hyphenated lowercase strings. Booleans are 0/1 integers.

use chrono::{DateTime, SecondsFormat, Utc};
use roomsync_core::{
  auth::Auth,
  message::Message,
  subscription::Subscription,
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSubscription::from_row`].
pub const SUBSCRIPTION_COLUMNS: &str = "local_id, identifier, auth_id, kind, rid, name, unread, \
   open, alert, favorite, created_at, last_seen, other_user_id";

/// Values read directly from a `subscriptions` row.
pub struct RawSubscription {
  pub local_id:      String,
  pub identifier:    Option<String>,
  pub auth_id:       Option<String>,
  pub kind:          String,
  pub rid:           String,
  pub name:          String,
  pub unread:        i64,
  pub open:          bool,
  pub alert:         bool,
  pub favorite:      bool,
  pub created_at:    Option<String>,
  pub last_seen:     Option<String>,
  pub other_user_id: Option<String>,
}

impl RawSubscription {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      local_id:      row.get(0)?,
      identifier:    row.get(1)?,
      auth_id:       row.get(2)?,
      kind:          row.get(3)?,
      rid:           row.get(4)?,
      name:          row.get(5)?,
      unread:        row.get(6)?,
      open:          row.get(7)?,
      alert:         row.get(8)?,
      favorite:      row.get(9)?,
      created_at:    row.get(10)?,
      last_seen:     row.get(11)?,
      other_user_id: row.get(12)?,
    })
  }

  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      local_id:             decode_uuid(&self.local_id)?,
      identifier:           self.identifier,
      room_reference:       self.rid,
      kind_code:            self.kind,
      display_name:         self.name,
      unread_count:         u32::try_from(self.unread)
        .map_err(|_| Error::UnreadOutOfRange(self.unread))?,
      is_open:              self.open,
      has_alert:            self.alert,
      is_favorite:          self.favorite,
      created_at:           self.created_at.as_deref().map(decode_dt).transpose()?,
      last_seen_at:         self.last_seen.as_deref().map(decode_dt).transpose()?,
      other_participant_id: self.other_user_id,
      owner_auth:           self.auth_id.as_deref().map(decode_uuid).transpose()?,
    })
  }

  /// The inverse of [`Self::into_subscription`]; infallible.
  pub fn from_subscription(s: &Subscription) -> Self {
    Self {
      local_id:      encode_uuid(s.local_id),
      identifier:    s.identifier.clone(),
      auth_id:       s.owner_auth.map(encode_uuid),
      kind:          s.kind_code.clone(),
      rid:           s.room_reference.clone(),
      name:          s.display_name.clone(),
      unread:        i64::from(s.unread_count),
      open:          s.is_open,
      alert:         s.has_alert,
      favorite:      s.is_favorite,
      created_at:    s.created_at.map(encode_dt),
      last_seen:     s.last_seen_at.map(encode_dt),
      other_user_id: s.other_participant_id.clone(),
    }
  }
}

/// Values read directly from an `auths` row.
pub struct RawAuth {
  pub auth_id:    String,
  pub server_url: String,
  pub user_id:    String,
  pub created_at: String,
}

impl RawAuth {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      auth_id:    row.get(0)?,
      server_url: row.get(1)?,
      user_id:    row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_auth(self) -> Result<Auth> {
    Ok(Auth {
      auth_id:    decode_uuid(&self.auth_id)?,
      server_url: self.server_url,
      user_id:    self.user_id,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    identifier: row.get(0)?,
    username:   row.get(1)?,
    name:       row.get(2)?,
  })
}

/// Values read directly from a `messages` row.
pub struct RawMessage {
  pub identifier:      String,
  pub subscription_id: String,
  pub user_id:         Option<String>,
  pub text:            String,
  pub created_at:      Option<String>,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identifier:      row.get(0)?,
      subscription_id: row.get(1)?,
      user_id:         row.get(2)?,
      text:            row.get(3)?,
      created_at:      row.get(4)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      identifier:      self.identifier,
      subscription_id: decode_uuid(&self.subscription_id)?,
      user_id:         self.user_id,
      text:            self.text,
      created_at:      self.created_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
