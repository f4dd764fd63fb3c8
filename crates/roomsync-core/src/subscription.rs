//! A user's membership in a chat room.
//!
//! Subscriptions are created either by the first sync of a remote document
//! or locally (see [`Subscription::new_local`]) before the server has
//! assigned a room. Every later sync overwrites the mapped fields in full.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  document::SubscriptionDocument,
  message::Message,
  store::EntityStore,
  user::User,
};

/// The kind of room a subscription points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
  DirectMessage,
  Channel,
  Group,
}

impl SubscriptionKind {
  /// The single-letter code used on the wire and in the store.
  pub fn code(self) -> &'static str {
    match self {
      Self::DirectMessage => "d",
      Self::Channel => "c",
      Self::Group => "p",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    match code {
      "d" => Some(Self::DirectMessage),
      "c" => Some(Self::Channel),
      "p" => Some(Self::Group),
      _ => None,
    }
  }

  /// Like [`Self::from_code`], but unknown codes read as [`Self::Group`].
  pub fn resolve(code: &str) -> Self { Self::from_code(code).unwrap_or(Self::Group) }
}

/// A persisted membership of the authenticated user in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  /// Local primary key; exists before the server assigns `identifier`.
  pub local_id:             Uuid,
  /// Server id. Assigned once by the first sync and never overwritten.
  pub identifier:           Option<String>,
  pub room_reference:       String,
  /// Raw kind code as last received. Read through [`Subscription::kind`].
  pub kind_code:            String,
  pub display_name:         String,
  pub unread_count:         u32,
  pub is_open:              bool,
  pub has_alert:            bool,
  pub is_favorite:          bool,
  pub created_at:           Option<DateTime<Utc>>,
  pub last_seen_at:         Option<DateTime<Utc>>,
  /// Only maintained for direct messages.
  pub other_participant_id: Option<String>,
  /// Back-reference to the owning [`Auth`](crate::auth::Auth) session.
  pub owner_auth:           Option<Uuid>,
}

impl Subscription {
  /// A subscription that exists only locally, with no server identity and
  /// no room reference yet.
  pub fn new_local(
    kind: SubscriptionKind,
    display_name: impl Into<String>,
    owner_auth: Option<Uuid>,
  ) -> Self {
    Self {
      local_id: Uuid::new_v4(),
      identifier: None,
      room_reference: String::new(),
      kind_code: kind.code().to_owned(),
      display_name: display_name.into(),
      unread_count: 0,
      is_open: false,
      has_alert: false,
      is_favorite: false,
      created_at: None,
      last_seen_at: None,
      other_participant_id: None,
      owner_auth,
    }
  }

  pub fn kind(&self) -> SubscriptionKind { SubscriptionKind::resolve(&self.kind_code) }

  pub fn set_kind(&mut self, kind: SubscriptionKind) {
    self.kind_code = kind.code().to_owned();
  }

  /// A subscription without a room reference cannot be used to talk to the
  /// server.
  pub fn is_valid(&self) -> bool { !self.room_reference.is_empty() }

  /// Channels are only joined when an auth session owns them; direct
  /// messages and groups always are.
  pub fn is_joined(&self) -> bool {
    self.owner_auth.is_some() || self.kind() != SubscriptionKind::Channel
  }

  /// Overwrite the mapped fields from a remote document.
  ///
  /// `identifier` is only taken when unset. Dates and the other participant
  /// are only taken when the document carries them.
  pub fn apply(&mut self, document: &SubscriptionDocument) {
    if self.identifier.is_none() {
      self.identifier = document.identifier.clone();
    }

    self.room_reference = document.room_reference.clone();
    self.display_name = document.display_name.clone();
    self.unread_count = document.unread_count;
    self.is_open = document.is_open;
    self.has_alert = document.has_alert;
    self.is_favorite = document.is_favorite;
    self.kind_code = document.kind_code.clone();

    if let Some(other) = &document.other_participant_id {
      self.other_participant_id = Some(other.clone());
    }
    if let Some(at) = document.created_at {
      self.created_at = Some(at);
    }
    if let Some(at) = document.last_seen_at {
      self.last_seen_at = Some(at);
    }
  }

  // ── Derived relationships ─────────────────────────────────────────────────

  /// The user on the other side of a direct message, looked up on every
  /// call.
  pub async fn direct_message_user<S: EntityStore>(
    &self,
    store: &S,
  ) -> Result<Option<User>, S::Error> {
    match &self.other_participant_id {
      Some(id) => store.find_user(id.clone()).await,
      None => Ok(None),
    }
  }

  /// Messages pointing back at this subscription, oldest first.
  pub async fn messages<S: EntityStore>(
    &self,
    store: &S,
  ) -> Result<Vec<Message>, S::Error> {
    store.messages_for(self.local_id).await
  }
}
