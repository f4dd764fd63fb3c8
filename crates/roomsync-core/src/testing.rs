//! In-process fakes of the store and the remote directory for unit tests.

use std::{
  collections::HashMap,
  convert::Infallible,
  sync::Mutex,
};

use chrono::Utc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
  Error,
  auth::Auth,
  document::SubscriptionDocument,
  message::Message,
  remote::{MethodResponse, RoomDirectory},
  store::EntityStore,
  subscription::{Subscription, SubscriptionKind},
  user::User,
};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
  auths:         HashMap<Uuid, Auth>,
  subscriptions: HashMap<Uuid, Subscription>,
  users:         HashMap<String, User>,
  messages:      HashMap<String, Message>,
}

/// A `HashMap`-backed [`EntityStore`]. Each call holds one lock for its whole
/// duration, which makes every mutation atomic.
#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
    self.tables.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl EntityStore for MemoryStore {
  type Error = Error;

  async fn ensure_auth(&self, server_url: String, user_id: String) -> Result<Auth, Error> {
    let mut t = self.tables();
    if let Some(auth) = t
      .auths
      .values()
      .find(|a| a.server_url == server_url && a.user_id == user_id)
    {
      return Ok(auth.clone());
    }
    let auth = Auth { auth_id: Uuid::new_v4(), server_url, user_id, created_at: Utc::now() };
    t.auths.insert(auth.auth_id, auth.clone());
    Ok(auth)
  }

  async fn get_auth(&self, auth_id: Uuid) -> Result<Option<Auth>, Error> {
    Ok(self.tables().auths.get(&auth_id).cloned())
  }

  async fn remove_auth(&self, auth_id: Uuid) -> Result<bool, Error> {
    let mut t = self.tables();
    let existed = t.auths.remove(&auth_id).is_some();
    for sub in t.subscriptions.values_mut() {
      if sub.owner_auth == Some(auth_id) {
        sub.owner_auth = None;
      }
    }
    Ok(existed)
  }

  async fn open_subscription(
    &self,
    kind: SubscriptionKind,
    display_name: String,
    owner_auth: Option<Uuid>,
  ) -> Result<Subscription, Error> {
    let sub = Subscription::new_local(kind, display_name, owner_auth);
    self.tables().subscriptions.insert(sub.local_id, sub.clone());
    Ok(sub)
  }

  async fn get_subscription(&self, local_id: Uuid) -> Result<Option<Subscription>, Error> {
    Ok(self.tables().subscriptions.get(&local_id).cloned())
  }

  async fn find_subscription(&self, identifier: String) -> Result<Option<Subscription>, Error> {
    Ok(
      self
        .tables()
        .subscriptions
        .values()
        .find(|s| s.identifier.as_deref() == Some(identifier.as_str()))
        .cloned(),
    )
  }

  async fn list_subscriptions(&self, owner_auth: Option<Uuid>) -> Result<Vec<Subscription>, Error> {
    Ok(
      self
        .tables()
        .subscriptions
        .values()
        .filter(|s| owner_auth.is_none() || s.owner_auth == owner_auth)
        .cloned()
        .collect(),
    )
  }

  async fn sync_subscription(
    &self,
    owner_auth: Option<Uuid>,
    document: SubscriptionDocument,
  ) -> Result<(Subscription, bool), Error> {
    let identifier = document.identifier.clone().ok_or(Error::MissingIdentifier)?;
    let mut t = self.tables();
    let existing = t
      .subscriptions
      .values()
      .find(|s| s.identifier.as_deref() == Some(identifier.as_str()))
      .cloned();
    let created = existing.is_none();
    let mut sub = existing
      .unwrap_or_else(|| Subscription::new_local(SubscriptionKind::Channel, "", None));
    sub.apply(&document);
    if owner_auth.is_some() {
      sub.owner_auth = owner_auth;
    }
    t.subscriptions.insert(sub.local_id, sub.clone());
    Ok((sub, created))
  }

  async fn update_subscription<F>(&self, local_id: Uuid, mutate: F) -> Result<Option<Subscription>, Error>
  where
    F: FnOnce(&mut Subscription) + Send + 'static,
  {
    let mut t = self.tables();
    Ok(t.subscriptions.get_mut(&local_id).map(|sub| {
      mutate(sub);
      sub.clone()
    }))
  }

  async fn merge_subscription(
    &self,
    local_id: Uuid,
    document: SubscriptionDocument,
  ) -> Result<Option<Subscription>, Error> {
    let mut t = self.tables();
    let Some(placeholder) = t.subscriptions.get(&local_id).cloned() else {
      return Ok(None);
    };

    let holder = match (&placeholder.identifier, &document.identifier) {
      (None, Some(identifier)) => t
        .subscriptions
        .values()
        .find(|s| s.local_id != local_id && s.identifier.as_ref() == Some(identifier))
        .map(|s| s.local_id),
      _ => None,
    };

    let mut sub = match holder {
      Some(holder) => {
        t.subscriptions.remove(&local_id);
        for message in t.messages.values_mut() {
          if message.subscription_id == local_id {
            message.subscription_id = holder;
          }
        }
        let mut sub = t.subscriptions[&holder].clone();
        sub.owner_auth = sub.owner_auth.or(placeholder.owner_auth);
        sub
      }
      None => placeholder,
    };
    sub.apply(&document);
    t.subscriptions.insert(sub.local_id, sub.clone());
    Ok(Some(sub))
  }

  async fn remove_subscription(&self, local_id: Uuid) -> Result<bool, Error> {
    let mut t = self.tables();
    t.messages.retain(|_, m| m.subscription_id != local_id);
    Ok(t.subscriptions.remove(&local_id).is_some())
  }

  async fn upsert_user(&self, user: User) -> Result<(), Error> {
    self.tables().users.insert(user.identifier.clone(), user);
    Ok(())
  }

  async fn find_user(&self, identifier: String) -> Result<Option<User>, Error> {
    Ok(self.tables().users.get(&identifier).cloned())
  }

  async fn upsert_message(&self, message: Message) -> Result<(), Error> {
    let mut t = self.tables();
    if !t.subscriptions.contains_key(&message.subscription_id) {
      return Err(Error::SubscriptionNotFound(message.subscription_id));
    }
    t.messages.insert(message.identifier.clone(), message);
    Ok(())
  }

  async fn messages_for(&self, subscription_id: Uuid) -> Result<Vec<Message>, Error> {
    let mut messages: Vec<_> = self
      .tables()
      .messages
      .values()
      .filter(|m| m.subscription_id == subscription_id)
      .cloned()
      .collect();
    messages.sort_by_key(|m| m.created_at);
    Ok(messages)
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Gate {
  called:  Notify,
  release: Notify,
}

/// A [`RoomDirectory`] that answers every call with one canned response and
/// records what was asked.
pub struct FakeDirectory {
  response: MethodResponse,
  calls:    Mutex<Vec<(String, String)>>,
  gate:     Option<Gate>,
}

impl FakeDirectory {
  pub fn answering(response: MethodResponse) -> Self {
    Self { response, calls: Mutex::new(Vec::new()), gate: None }
  }

  /// Hold every answer until [`Self::release`] is called.
  pub fn gated(mut self) -> Self {
    self.gate = Some(Gate::default());
    self
  }

  pub fn calls(&self) -> Vec<(String, String)> {
    self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  pub async fn wait_for_call(&self) {
    if let Some(gate) = &self.gate {
      gate.called.notified().await;
    }
  }

  pub fn release(&self) {
    if let Some(gate) = &self.gate {
      gate.release.notify_one();
    }
  }

  async fn answer(&self, method: &str, argument: String) -> Result<MethodResponse, Infallible> {
    self
      .calls
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push((method.to_owned(), argument));
    if let Some(gate) = &self.gate {
      gate.called.notify_one();
      gate.release.notified().await;
    }
    Ok(self.response.clone())
  }
}

impl RoomDirectory for FakeDirectory {
  type Error = Infallible;

  async fn room_by_name(&self, name: String) -> Result<MethodResponse, Infallible> {
    self.answer("room_by_name", name).await
  }

  async fn create_direct_message(&self, username: String) -> Result<MethodResponse, Infallible> {
    self.answer("create_direct_message", username).await
  }
}
