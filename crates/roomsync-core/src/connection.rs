//! Reacting to the real-time transport going up and down.
//!
//! The handler owns no transport; it is told about connection changes and
//! translates them into view updates plus a refresh request for the
//! subscription currently on screen.

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// The parts of a chat screen that depend on connectivity.
pub trait ChatView {
  fn show_offline_indicator(&mut self);
  fn hide_offline_indicator(&mut self);
  /// Enable or disable sending new messages.
  fn set_send_enabled(&mut self, enabled: bool);
}

/// Notifications from the transport. They carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
  Connected,
  Disconnected,
}

/// Ask the sync layer to re-fetch pending messages of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
  pub subscription_id: Uuid,
}

pub struct ConnectionHandler<V> {
  view:            V,
  subscription_id: Option<Uuid>,
  refresh:         mpsc::UnboundedSender<RefreshRequest>,
  offline_shown:   bool,
}

impl<V: ChatView> ConnectionHandler<V> {
  pub fn new(view: V, refresh: mpsc::UnboundedSender<RefreshRequest>) -> Self {
    Self { view, subscription_id: None, refresh, offline_shown: false }
  }

  /// Set the subscription whose messages are refreshed on reconnect.
  pub fn set_subscription(&mut self, subscription_id: Option<Uuid>) {
    self.subscription_id = subscription_id;
  }

  pub fn view(&self) -> &V { &self.view }

  pub fn is_offline_shown(&self) -> bool { self.offline_shown }

  pub fn on_connect(&mut self) {
    info!("transport connected");
    if self.offline_shown {
      self.view.hide_offline_indicator();
      self.offline_shown = false;
    }

    if let Some(subscription_id) = self.subscription_id
      && self.refresh.send(RefreshRequest { subscription_id }).is_err()
    {
      debug!(%subscription_id, "refresh receiver gone; skipping refresh");
    }

    self.view.set_send_enabled(true);
  }

  pub fn on_disconnect(&mut self) {
    info!("transport disconnected");
    if !self.offline_shown {
      self.view.show_offline_indicator();
      self.offline_shown = true;
    }
  }

  pub fn handle(&mut self, event: TransportEvent) {
    match event {
      TransportEvent::Connected => self.on_connect(),
      TransportEvent::Disconnected => self.on_disconnect(),
    }
  }

  /// Dispatch events until the sender side is dropped, then hand the
  /// handler back.
  pub async fn run(mut self, mut events: mpsc::Receiver<TransportEvent>) -> Self {
    while let Some(event) = events.recv().await {
      self.handle(event);
    }
    self
  }
}
