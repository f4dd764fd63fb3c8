//! Messages belonging to a subscription.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message. The subscription does not hold its messages; each
/// message points back at its subscription by local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  /// Server id.
  pub identifier:      String,
  /// [`Subscription::local_id`](crate::subscription::Subscription::local_id)
  /// of the owning subscription.
  pub subscription_id: Uuid,
  pub user_id:         Option<String>,
  pub text:            String,
  pub created_at:      Option<DateTime<Utc>>,
}
