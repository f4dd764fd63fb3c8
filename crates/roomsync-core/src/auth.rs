//! The authenticated session subscriptions point back to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A server login. Credentials are not persisted; only the identity that
/// subscriptions reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
  pub auth_id:    Uuid,
  pub server_url: String,
  /// Server id of the logged-in user.
  pub user_id:    String,
  pub created_at: DateTime<Utc>,
}
