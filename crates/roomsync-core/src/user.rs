//! User records, the target of a direct message's other participant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  /// Server id.
  pub identifier: String,
  pub username:   String,
  pub name:       Option<String>,
}
