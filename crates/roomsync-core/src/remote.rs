//! The `RoomDirectory` trait: remote calls that resolve room references.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply to a server method call: either a `result` document or an `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
  #[serde(default)]
  pub result: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:  Option<Value>,
}

impl MethodResponse {
  pub fn ok(result: Value) -> Self { Self { result, error: None } }

  pub fn failed(error: Value) -> Self { Self { result: Value::Null, error: Some(error) } }

  pub fn is_error(&self) -> bool { self.error.as_ref().is_some_and(|e| !e.is_null()) }

  /// A human-readable reason when the server reported an error.
  ///
  /// Server errors look like `{"error": "error-not-allowed", "reason":
  /// "Not allowed", ...}`; the most specific text available is used.
  pub fn error_reason(&self) -> Option<String> {
    if !self.is_error() {
      return None;
    }
    let error = self.error.as_ref()?;
    let reason = ["reason", "message", "error"]
      .iter()
      .find_map(|key| error.get(key))
      .map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      })
      .unwrap_or_else(|| match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      });
    Some(reason)
  }
}

/// Server-side room lookups used to resolve locally created subscriptions.
///
/// `Self::Error` covers transport failures; errors reported by the server
/// arrive inside [`MethodResponse`].
pub trait RoomDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look a public channel up by name. On success `result` is a
  /// subscription-shaped room document.
  fn room_by_name(
    &self,
    name: String,
  ) -> impl Future<Output = Result<MethodResponse, Self::Error>> + Send + '_;

  /// Create (or fetch) the direct-message room with `username`. On success
  /// `result` carries at least `rid`.
  fn create_direct_message(
    &self,
    username: String,
  ) -> impl Future<Output = Result<MethodResponse, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn reason_prefers_most_specific_text() {
    let r = MethodResponse::failed(json!({
      "error": "error-not-allowed", "reason": "Not allowed",
    }));
    assert!(r.is_error());
    assert_eq!(r.error_reason().as_deref(), Some("Not allowed"));

    let r = MethodResponse::failed(json!({ "error": 500 }));
    assert_eq!(r.error_reason().as_deref(), Some("500"));

    let r = MethodResponse::failed(json!("boom"));
    assert_eq!(r.error_reason().as_deref(), Some("boom"));
  }

  #[test]
  fn null_error_is_not_an_error() {
    let r: MethodResponse =
      serde_json::from_value(json!({ "result": { "rid": "r1" }, "error": null })).unwrap();
    assert!(!r.is_error());
    assert_eq!(r.error_reason(), None);
  }
}
