//! Method-call envelopes.
//!
//! The REST endpoint `POST /api/v1/method.call/{method}` tunnels a DDP method
//! call: the request body is `{"message": "<DDP message as a JSON string>"}`
//! and the reply's `message` field is the DDP result, again as a string.

use roomsync_core::remote::MethodResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::Result;

#[derive(Debug, Serialize)]
pub struct CallEnvelope {
  pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyEnvelope {
  pub message: Option<String>,
  #[serde(default)]
  pub success: bool,
  /// Set by the REST layer itself, e.g. for an unknown method.
  #[serde(default)]
  pub error:   Option<String>,
}

#[derive(Debug, Deserialize)]
struct DdpReply {
  #[serde(default)]
  result: Value,
  #[serde(default)]
  error:  Option<Value>,
}

pub fn encode_call(id: u64, method: &str, params: &[Value]) -> Result<CallEnvelope> {
  let ddp = json!({
    "msg":    "method",
    "id":     id.to_string(),
    "method": method,
    "params": params,
  });
  Ok(CallEnvelope { message: serde_json::to_string(&ddp)? })
}

pub fn decode_reply(reply: ReplyEnvelope) -> Result<MethodResponse> {
  match reply.message {
    Some(message) => {
      let ddp: DdpReply = serde_json::from_str(&message)?;
      Ok(MethodResponse { result: ddp.result, error: ddp.error })
    }
    None if reply.success => Ok(MethodResponse::ok(Value::Null)),
    None => Ok(MethodResponse::failed(json!({
      "error": reply.error.unwrap_or_else(|| "unknown-error".to_owned()),
    }))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn call_is_a_json_string_inside_json() {
    let envelope = encode_call(7, "getRoomByTypeAndName", &[json!("c"), json!("general")]).unwrap();
    let inner: Value = serde_json::from_str(&envelope.message).unwrap();
    assert_eq!(
      inner,
      json!({
        "msg": "method", "id": "7", "method": "getRoomByTypeAndName",
        "params": ["c", "general"],
      })
    );
  }

  #[test]
  fn result_reply() {
    let reply: ReplyEnvelope = serde_json::from_value(json!({
      "message": "{\"msg\":\"result\",\"id\":\"1\",\"result\":{\"rid\":\"r1\"}}",
      "success": true,
    }))
    .unwrap();
    let response = decode_reply(reply).unwrap();
    assert!(!response.is_error());
    assert_eq!(response.result, json!({ "rid": "r1" }));
  }

  #[test]
  fn method_error_reply() {
    let reply: ReplyEnvelope = serde_json::from_value(json!({
      "message": "{\"msg\":\"result\",\"id\":\"1\",\"error\":{\"error\":\"error-invalid-user\",\"reason\":\"Invalid user\"}}",
      "success": true,
    }))
    .unwrap();
    let response = decode_reply(reply).unwrap();
    assert_eq!(response.error_reason().as_deref(), Some("Invalid user"));
  }

  #[test]
  fn rest_error_without_message() {
    let reply: ReplyEnvelope = serde_json::from_value(json!({
      "success": false, "error": "Method not found",
    }))
    .unwrap();
    let response = decode_reply(reply).unwrap();
    assert_eq!(response.error_reason().as_deref(), Some("Method not found"));
  }

  #[test]
  fn garbled_message_is_a_json_error() {
    let reply = ReplyEnvelope { message: Some("not json".into()), success: true, error: None };
    assert!(matches!(decode_reply(reply), Err(crate::Error::Json(_))));
  }
}
