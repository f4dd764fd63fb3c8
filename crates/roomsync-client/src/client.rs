//! Async HTTP client wrapping the server's method-call endpoint.

use std::{
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

use reqwest::Client;
use roomsync_core::remote::{MethodResponse, RoomDirectory};
use serde_json::{Value, json};

use crate::{
  Error, Result,
  wire::{ReplyEnvelope, decode_reply, encode_call},
};

/// Connection settings for the chat server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub server_url: String,
  pub user_id:    String,
  pub auth_token: String,
}

/// Async HTTP client for the server's method calls.
///
/// One shared [`reqwest::Client`] per instance; wrap in an `Arc` to share.
pub struct ApiClient {
  client:  Client,
  config:  ApiConfig,
  next_id: AtomicU64,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config, next_id: AtomicU64::new(1) })
  }

  fn url(&self, method: &str) -> String {
    format!(
      "{}/api/v1/method.call/{}",
      self.config.server_url.trim_end_matches('/'),
      method
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.user_id.is_empty() {
      req
    } else {
      req
        .header("X-User-Id", &self.config.user_id)
        .header("X-Auth-Token", &self.config.auth_token)
    }
  }

  /// `POST /api/v1/method.call/{method}`
  ///
  /// Errors reported by the method itself come back inside the
  /// [`MethodResponse`]; only transport and envelope failures are `Err`.
  pub async fn call(&self, method: &str, params: &[Value]) -> Result<MethodResponse> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let body = encode_call(id, method, params)?;
    tracing::debug!(%method, id, "calling server method");

    let resp = self
      .auth(self.client.post(self.url(method)))
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
      return Err(Error::Status { method: method.to_owned(), status });
    }

    let reply: ReplyEnvelope = resp.json().await?;
    decode_reply(reply)
  }
}

impl RoomDirectory for ApiClient {
  type Error = Error;

  async fn room_by_name(&self, name: String) -> Result<MethodResponse> {
    self.call("getRoomByTypeAndName", &[json!("c"), json!(name)]).await
  }

  async fn create_direct_message(&self, username: String) -> Result<MethodResponse> {
    self.call("createDirectMessage", &[json!(username)]).await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Json, Router,
    http::{HeaderMap, Method, StatusCode, Uri},
  };
  use serde_json::json;
  use tokio::{net::TcpListener, sync::oneshot};

  use super::*;

  /// One request as the test server saw it.
  struct Captured {
    method:  Method,
    path:    String,
    headers: HeaderMap,
    body:    String,
  }

  impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
      self.headers.get(name).and_then(|v| v.to_str().ok())
    }
  }

  /// Answer every request with `status` and a JSON `reply`, handing the
  /// first request back through the returned channel.
  async fn serve(
    status: StatusCode,
    reply: Value,
  ) -> (String, oneshot::Receiver<Captured>) {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let app = Router::new().fallback(
      move |method: Method, uri: Uri, headers: HeaderMap, body: String| {
        let tx = Arc::clone(&tx);
        let reply = reply.clone();
        async move {
          if let Some(tx) = tx.lock().unwrap().take() {
            let path = uri.path().to_owned();
            tx.send(Captured { method, path, headers, body }).ok();
          }
          (status, Json(reply))
        }
      },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (address, rx)
  }

  fn client(server_url: String) -> ApiClient {
    ApiClient::new(ApiConfig {
      server_url,
      user_id: "U1".into(),
      auth_token: "secret".into(),
    })
    .unwrap()
  }

  #[test]
  fn url_joins_without_double_slash() {
    let c = client("https://chat.example.com/".into());
    assert_eq!(
      c.url("createDirectMessage"),
      "https://chat.example.com/api/v1/method.call/createDirectMessage"
    );
  }

  #[tokio::test]
  async fn room_lookup_returns_result_document() {
    let reply = json!({
      "message": json!({
        "msg": "result", "id": "1",
        "result": { "_id": "s1", "rid": "GENERAL", "name": "general", "t": "c" },
      })
      .to_string(),
      "success": true,
    });
    let (address, rx) = serve(StatusCode::OK, reply).await;

    let response = client(address).room_by_name("general".into()).await.unwrap();
    assert!(!response.is_error());
    assert_eq!(response.result["rid"], "GENERAL");

    let captured = rx.await.unwrap();
    let envelope: Value = serde_json::from_str(&captured.body).unwrap();
    let ddp: Value = serde_json::from_str(envelope["message"].as_str().unwrap()).unwrap();
    assert_eq!(ddp["method"], "getRoomByTypeAndName");
    assert_eq!(ddp["params"], json!(["c", "general"]));
  }

  #[tokio::test]
  async fn request_carries_auth_headers() {
    let reply = json!({
      "message": json!({ "msg": "result", "id": "1", "result": { "rid": "U1U2" } }).to_string(),
      "success": true,
    });
    let (address, rx) = serve(StatusCode::OK, reply).await;
    let response = client(address).create_direct_message("bob".into()).await.unwrap();
    assert_eq!(response.result["rid"], "U1U2");

    let captured = rx.await.unwrap();
    assert_eq!(captured.method, Method::POST);
    assert_eq!(captured.path, "/api/v1/method.call/createDirectMessage");
    assert_eq!(captured.header("x-user-id"), Some("U1"));
    assert_eq!(captured.header("x-auth-token"), Some("secret"));
  }

  #[tokio::test]
  async fn bad_request_is_decoded_as_method_error() {
    let reply = json!({ "success": false, "error": "Method not found" });
    let (address, _rx) = serve(StatusCode::BAD_REQUEST, reply).await;
    let response = client(address).room_by_name("general".into()).await.unwrap();
    assert_eq!(response.error_reason().as_deref(), Some("Method not found"));
  }

  #[tokio::test]
  async fn unauthorized_is_a_status_error() {
    let reply = json!({ "status": "error", "message": "You must be logged in to do this." });
    let (address, _rx) = serve(StatusCode::UNAUTHORIZED, reply).await;
    let err = client(address).room_by_name("general".into()).await.unwrap_err();
    assert!(matches!(
      err,
      Error::Status { status, .. } if status == reqwest::StatusCode::UNAUTHORIZED
    ));
  }
}
