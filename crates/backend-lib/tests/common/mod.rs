//! Shared setup for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use rollcall_backend_lib::config::Settings;
use rollcall_backend_lib::signature::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use rollcall_backend_lib::tenants::Account;
use rollcall_backend_lib::AppState;
use serde_json::{json, Value};

pub const TENANT: &str = "T1";
pub const SECRET: &str = "s3cr3t-key-minimum-length";
pub const PASSWORD: &str = "viewer-password-one";
pub const TIMESTAMP: &str = "1700000000";

pub fn test_settings() -> Settings {
    Settings {
        accounts: vec![Account::new(TENANT, SECRET, PASSWORD)],
        ..Settings::default()
    }
}

pub fn test_state() -> Arc<AppState> {
    state_with(test_settings())
}

pub fn state_with(settings: Settings) -> Arc<AppState> {
    Arc::new(AppState::from_settings(settings).unwrap())
}

/// Webhook body for `event` in meeting `uuid`
pub fn event_body(event: &str, uuid: &str, user_id: &str, user_name: &str) -> String {
    json!({
        "event": event,
        "payload": {
            "account_id": TENANT,
            "object": {
                "id": 85_123_456_789u64,
                "uuid": uuid,
                "topic": "Standup",
                "participant": { "user_id": user_id, "user_name": user_name, "email": "" }
            }
        }
    })
    .to_string()
}

/// POST /webhook signed with `secret`
pub fn webhook_request(body: &str, secret: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header(TIMESTAMP_HEADER, TIMESTAMP)
        .header(SIGNATURE_HEADER, sign(secret, TIMESTAMP, body.as_bytes()).unwrap())
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn signed(body: &str) -> Request<Body> {
    webhook_request(body, SECRET)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
