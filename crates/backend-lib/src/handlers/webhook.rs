// ============================
// crates/backend-lib/src/handlers/webhook.rs
// ============================
//! Inbound provider webhooks.
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::counter;
use rollcall_common::{EventType, UrlValidationResponse, WebhookEnvelope};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::events::WebhookEvent;
use crate::metrics as keys;
use crate::signature::{encrypt_token, verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|value| value.to_str().ok()).unwrap_or_default()
}

fn rejected(reason: &'static str) {
    counter!(keys::WEBHOOK_REJECTED, "reason" => reason).increment(1);
}

/// `POST /webhook`
///
/// The body is kept as raw bytes since the signature covers it verbatim.
/// Event types the server does not handle are acknowledged with 200.
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "undecodable webhook body");
        rejected("malformed");
        AppError::MalformedInput(e)
    })?;
    let tenant = envelope.payload.account_id.as_str();

    let Some(secret) = state.tenants.secret_for(tenant).await else {
        warn!(tenant, event = %envelope.event, "webhook for unknown account");
        rejected("unknown_tenant");
        return Err(AppError::UnknownTenant(tenant.to_string()));
    };

    let timestamp = header(&headers, TIMESTAMP_HEADER);
    let signature = header(&headers, SIGNATURE_HEADER);
    if !verify_signature(&secret, &body, timestamp, signature) {
        warn!(tenant, event = %envelope.event, "webhook signature mismatch");
        rejected("signature");
        return Err(AppError::InvalidSignature(tenant.to_string()));
    }

    if envelope.event_type() == EventType::UrlValidation {
        let plain_token = envelope.payload.plain_token.clone().unwrap_or_default();
        info!(tenant, "answering endpoint validation");
        let response = UrlValidationResponse {
            encrypted_token: encrypt_token(&secret, &plain_token)?,
            plain_token,
        };
        return Ok(Json(response).into_response());
    }

    let event = WebhookEvent::from_envelope(&envelope);
    let (change, report) = state.broadcaster.apply_event(&state.processor, tenant, &event);
    debug!(tenant, ?change, delivered = report.delivered, pruned = report.pruned, "webhook handled");

    Ok(StatusCode::OK.into_response())
}
