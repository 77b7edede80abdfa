// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! Router and WebSocket connection handling.
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use rollcall_common::PushMessage;
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, debug_span, error, info, warn, Span};

use crate::connections::SubscriptionHandle;
use crate::error::AppError;
use crate::handlers;
use crate::meetings::TenantId;
use crate::metrics as keys;
use crate::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::prompt_page).post(handlers::login))
        .route("/webhook", post(handlers::webhook_handler))
        .route("/ws", get(ws_handler))
        .route("/demo", get(handlers::demo_page))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

// The query string carries the viewer password, so only the path is recorded.
fn request_span(request: &Request<Body>) -> Span {
    debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub password: String,
}

/// `GET /ws?password=...`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if query.password.is_empty() {
        counter!(keys::WS_REJECTED, "reason" => "missing_password").increment(1);
        return Err(AppError::InvalidPassword);
    }
    let Some(tenant) = state.tenants.tenant_for_password(&query.password).await else {
        warn!("websocket connect with unknown password");
        counter!(keys::WS_REJECTED, "reason" => "password").increment(1);
        return Err(AppError::InvalidPassword);
    };

    let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());
    if !state.settings.origin_allowed(origin) {
        let origin = origin.unwrap_or("<none>").to_string();
        warn!(tenant, %origin, "websocket connect from disallowed origin");
        counter!(keys::WS_REJECTED, "reason" => "origin").increment(1);
        return Err(AppError::OriginNotAllowed(origin));
    }

    counter!(keys::WS_CONNECTION).increment(1);
    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, tenant)))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>, tenant: TenantId) {
    let (handle, rx) = state.broadcaster.subscribe(&tenant);
    info!(tenant, %handle, "viewer connected");

    let (sink, mut stream) = socket.split();
    let ping_every = state.settings.liveness_window() / 2;
    let mut writer = tokio::spawn(write_pushes(sink, rx, ping_every));

    let reader = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Close(_)) => break,
                // pongs count as activity too
                Ok(_) => {
                    state.connections.touch(&tenant, handle);
                },
                Err(e) => {
                    debug!(tenant, %handle, error = %e, "websocket read failed");
                    break;
                },
            }
        }
    };

    tokio::select! {
        _ = &mut writer => {},
        () = reader => writer.abort(),
    }

    close_subscription(&state, &tenant, handle);
}

fn close_subscription(state: &AppState, tenant: &str, handle: SubscriptionHandle) {
    let was_registered = state.connections.unregister(tenant, handle);
    info!(tenant, %handle, was_registered, "viewer disconnected");
}

/// Forward queued pushes to the socket, pinging while idle. Ends with a
/// Close frame once the subscription is dropped from the registry.
async fn write_pushes(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<PushMessage>,
    ping_every: Duration,
) {
    let mut ping = tokio::time::interval(ping_every.max(Duration::from_secs(1)));
    ping.tick().await;

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(error = %e, "failed to serialize push message");
                        continue;
                    },
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return;
                }
            },
        }
    }
}
