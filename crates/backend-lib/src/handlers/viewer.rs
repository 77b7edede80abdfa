// ============================
// crates/backend-lib/src/handlers/viewer.rs
// ============================
//! Password-gated participant page.
use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::Form;
use chrono::Utc;
use metrics::counter;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::metrics as keys;
use crate::render::{render_demo, render_prompt, render_roster};
use crate::AppState;

pub const WRONG_PASSWORD: &str = "Wrong password.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

/// `GET /`
pub async fn prompt_page() -> Html<String> {
    Html(render_prompt(None))
}

/// `POST /`: the latest meeting of the tenant owning the password
pub async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Html<String> {
    let Some(tenant) = state.tenants.tenant_for_password(&form.password).await else {
        warn!("viewer login with unknown password");
        counter!(keys::VIEWER_LOGIN_FAILED).increment(1);
        return Html(render_prompt(Some(WRONG_PASSWORD)));
    };

    let snapshot = state.store.snapshot_latest_meeting(&tenant);
    debug!(
        tenant,
        meeting = snapshot.as_ref().map(|s| s.meeting_id.as_str()),
        "rendering participant page"
    );
    Html(render_roster(snapshot.as_ref(), &form.password))
}

/// `GET /demo`
pub async fn demo_page() -> Html<String> {
    Html(render_demo(Utc::now()))
}
