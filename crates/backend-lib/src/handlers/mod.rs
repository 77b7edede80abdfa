// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.

pub mod viewer;
pub mod webhook;

pub use viewer::{demo_page, login, prompt_page};
pub use webhook::webhook_handler;

/// Liveness check
pub async fn health() -> &'static str {
    "Healthy"
}
