// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core functionality of the Rollcall server: webhook ingestion, per-tenant
//! meeting state and live fan-out to viewers.

pub mod broadcast;
pub mod config;
pub mod connections;
pub mod error;
pub mod events;
pub mod handlers;
pub mod meetings;
pub mod metrics;
pub mod prune;
pub mod render;
pub mod signature;
pub mod sweep;
pub mod tenants;
pub mod ws_router;

use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::Settings;
use crate::connections::ConnectionRegistry;
use crate::error::AppError;
use crate::events::EventProcessor;
use crate::meetings::MeetingStore;
use crate::tenants::{InMemoryTenantDirectory, TenantDirectory};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Meeting state of all tenants
    pub store: Arc<MeetingStore>,
    /// Live viewer subscriptions
    pub connections: Arc<ConnectionRegistry>,
    pub processor: EventProcessor,
    pub broadcaster: Broadcaster,
    /// Credential lookup
    pub tenants: Arc<dyn TenantDirectory>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create a new application state
    pub fn new(settings: Settings, tenants: Arc<dyn TenantDirectory>) -> Self {
        let store = Arc::new(MeetingStore::new());
        let connections = Arc::new(ConnectionRegistry::new());
        let processor = EventProcessor::new(Arc::clone(&store));
        let broadcaster = Broadcaster::new(
            Arc::clone(&store),
            Arc::clone(&connections),
            settings.liveness_window(),
            settings.subscriber_queue,
        );

        Self {
            store,
            connections,
            processor,
            broadcaster,
            tenants,
            settings: Arc::new(settings),
        }
    }

    /// Create a state whose tenant directory holds the configured accounts
    pub fn from_settings(settings: Settings) -> Result<Self, AppError> {
        let directory = InMemoryTenantDirectory::from_accounts(&settings.accounts)?;
        Ok(Self::new(settings, Arc::new(directory)))
    }
}
