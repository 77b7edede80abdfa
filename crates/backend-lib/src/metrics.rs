// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WEBHOOK_RECEIVED: &str = "webhook.received";
pub const WEBHOOK_REJECTED: &str = "webhook.rejected";
pub const WEBHOOK_IGNORED: &str = "webhook.ignored";
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_REJECTED: &str = "ws.rejected";
pub const PUSH_DELIVERED: &str = "push.delivered";
pub const SUBSCRIPTIONS_PRUNED: &str = "subscriptions.pruned";
pub const MEETINGS_SWEPT: &str = "meetings.swept";
pub const TENANTS_ACTIVE: &str = "tenants.active";
pub const VIEWER_LOGIN_FAILED: &str = "viewer.login_failed";
