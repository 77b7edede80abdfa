// ============================
// crates/backend-lib/src/tenants.rs
// ============================
//! Tenant credentials: webhook secrets and viewer passwords.
use std::fmt;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::meetings::TenantId;

/// Minimum length of secret tokens and viewer passwords
pub const MIN_CREDENTIAL_LENGTH: usize = 15;

/// Credentials of one tenant account
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub account_id: TenantId,
    pub secret_token: String,
    pub viewer_password: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("account_id", &self.account_id)
            .field("secret_token", &"<redacted>")
            .field("viewer_password", &"<redacted>")
            .finish()
    }
}

impl Account {
    pub fn new(account_id: impl Into<String>, secret_token: impl Into<String>, viewer_password: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            secret_token: secret_token.into(),
            viewer_password: viewer_password.into(),
        }
    }

    /// Check the credential length rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.account_id.is_empty() {
            return Err(AppError::Directory("account id must not be empty".to_string()));
        }
        if self.secret_token.chars().count() < MIN_CREDENTIAL_LENGTH
            || self.viewer_password.chars().count() < MIN_CREDENTIAL_LENGTH
        {
            return Err(AppError::Directory(format!(
                "secret token and viewer password of account {} must be at least {MIN_CREDENTIAL_LENGTH} characters",
                self.account_id
            )));
        }
        Ok(())
    }
}

/// Lookup of tenant credentials
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Webhook secret of `tenant`, if it is known
    async fn secret_for(&self, tenant: &str) -> Option<String>;

    /// Tenant owning a viewer password
    async fn tenant_for_password(&self, password: &str) -> Option<TenantId>;
}

/// Directory held in memory, filled from configuration
#[derive(Default)]
pub struct InMemoryTenantDirectory {
    secrets: DashMap<TenantId, String>,
    passwords: DashMap<String, TenantId>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_accounts<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Result<Self, AppError> {
        let directory = Self::new();
        for account in accounts {
            directory.add_account(account.clone())?;
        }
        Ok(directory)
    }

    /// Register an account; ids and viewer passwords must be unique
    pub fn add_account(&self, account: Account) -> Result<(), AppError> {
        account.validate()?;

        let secret_slot = match self.secrets.entry(account.account_id.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::Directory(format!("account {} already exists", account.account_id)));
            },
            Entry::Vacant(slot) => slot,
        };
        match self.passwords.entry(account.viewer_password) {
            Entry::Occupied(_) => {
                return Err(AppError::Directory(format!(
                    "viewer password of account {} is already in use",
                    account.account_id
                )));
            },
            Entry::Vacant(slot) => {
                slot.insert(account.account_id.clone());
            },
        }
        secret_slot.insert(account.secret_token);

        info!(tenant = %account.account_id, "registered account");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn secret_for(&self, tenant: &str) -> Option<String> {
        self.secrets.get(tenant).map(|secret| secret.value().clone())
    }

    async fn tenant_for_password(&self, password: &str) -> Option<TenantId> {
        if password.is_empty() {
            return None;
        }
        self.passwords.get(password).map(|tenant| tenant.value().clone())
    }
}
