//! Durable record types owned by the credential store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The GitHub App's own identity, created once by the manifest onboarding
/// flow. At most one exists per deployment; `None` from the store means the
/// app has not been onboarded yet and is a normal, recoverable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppIdentity {
    /// GitHub App ID (numeric)
    pub app_id: i64,
    /// PEM private key for JWT signing
    pub private_key_pem: String,
    /// Webhook secret for signature verification
    pub webhook_secret: String,
    pub updated_at: DateTime<Utc>,
}

/// One installation of the App on a user or organization account.
/// Upserted idempotently from `installation` / `installation_repositories`
/// webhook deliveries; never deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    /// GitHub installation ID (numeric, GitHub-assigned)
    pub id: i64,
    pub account_login: String,
    pub account_id: i64,
    /// 'User' or 'Organization'
    pub account_type: String,
    pub app_id: i64,
    /// Granted permission scopes, e.g. contents -> read
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
    /// Subscribed event names
    #[serde(default)]
    pub events: Vec<String>,
    /// Repositories the installation grants access to
    #[serde(default)]
    pub repositories: Vec<InstallationRepository>,
    pub created_at: DateTime<Utc>,
}

impl Installation {
    /// Whether this installation grants access to `owner/name`.
    pub fn covers_repo(&self, full_name: &str) -> bool {
        self.repositories.iter().any(|r| r.full_name == full_name)
    }

    /// Whether the contents scope allows cloning/fetching.
    pub fn can_read_contents(&self) -> bool {
        matches!(
            self.permissions.get("contents").map(String::as_str),
            Some("read") | Some("write")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationRepository {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
}

/// Append-only audit record of one inbound webhook delivery. Written before
/// the delivery is interpreted; replayed delivery ids produce new records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRecord {
    /// Delivery ID from the X-GitHub-Delivery header
    pub id: String,
    /// Event name from the X-GitHub-Event header
    pub event: String,
    pub timestamp: DateTime<Utc>,
    /// Raw decoded body, stored verbatim
    pub payload: serde_json::Value,
}
