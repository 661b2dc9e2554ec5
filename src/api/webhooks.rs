//! GitHub webhook intake.
//!
//! Each delivery walks a fixed pipeline: signature check, append-only audit
//! record, then routing by event kind. The record is written before any
//! interpretation, so durability wins over parsing; once it is on disk the
//! endpoint answers 200 even for event types we do not handle, because
//! GitHub must not retry business-logic no-ops.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::events::EventKind;
use crate::github::Error;
use crate::store::{Installation, InstallationRepository, WebhookRecord};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Closed set of event kinds this service routes on. New event types are
/// additions here, not string matches scattered through handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WebhookEvent {
    Installation,
    InstallationRepositories,
    Push,
    PullRequest,
    CheckSuite,
    Unknown(String),
}

impl WebhookEvent {
    fn parse(name: &str) -> Self {
        match name {
            "installation" => Self::Installation,
            "installation_repositories" => Self::InstallationRepositories,
            "push" => Self::Push,
            "pull_request" => Self::PullRequest,
            "check_suite" => Self::CheckSuite,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Verify the X-Hub-Signature-256 header (format: sha256=<hex>) against an
/// HMAC of the raw body. Comparison is constant-time.
fn verify_signature(secret: &str, signature_header: &str, payload: &[u8]) -> bool {
    let signature = match signature_header.strip_prefix("sha256=") {
        Some(sig) => sig,
        None => return false,
    };

    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, Error> {
    let event_name = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::PayloadUnreadable("missing X-GitHub-Event header".to_string()))?
        .to_string();

    let delivery_id = headers
        .get("X-GitHub-Delivery")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            tracing::warn!("Delivery without X-GitHub-Delivery header, generating id");
            Uuid::new_v4().to_string()
        });

    let identity = state
        .store
        .load_app_identity()?
        .ok_or(Error::IdentityMissing)?;

    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::SignatureMissing)?;

    if !verify_signature(&identity.webhook_secret, signature, &body) {
        tracing::warn!(delivery = %delivery_id, "Webhook signature verification failed");
        return Err(Error::SignatureInvalid);
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::PayloadUnreadable(e.to_string()))?;

    // Audit record first, routing second.
    state.store.append_webhook_record(&WebhookRecord {
        id: delivery_id.clone(),
        event: event_name.clone(),
        timestamp: Utc::now(),
        payload: payload.clone(),
    })?;

    match WebhookEvent::parse(&event_name) {
        WebhookEvent::Installation | WebhookEvent::InstallationRepositories => {
            upsert_from_installation_event(&state, &delivery_id, &payload)?;
        }
        WebhookEvent::Push => {
            let subscribers = state.bus.publish(EventKind::GitPush, payload);
            tracing::info!(delivery = %delivery_id, subscribers, "Forwarded push event");
        }
        WebhookEvent::PullRequest | WebhookEvent::CheckSuite => {
            tracing::debug!(delivery = %delivery_id, event = %event_name, "Event accepted, not handled");
        }
        WebhookEvent::Unknown(other) => {
            tracing::info!(delivery = %delivery_id, event = %other, "Ignoring unhandled event type");
        }
    }

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct InstallationEventPayload {
    installation: InstallationPayload,
    #[serde(default)]
    repositories: Vec<RepositoryPayload>,
    #[serde(default)]
    repositories_added: Vec<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct InstallationPayload {
    id: i64,
    app_id: i64,
    account: AccountPayload,
    #[serde(default)]
    permissions: BTreeMap<String, String>,
    #[serde(default)]
    events: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    login: String,
    id: i64,
    #[serde(rename = "type")]
    account_type: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    id: i64,
    full_name: String,
    #[serde(default)]
    private: bool,
}

/// Denormalize the nested installation payload into our registry record.
/// A body that decoded as JSON but not as an installation event is logged
/// and dropped; the audit record already exists and GitHub gets a 200.
fn upsert_from_installation_event(
    state: &AppState,
    delivery_id: &str,
    payload: &serde_json::Value,
) -> Result<(), Error> {
    let event: InstallationEventPayload = match serde_json::from_value(payload.clone()) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(delivery = %delivery_id, error = %e, "Unparseable installation payload");
            return Ok(());
        }
    };

    let repositories = if !event.repositories.is_empty() {
        event.repositories
    } else {
        event.repositories_added
    };

    let installation = Installation {
        id: event.installation.id,
        account_login: event.installation.account.login,
        account_id: event.installation.account.id,
        account_type: event.installation.account.account_type,
        app_id: event.installation.app_id,
        permissions: event.installation.permissions,
        events: event.installation.events,
        repositories: repositories
            .into_iter()
            .map(|r| InstallationRepository {
                id: r.id,
                full_name: r.full_name,
                private: r.private,
            })
            .collect(),
        created_at: Utc::now(),
    };

    tracing::info!(
        delivery = %delivery_id,
        installation_id = installation.id,
        account = %installation.account_login,
        "Upserting installation from webhook"
    );
    state.store.upsert_installation(&installation)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::EventBus;
    use crate::github::{GitHubClient, TokenCache, TokenIssuer};
    use crate::store::{AppIdentity, CredentialStore};

    const SECRET: &str = "hooksecret";

    fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CredentialStore::new(dir.path()).unwrap());
        store
            .save_app_identity(&AppIdentity {
                app_id: 7777,
                private_key_pem: "unused".to_string(),
                webhook_secret: SECRET.to_string(),
                updated_at: Utc::now(),
            })
            .unwrap();
        let issuer = Arc::new(TokenIssuer::new(
            store.clone(),
            Arc::new(TokenCache::new()),
            GitHubClient::new("http://127.0.0.1:1"),
        ));
        let state = Arc::new(AppState {
            config: Config::default(),
            store,
            issuer,
            bus: Arc::new(EventBus::new(8)),
        });
        (dir, state)
    }

    fn sign(body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn delivery_headers(event: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-GitHub-Event", event.parse().unwrap());
        headers.insert("X-GitHub-Delivery", Uuid::new_v4().to_string().parse().unwrap());
        headers.insert("X-Hub-Signature-256", sign(body).parse().unwrap());
        headers
    }

    fn installation_body(id: i64, repos: &[&str]) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "action": "created",
            "installation": {
                "id": id,
                "app_id": 7777,
                "account": {"login": "acme", "id": 1001, "type": "Organization"},
                "permissions": {"contents": "read", "metadata": "read"},
                "events": ["push", "issues"],
            },
            "repositories": repos.iter().enumerate().map(|(i, name)| {
                serde_json::json!({"id": i + 1, "full_name": name, "private": false})
            }).collect::<Vec<_>>(),
            "sender": {"login": "octocat", "id": 1},
        }))
        .unwrap()
    }

    #[test]
    fn signature_check_accepts_only_matching_digest() {
        let body = b"{\"zen\":\"Keep it logically awesome.\"}";
        assert!(verify_signature(SECRET, &sign(body), body));
        assert!(!verify_signature(SECRET, &sign(body), b"tampered"));
        assert!(!verify_signature(SECRET, "sha256=deadbeef", body));
        assert!(!verify_signature(SECRET, "not-prefixed", body));
        assert!(!verify_signature(SECRET, "sha256=nothex!", body));
    }

    #[tokio::test]
    async fn missing_signature_halts_before_any_handler() {
        let (_dir, state) = test_state();
        let body = installation_body(7, &["acme/widgets"]);
        let mut headers = delivery_headers("installation", &body);
        headers.remove("X-Hub-Signature-256");

        let err = github_webhook(State(state.clone()), headers, Bytes::from(body))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignatureMissing));
        assert!(state.store.list_installations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected() {
        let (_dir, state) = test_state();
        let body = installation_body(7, &["acme/widgets"]);
        let mut headers = delivery_headers("installation", &body);
        headers.insert(
            "X-Hub-Signature-256",
            sign(b"different payload").parse().unwrap(),
        );

        let err = github_webhook(State(state), headers, Bytes::from(body))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid));
    }

    #[tokio::test]
    async fn installation_event_lands_in_the_registry() {
        let (_dir, state) = test_state();
        let body = installation_body(7, &["acme/widgets", "acme/gadgets"]);
        let headers = delivery_headers("installation", &body);

        let status = github_webhook(State(state.clone()), headers, Bytes::from(body))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);

        let installations = state.store.list_installations().unwrap();
        assert_eq!(installations.len(), 1);
        let installation = &installations[0];
        assert_eq!(installation.id, 7);
        assert_eq!(installation.account_login, "acme");
        let repos: Vec<&str> = installation
            .repositories
            .iter()
            .map(|r| r.full_name.as_str())
            .collect();
        assert_eq!(repos, vec!["acme/widgets", "acme/gadgets"]);
    }

    #[tokio::test]
    async fn push_event_is_forwarded_to_the_bus() {
        let (_dir, state) = test_state();
        let mut rx = state.bus.subscribe();
        let body = serde_json::to_vec(&serde_json::json!({
            "ref": "refs/heads/main",
            "after": "abc123",
            "repository": {"full_name": "acme/widgets"},
        }))
        .unwrap();
        let headers = delivery_headers("push", &body);

        github_webhook(State(state), headers, Bytes::from(body))
            .await
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::GitPush);
        assert_eq!(event.data["ref"], "refs/heads/main");
    }

    #[tokio::test]
    async fn unknown_event_is_accepted_and_recorded() {
        let (dir, state) = test_state();
        let body = br#"{"zen": "Design for failure."}"#.to_vec();
        let headers = delivery_headers("ping", &body);

        let status = github_webhook(State(state), headers, Bytes::from(body))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);

        // The delivery was still persisted for audit.
        let recorded = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with("_ping.json"))
            .count();
        assert_eq!(recorded, 1);
    }

    #[tokio::test]
    async fn malformed_json_body_is_rejected() {
        let (_dir, state) = test_state();
        let body = b"not json".to_vec();
        let headers = delivery_headers("push", &body);

        let err = github_webhook(State(state), headers, Bytes::from(body))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PayloadUnreadable(_)));
    }
}
