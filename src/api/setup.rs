//! GitHub App onboarding endpoints.
//!
//! GET /setup renders the manifest form (or reports the already-onboarded
//! app), GitHub redirects back to GET /setup/callback with a one-time code,
//! and we bounce the user straight to the App's installation page.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::github::{manifest, Error, GitHubClient};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetupQuery {
    /// Override the configured app name
    pub name: Option<String>,
    /// Override the configured app description
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetupStatus {
    pub onboarded: bool,
    pub app_id: i64,
}

/// GET /setup - Render the self-submitting manifest form.
///
/// Once an identity exists this reports it instead of rendering a second
/// manifest; re-onboarding means completing the flow again deliberately.
pub async fn setup_page(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SetupQuery>,
) -> Result<impl IntoResponse, Error> {
    if let Some(identity) = state.store.load_app_identity()? {
        return Ok(Json(SetupStatus {
            onboarded: true,
            app_id: identity.app_id,
        })
        .into_response());
    }

    let name = params.name.as_deref().unwrap_or(&state.config.github.app_name);
    let description = params
        .description
        .as_deref()
        .unwrap_or(&state.config.github.app_description);

    let form = manifest::build_manifest_form(
        name,
        description,
        &state.config.server.base_url(),
        &state.config.github.web_base,
    )?;
    Ok(Html(form).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

/// GET /setup/callback - Complete onboarding and redirect to the install page.
pub async fn setup_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackQuery>,
) -> Result<impl IntoResponse, Error> {
    let client = GitHubClient::new(&state.config.github.api_base);
    let install_url = manifest::complete_onboarding(
        &state.store,
        &client,
        &state.config.github.web_base,
        &params.code,
    )
    .await?;

    Ok(Redirect::temporary(&install_url))
}

/// GET /api/installations - The installation registry.
pub async fn list_installations(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Error> {
    let installations = state.store.list_installations()?;
    Ok(Json(installations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::EventBus;
    use crate::github::{TokenCache, TokenIssuer};
    use crate::store::{AppIdentity, CredentialStore};
    use axum::http::StatusCode;
    use chrono::Utc;

    fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CredentialStore::new(dir.path()).unwrap());
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

    #[tokio::test]
    async fn setup_renders_form_when_not_onboarded() {
        let (_dir, state) = test_state();
        let response = setup_page(
            State(state),
            Query(SetupQuery {
                name: None,
                description: None,
            }),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("manifest-form"));
        assert!(html.contains("gantry-deploy"));
    }

    #[tokio::test]
    async fn setup_reports_existing_identity() {
        let (_dir, state) = test_state();
        state
            .store
            .save_app_identity(&AppIdentity {
                app_id: 4242,
                private_key_pem: "pem".to_string(),
                webhook_secret: "secret".to_string(),
                updated_at: Utc::now(),
            })
            .unwrap();

        let response = setup_page(
            State(state),
            Query(SetupQuery {
                name: None,
                description: None,
            }),
        )
        .await
        .unwrap()
        .into_response();

        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let status: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(status["onboarded"], true);
        assert_eq!(status["app_id"], 4242);
    }
}
