//! GitHub App manifest flow.
//!
//! One-time onboarding: we render a self-submitting form that POSTs an app
//! manifest to GitHub, the user confirms creation there, and GitHub redirects
//! back with a one-time code we exchange for the app's credentials.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::store::{AppIdentity, CredentialStore};

use super::api_client::GitHubClient;
use super::error::Error;

/// Permission scopes requested for the App.
const DEFAULT_PERMISSIONS: &[(&str, &str)] = &[
    ("contents", "read"),
    ("issues", "write"),
    ("checks", "write"),
    ("metadata", "read"),
];

/// Events the App subscribes to.
const DEFAULT_EVENTS: &[&str] = &["issues", "issue_comment", "check_suite", "check_run", "push"];

#[derive(Debug, Serialize)]
struct AppManifest {
    name: String,
    url: String,
    hook_attributes: HookAttributes,
    redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    public: bool,
    default_permissions: serde_json::Value,
    default_events: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HookAttributes {
    url: String,
    active: bool,
}

/// Build the manifest and wrap it in a form that auto-submits to GitHub's
/// app-creation endpoint. Nothing is persisted at this stage; the `state`
/// parameter is a fresh anti-replay token.
pub fn build_manifest_form(
    name: &str,
    description: &str,
    base_url: &str,
    web_base: &str,
) -> Result<String, Error> {
    let permissions: serde_json::Map<String, serde_json::Value> = DEFAULT_PERMISSIONS
        .iter()
        .map(|(scope, level)| (scope.to_string(), serde_json::Value::from(*level)))
        .collect();

    let manifest = AppManifest {
        name: name.to_string(),
        url: base_url.to_string(),
        hook_attributes: HookAttributes {
            url: format!("{}/webhooks/github", base_url),
            active: true,
        },
        redirect_url: format!("{}/setup/callback", base_url),
        description: Some(description.to_string()),
        public: false,
        default_permissions: serde_json::Value::Object(permissions),
        default_events: DEFAULT_EVENTS.iter().map(|s| s.to_string()).collect(),
    };

    let manifest_json = serde_json::to_string(&manifest)
        .map_err(|e| Error::PayloadUnreadable(format!("manifest encoding failed: {}", e)))?;
    let state = Uuid::new_v4().to_string();
    let action = format!("{}/settings/apps/new?state={}", web_base, state);

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Create GitHub App</title></head>
<body>
  <p>Redirecting to GitHub to create the app&hellip;</p>
  <form id="manifest-form" action="{}" method="post">
    <input type="hidden" name="manifest" value="{}">
    <noscript><button type="submit">Continue to GitHub</button></noscript>
  </form>
  <script>document.getElementById("manifest-form").submit();</script>
</body>
</html>
"#,
        html_escape(&action),
        html_escape(&manifest_json)
    ))
}

/// Exchange the one-time `code` for the new App's credentials, persist the
/// identity, and return the URL where the user installs the App.
pub async fn complete_onboarding(
    store: &CredentialStore,
    client: &GitHubClient,
    web_base: &str,
    code: &str,
) -> Result<String, Error> {
    let conversion = client.convert_manifest(code).await?;

    store.save_app_identity(&AppIdentity {
        app_id: conversion.id,
        private_key_pem: conversion.pem,
        webhook_secret: conversion.webhook_secret,
        updated_at: Utc::now(),
    })?;

    tracing::info!(
        app_id = conversion.id,
        name = %conversion.name,
        "GitHub App onboarded"
    );

    Ok(format!(
        "{}/apps/{}/installations/new",
        web_base, conversion.slug
    ))
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_targets_github_and_embeds_the_manifest() {
        let html = build_manifest_form(
            "gantry-deploy",
            "Automated deployment platform",
            "https://deploy.example.com",
            "https://github.com",
        )
        .unwrap();

        assert!(html.contains("action=\"https://github.com/settings/apps/new?state="));
        assert!(html.contains("name=\"manifest\""));
        // Manifest JSON is attribute-escaped, so quotes appear as entities.
        assert!(html.contains("&quot;hook_attributes&quot;"));
        assert!(html.contains("https://deploy.example.com/webhooks/github"));
        assert!(html.contains("https://deploy.example.com/setup/callback"));
    }

    #[test]
    fn manifest_requests_the_expected_scopes_and_events() {
        let html = build_manifest_form("n", "d", "http://localhost:8080", "https://github.com").unwrap();
        for scope in ["contents", "issues", "checks", "metadata"] {
            assert!(html.contains(&format!("&quot;{}&quot;", scope)), "missing {}", scope);
        }
        for event in DEFAULT_EVENTS {
            assert!(html.contains(&format!("&quot;{}&quot;", event)), "missing {}", event);
        }
    }

    #[test]
    fn state_token_differs_per_form() {
        let a = build_manifest_form("n", "d", "http://x", "https://github.com").unwrap();
        let b = build_manifest_form("n", "d", "http://x", "https://github.com").unwrap();
        let state = |html: &str| {
            html.split("state=").nth(1).unwrap()[..36].to_string()
        };
        assert_ne!(state(&a), state(&b));
    }

    #[test]
    fn html_escape_covers_attribute_breakers() {
        assert_eq!(html_escape(r#"a"b'c<d>e&f"#), "a&quot;b&#39;c&lt;d&gt;e&amp;f");
    }
}
