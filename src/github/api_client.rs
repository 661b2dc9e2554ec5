//! Outbound GitHub API calls used by onboarding and token issuance.
//!
//! All requests carry a bounded deadline so a slow upstream cannot pin a
//! worker; no call is retried — a failed mint or validate fails the whole
//! operation immediately.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::error::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "Gantry";

/// Credentials returned by GitHub's manifest conversion endpoint.
#[derive(Debug, Deserialize)]
pub struct ManifestConversion {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub pem: String,
    pub webhook_secret: String,
}

/// An installation access token and its expiry.
#[derive(Debug, Deserialize)]
pub struct MintedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    /// Exchange a one-time manifest code for the new App's credentials.
    pub async fn convert_manifest(&self, code: &str) -> Result<ManifestConversion, Error> {
        let url = format!("{}/app-manifests/{}/conversions", self.api_base, code);
        let response = self
            .request(self.http.post(&url))
            .await
            .map_err(|e| Error::UpstreamExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamExchange(format!("{} - {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::UpstreamExchange(format!("invalid conversion response: {}", e)))
    }

    /// Mint an installation access token using an app JWT as bearer auth.
    pub async fn mint_installation_token(
        &self,
        jwt: &str,
        installation_id: i64,
    ) -> Result<MintedToken, Error> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, installation_id
        );
        let response = self.request(self.http.post(&url).bearer_auth(jwt)).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamApi { status, body });
        }

        Ok(response.json().await?)
    }

    /// Issue one authenticated GET against the repository to prove the
    /// freshly minted token actually grants access.
    pub async fn check_repo_access(
        &self,
        token: &str,
        owner: &str,
        name: &str,
    ) -> Result<(), Error> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, name);
        let response = self.request(self.http.get(&url).bearer_auth(token)).await?;

        if !response.status().is_success() {
            return Err(Error::TokenValidation {
                repo: format!("{}/{}", owner, name),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, reqwest::Error> {
        builder
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
    }
}
