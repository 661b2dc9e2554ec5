//! Error taxonomy for the GitHub App integration.
//!
//! Every failure mode carries enough context for operator diagnosis
//! (upstream status and body where applicable) and maps to a stable
//! machine-readable code plus an HTTP status: 4xx for validation and
//! signature failures so GitHub does not retry them, 5xx for persistence
//! and upstream failures so it does.

use axum::http::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("webhook delivery is missing the signature header")]
    SignatureMissing,

    #[error("webhook signature verification failed")]
    SignatureInvalid,

    #[error("failed to read webhook payload: {0}")]
    PayloadUnreadable(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error("invalid repository reference '{0}': expected owner/name")]
    InvalidRepoRef(String),

    #[error("no installation grants access to {0}")]
    InstallationNotFound(String),

    #[error("installation {id} lacks the contents permission")]
    PermissionDenied { id: i64 },

    #[error("no GitHub App identity has been onboarded yet")]
    IdentityMissing,

    #[error("failed to decode the app private key: {0}")]
    KeyDecode(String),

    #[error("manifest conversion failed: {0}")]
    UpstreamExchange(String),

    #[error("GitHub API error: {status} - {body}")]
    UpstreamApi { status: u16, body: String },

    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("minted token failed validation against {repo}: HTTP {status}")]
    TokenValidation { repo: String, status: u16 },
}

impl Error {
    /// Stable machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Error::SignatureMissing => "signature_missing",
            Error::SignatureInvalid => "signature_invalid",
            Error::PayloadUnreadable(_) => "payload_unreadable",
            Error::Persistence(_) => "persistence_error",
            Error::InvalidRepoRef(_) => "invalid_repo_ref",
            Error::InstallationNotFound(_) => "installation_not_found",
            Error::PermissionDenied { .. } => "permission_denied",
            Error::IdentityMissing => "identity_missing",
            Error::KeyDecode(_) => "key_decode_error",
            Error::UpstreamExchange(_) => "upstream_exchange_error",
            Error::UpstreamApi { .. } => "upstream_api_error",
            Error::Transport(_) => "upstream_api_error",
            Error::TokenValidation { .. } => "token_validation_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::SignatureMissing | Error::SignatureInvalid => StatusCode::UNAUTHORIZED,
            Error::PayloadUnreadable(_) | Error::InvalidRepoRef(_) => StatusCode::BAD_REQUEST,
            Error::InstallationNotFound(_) => StatusCode::NOT_FOUND,
            Error::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Error::Persistence(_) | Error::IdentityMissing | Error::KeyDecode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::UpstreamExchange(_)
            | Error::UpstreamApi { .. }
            | Error::Transport(_)
            | Error::TokenValidation { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
