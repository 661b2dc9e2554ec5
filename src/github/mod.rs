//! GitHub App integration: onboarding, token issuance, outbound API calls.

pub mod api_client;
pub mod error;
pub mod jwt;
pub mod manifest;
pub mod token_cache;

mod issuer;

pub use api_client::GitHubClient;
pub use error::Error;
pub use issuer::TokenIssuer;
pub use token_cache::{spawn_sweep_task, TokenCache};
