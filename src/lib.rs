pub mod api;
pub mod config;
pub mod events;
pub mod github;
pub mod store;

use std::sync::Arc;

use config::Config;
use events::EventBus;
use github::TokenIssuer;
use store::CredentialStore;

pub struct AppState {
    pub config: Config,
    pub store: Arc<CredentialStore>,
    /// The sole credential-issuance API consumed by the deploy pipeline.
    pub issuer: Arc<TokenIssuer>,
    pub bus: Arc<EventBus>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<CredentialStore>,
        issuer: Arc<TokenIssuer>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            store,
            issuer,
            bus,
        }
    }
}
