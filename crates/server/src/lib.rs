//! Login, consent and credential companion service for an OAuth2/OIDC
//! authorization server.
//!
//! The authorization server (Hydra) owns the protocol; this crate renders the
//! login, consent and registration flows, owns the local credential store and
//! issues the short-lived action tokens used for email confirmation and
//! password reset.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use time::Duration;

use crate::accounts::{AccountService, RedirectPolicy};
use crate::challenge::ChallengeEngine;
use crate::config::AppConfig;
use crate::credentials::{CredentialStore, password::CredentialHasher};
use crate::hydra::AuthorizationServer;
use crate::notifications::{Mailer, Outbox};
use crate::telemetry::HttpMetrics;
use crate::tokens::ActionTokenCodec;

pub mod accounts;
pub mod api;
pub mod challenge;
pub mod config;
pub mod credentials;
pub mod entity;
pub mod error;
pub mod hydra;
pub mod notifications;
pub mod telemetry;
pub mod tokens;

/// Shared handles passed to every request handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: ChallengeEngine,
    pub accounts: AccountService,
    pub metrics: HttpMetrics,
}

impl AppState {
    /// Wire the services together from configuration.
    pub fn build(
        config: AppConfig,
        db: Arc<DatabaseConnection>,
        server: Arc<dyn AuthorizationServer>,
        outbox: Outbox,
    ) -> color_eyre::Result<Self> {
        let lifetime = Duration::seconds(config.action_token_lifetime_secs);
        let hasher = CredentialHasher::from_config(&config.secret_key, &config.hashing)?;
        let store = CredentialStore::new(db, hasher);
        let tokens = ActionTokenCodec::with_lifetime(&config.secret_key, lifetime);
        let mailer = Mailer::new(outbox, config.public_base(), lifetime);
        let redirects = RedirectPolicy::new([config.public_base(), config.hydra.public_url.as_str()]);
        let accounts = AccountService::new(store, tokens, mailer, redirects);
        let engine = ChallengeEngine::new(
            server,
            accounts.clone(),
            config.hydra.remember_for,
            config.grant_scopes.clone(),
        );
        Ok(Self {
            config: Arc::new(config),
            engine,
            accounts,
            metrics: HttpMetrics::new(env!("CARGO_PKG_NAME"))?,
        })
    }
}
