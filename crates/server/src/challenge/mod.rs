//! Login, consent and logout challenge resolution.
//!
//! The engine never invents a redirect target: every successful operation
//! returns the `redirect_to` the authorization server answered with.

mod consent;
mod login;

pub use consent::{ConsentPrompt, ConsentStep, ScopeDescription};
pub use login::LoginStep;

use crate::accounts::AccountService;
use crate::config::GrantScope;
use crate::hydra::AuthorizationServer;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct ChallengeEngine {
    server: Arc<dyn AuthorizationServer>,
    accounts: AccountService,
    remember_for: i64,
    grant_scopes: Arc<BTreeMap<String, GrantScope>>,
}

impl std::fmt::Debug for ChallengeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeEngine")
            .field("remember_for", &self.remember_for)
            .field("grant_scopes", &self.grant_scopes.len())
            .finish_non_exhaustive()
    }
}

impl ChallengeEngine {
    pub fn new(
        server: Arc<dyn AuthorizationServer>,
        accounts: AccountService,
        remember_for: i64,
        grant_scopes: BTreeMap<String, GrantScope>,
    ) -> Self {
        Self {
            server,
            accounts,
            remember_for,
            grant_scopes: Arc::new(grant_scopes),
        }
    }

    pub fn server(&self) -> &Arc<dyn AuthorizationServer> {
        &self.server
    }
}
