use super::ChallengeEngine;
use super::login::require_challenge;
use crate::error::AppError;
use crate::hydra::{AcceptConsentRequest, ConsentSession, OAuth2Client, RejectRequest};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScopeDescription {
    pub scope: String,
    pub description: String,
    pub details: String,
}

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConsentPrompt {
    pub challenge: String,
    pub subject: String,
    pub client: OAuth2Client,
    pub scopes: Vec<ScopeDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentStep {
    Redirect(String),
    Prompt(ConsentPrompt),
}

impl ChallengeEngine {
    fn describe_scope(&self, scope: &str) -> ScopeDescription {
        match self.grant_scopes.get(scope) {
            Some(grant) => ScopeDescription {
                scope: scope.to_owned(),
                description: grant.description.clone(),
                details: grant.details.clone(),
            },
            None => ScopeDescription {
                scope: scope.to_owned(),
                description: scope.to_owned(),
                details: String::new(),
            },
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn begin_consent(&self, challenge: &str) -> Result<ConsentStep, AppError> {
        require_challenge(challenge)?;
        let info = self.server.get_consent_request(challenge).await?;
        if info.skip {
            let body = AcceptConsentRequest {
                grant_scope: info.requested_scope,
                grant_access_token_audience: info.requested_access_token_audience,
                remember: false,
                remember_for: 0,
                session: ConsentSession::default(),
            };
            let completed = self.server.accept_consent_request(challenge, &body).await?;
            tracing::debug!(
                name = "challenge.consent.skipped",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                subject = %info.subject,
                message = "Consent request skipped"
            );
            return Ok(ConsentStep::Redirect(completed.redirect_to));
        }

        let client = info.client.unwrap_or_default();
        let client = OAuth2Client {
            client_name: if client.client_name.is_empty() {
                "Unknown".into()
            } else {
                client.client_name
            },
            client_uri: if client.client_uri.is_empty() {
                "#".into()
            } else {
                client.client_uri
            },
            ..client
        };
        Ok(ConsentStep::Prompt(ConsentPrompt {
            challenge: challenge.to_owned(),
            subject: info.subject,
            client,
            scopes: info
                .requested_scope
                .iter()
                .map(|scope| self.describe_scope(scope))
                .collect(),
        }))
    }

    /// Forward the user's decision. Granted scopes are limited to the ones
    /// the client requested.
    #[tracing::instrument(skip(self))]
    pub async fn submit_consent(
        &self,
        challenge: &str,
        accept: bool,
        grant_scope: &[String],
        remember: bool,
    ) -> Result<String, AppError> {
        require_challenge(challenge)?;
        if !accept {
            let completed = self
                .server
                .reject_consent_request(challenge, &RejectRequest::access_denied())
                .await?;
            return Ok(completed.redirect_to);
        }

        let info = self.server.get_consent_request(challenge).await?;
        let granted: Vec<String> = grant_scope
            .iter()
            .filter(|scope| info.requested_scope.contains(*scope))
            .cloned()
            .collect();
        let body = AcceptConsentRequest {
            grant_scope: granted,
            grant_access_token_audience: info.requested_access_token_audience,
            remember,
            remember_for: self.remember_for,
            session: ConsentSession::default(),
        };
        Ok(self
            .server
            .accept_consent_request(challenge, &body)
            .await?
            .redirect_to)
    }

    #[tracing::instrument(skip(self))]
    pub async fn accept_logout(&self, challenge: &str) -> Result<String, AppError> {
        require_challenge(challenge)?;
        Ok(self.server.accept_logout_request(challenge).await?.redirect_to)
    }
}
