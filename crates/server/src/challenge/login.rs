use super::ChallengeEngine;
use crate::error::{AppError, HydraError};
use crate::hydra::{AcceptLoginRequest, CompletedRequest, LoginRequestInfo};

/// Outcome of opening a login challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStep {
    /// The authorization server already knows the user; follow this URL.
    Redirect(String),
    /// Ask the user for credentials.
    Prompt(LoginRequestInfo),
}

pub(super) fn require_challenge(challenge: &str) -> Result<(), AppError> {
    if challenge.trim().is_empty() {
        return Err(AppError::Validation("A challenge is required".into()));
    }
    Ok(())
}

impl ChallengeEngine {
    #[tracing::instrument(skip(self))]
    pub async fn begin_login(&self, challenge: &str) -> Result<LoginStep, AppError> {
        require_challenge(challenge)?;
        let info = self.server.get_login_request(challenge).await?;
        if !info.skip {
            return Ok(LoginStep::Prompt(info));
        }
        if info.subject.trim().is_empty() {
            return Err(AppError::Upstream(HydraError::Decode(
                "login request is skipped but names no subject".into(),
            )));
        }

        let body = AcceptLoginRequest {
            subject: info.subject.clone(),
            remember: false,
            remember_for: 0,
            acr: "0".into(),
        };
        let CompletedRequest { redirect_to } =
            self.server.accept_login_request(challenge, &body).await?;
        tracing::debug!(
            name = "challenge.login.skipped",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            subject = %info.subject,
            message = "Login request skipped"
        );
        Ok(LoginStep::Redirect(redirect_to))
    }

    /// Verify credentials and accept the login. Users whose email is not yet
    /// confirmed are refused and sent a fresh confirmation mail.
    #[tracing::instrument(skip(self, password))]
    pub async fn submit_login(
        &self,
        challenge: &str,
        username: &str,
        password: &str,
        remember: bool,
    ) -> Result<String, AppError> {
        require_challenge(challenge)?;
        let credential = self
            .accounts
            .store()
            .verify_credentials(username, password)
            .await
            .map_err(|e| {
                tracing::info!(
                    name = "challenge.login.rejected",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %e,
                    message = "Login attempt rejected"
                );
                AppError::from(e)
            })?;

        if !credential.email_validated {
            self.accounts.send_confirmation(&credential, challenge)?;
            return Err(AppError::EmailNotValidated);
        }

        let body = AcceptLoginRequest {
            subject: credential.username,
            remember,
            remember_for: self.remember_for,
            acr: "0".into(),
        };
        Ok(self
            .server
            .accept_login_request(challenge, &body)
            .await?
            .redirect_to)
    }

    /// Accept a pending login for a user who just proved ownership of their
    /// email address.
    #[tracing::instrument(skip(self))]
    pub async fn accept_login_for(&self, challenge: &str, username: &str) -> Result<String, AppError> {
        require_challenge(challenge)?;
        let body = AcceptLoginRequest {
            subject: username.to_owned(),
            remember: false,
            remember_for: 0,
            acr: "0".into(),
        };
        Ok(self
            .server
            .accept_login_request(challenge, &body)
            .await?
            .redirect_to)
    }
}
