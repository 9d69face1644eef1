//! Account flows built on the credential store, the action token codec and
//! the mailer: registration, email confirmation, credential update and
//! password reset.

use crate::credentials::{CredentialStore, UpdateOutcome, UserCredential, normalize_email};
use crate::error::{AppError, CredentialError};
use crate::notifications::Mailer;
use crate::tokens::{ActionTokenCodec, EmailConfirmation, Purpose};
use reqwest::Url;
use std::sync::Arc;

/// Origins a post-action redirect may point to. Relative paths on this
/// service are always allowed.
#[derive(Clone, Debug, Default)]
pub struct RedirectPolicy {
    origins: Arc<[String]>,
}

impl RedirectPolicy {
    pub fn new<'a>(allowed: impl IntoIterator<Item = &'a str>) -> Self {
        let origins: Vec<String> = allowed
            .into_iter()
            .filter_map(|url| Url::parse(url).ok())
            .map(|url| url.origin().ascii_serialization())
            .collect();
        Self {
            origins: origins.into(),
        }
    }

    pub fn allows(&self, target: &str) -> bool {
        if target.is_empty() {
            return true;
        }
        if target.starts_with('/') {
            return !target.starts_with("//") && !target.contains('\\');
        }
        match Url::parse(target) {
            Ok(url) => {
                matches!(url.scheme(), "http" | "https")
                    && self
                        .origins
                        .contains(&url.origin().ascii_serialization())
            }
            Err(_) => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccountService {
    store: CredentialStore,
    tokens: ActionTokenCodec,
    mailer: Mailer,
    redirects: RedirectPolicy,
}

fn ensure_confirmation(password: &str, confirmation: &str) -> Result<(), AppError> {
    if password != confirmation {
        return Err(AppError::Validation(
            "Password and password confirmation do not match".into(),
        ));
    }
    Ok(())
}

impl AccountService {
    pub fn new(
        store: CredentialStore,
        tokens: ActionTokenCodec,
        mailer: Mailer,
        redirects: RedirectPolicy,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            redirects,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn tokens(&self) -> &ActionTokenCodec {
        &self.tokens
    }

    pub fn redirects(&self) -> &RedirectPolicy {
        &self.redirects
    }

    /// Create a credential and queue the confirmation mail. `challenge` is the
    /// pending login challenge, if registration started from a login page.
    /// The mail is rendered before the credential is written, so a rendering
    /// failure leaves no account behind.
    #[tracing::instrument(skip(self, email, password, password_confirmation))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        password_confirmation: &str,
        challenge: &str,
    ) -> Result<String, AppError> {
        ensure_confirmation(password, password_confirmation)?;
        let username = username.trim();
        let address = normalize_email(email);
        let token = self
            .tokens
            .issue_email_confirmation(username, &address, challenge)?;
        let mail = self
            .mailer
            .compose_email_confirmation(username, &address, &token)?;

        let id = self.store.create_credential(username, password, email).await?;
        self.mailer.send(mail);
        tracing::info!(
            name = "accounts.confirmation.queued",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            username = %username,
            message = "Email confirmation queued"
        );
        Ok(id)
    }

    /// Issue an email-confirmation token and queue the mail carrying it.
    pub fn send_confirmation(
        &self,
        credential: &UserCredential,
        challenge: &str,
    ) -> Result<(), AppError> {
        let token = self.tokens.issue_email_confirmation(
            &credential.username,
            &credential.email,
            challenge,
        )?;
        self.mailer
            .email_confirmation(&credential.username, &credential.email, &token)?;
        tracing::info!(
            name = "accounts.confirmation.queued",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            username = %credential.username,
            message = "Email confirmation queued"
        );
        Ok(())
    }

    /// Redeem an email-confirmation token and mark the address as validated.
    /// A link mailed to an address the account no longer uses is rejected.
    #[tracing::instrument(skip(self, token))]
    pub async fn confirm_email(&self, token: &str) -> Result<EmailConfirmation, AppError> {
        let claims = self.tokens.verify(token)?;
        let confirmation = self.tokens.unpack_email_confirmation(&claims)?;
        self.tokens.redeem(&claims)?;

        if let Err(e) = self
            .store
            .mark_email_validated(&confirmation.username, &confirmation.email)
            .await
        {
            if !matches!(e, CredentialError::EmailMismatch) {
                self.tokens.release(&claims);
            }
            return Err(match e {
                CredentialError::NotFound => AppError::Validation("Unknown account".into()),
                other => other.into(),
            });
        }
        tracing::info!(
            name = "accounts.confirmation.succeeded",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            username = %confirmation.username,
            message = "Email address confirmed"
        );
        Ok(confirmation)
    }

    /// Change email and/or password after checking the current password.
    /// A changed email is sent a new confirmation mail.
    #[tracing::instrument(skip(self, old_password, new_email, new_password, new_password_confirmation))]
    pub async fn update(
        &self,
        username: &str,
        old_password: &str,
        new_email: &str,
        new_password: &str,
        new_password_confirmation: &str,
    ) -> Result<UpdateOutcome, AppError> {
        ensure_confirmation(new_password, new_password_confirmation)?;
        self.store.verify_credentials(username, old_password).await?;
        let outcome = self
            .store
            .update_credential(username, new_email, new_password)
            .await?;
        if outcome.email_changed {
            self.send_confirmation(&outcome.credential, "")?;
        }
        Ok(outcome)
    }

    /// Queue a password-reset mail if `email` belongs to an account. Unknown
    /// addresses succeed silently. `redirect_to` must satisfy the
    /// [`RedirectPolicy`].
    #[tracing::instrument(skip(self, email))]
    pub async fn request_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), AppError> {
        if !self.redirects.allows(redirect_to) {
            return Err(AppError::Validation(
                "redirect_to must point to this service or the authorization server".into(),
            ));
        }
        let credential = match self.store.find_by_email(email).await {
            Ok(credential) => credential,
            Err(CredentialError::NotFound) => {
                tracing::info!(
                    name = "accounts.password_reset.unknown_email",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    message = "Password reset requested for an unknown address"
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let token = self
            .tokens
            .issue(Purpose::PasswordReset, &credential.username, redirect_to)?;
        self.mailer
            .password_reset(&credential.username, &credential.email, &token)?;
        tracing::info!(
            name = "accounts.password_reset.queued",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            username = %credential.username,
            message = "Password reset mail queued"
        );
        Ok(())
    }

    /// Redeem a password-reset token and store the new password. Returns the
    /// redirect target carried by the token.
    #[tracing::instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        new_password_confirmation: &str,
    ) -> Result<String, AppError> {
        ensure_confirmation(new_password, new_password_confirmation)?;
        let claims = self.tokens.verify(token)?;
        let reset = self.tokens.unpack_password_reset(&claims)?;
        self.tokens.redeem(&claims)?;

        if let Err(e) = self.store.reset_password(&reset.username, new_password).await {
            self.tokens.release(&claims);
            return Err(match e {
                CredentialError::NotFound => AppError::Validation("Unknown account".into()),
                other => other.into(),
            });
        }
        tracing::info!(
            name = "accounts.password_reset.succeeded",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            username = %reset.username,
            message = "Password reset"
        );
        Ok(reset.redirect_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RedirectPolicy {
        RedirectPolicy::new(["https://id.example.org/", "https://hydra.example.org"])
    }

    #[test]
    fn known_origins_and_local_paths_are_allowed() {
        let policy = policy();
        assert!(policy.allows(""));
        assert!(policy.allows("/secure/update"));
        assert!(policy.allows("https://id.example.org/done?x=1"));
        assert!(policy.allows("https://hydra.example.org/oauth2/auth"));
    }

    #[test]
    fn foreign_targets_are_refused() {
        let policy = policy();
        assert!(!policy.allows("https://evil.example/phish"));
        assert!(!policy.allows("//evil.example/phish"));
        assert!(!policy.allows("/\\evil.example"));
        assert!(!policy.allows("http://id.example.org/downgrade"));
        assert!(!policy.allows("https://id.example.org.evil.example/"));
        assert!(!policy.allows("javascript:alert(1)"));
    }
}
