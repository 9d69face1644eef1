//! Local credential store.
//!
//! Owns the `user_credential` table: creation through registration, mutation
//! through update and password reset, and verification for login. Every
//! mutation is written in one statement or one transaction so hash, salt and
//! email never drift apart.

pub mod password;

use crate::entity::user_credential;
use crate::error::CredentialError;
use password::{CredentialHasher, validate_password};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

pub use user_credential::Model as UserCredential;

/// What an update actually changed.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub credential: UserCredential,
    pub email_changed: bool,
    pub password_changed: bool,
}

#[derive(Clone, Debug)]
pub struct CredentialStore {
    db: Arc<DatabaseConnection>,
    hasher: CredentialHasher,
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_username(username: &str) -> Result<(), CredentialError> {
    if username.is_empty() {
        return Err(CredentialError::Validation("Username is required".into()));
    }
    if username.chars().count() > 64 || username.chars().any(char::is_whitespace) {
        return Err(CredentialError::Validation(
            "Username must be at most 64 characters without spaces".into(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), CredentialError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CredentialError::Validation(
            "Please enter a valid email address".into(),
        ))
    }
}

fn map_unique_violation(err: DbErr) -> CredentialError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            if detail.to_lowercase().contains("email") {
                CredentialError::EmailTaken
            } else {
                CredentialError::UsernameTaken
            }
        }
        _ => CredentialError::Database(err),
    }
}

async fn find_by_username_in<C: ConnectionTrait>(
    conn: &C,
    username: &str,
) -> Result<Option<UserCredential>, DbErr> {
    user_credential::Entity::find()
        .filter(user_credential::Column::Username.eq(username))
        .one(conn)
        .await
}

async fn find_by_email_in<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<UserCredential>, DbErr> {
    user_credential::Entity::find()
        .filter(user_credential::Column::Email.eq(email))
        .one(conn)
        .await
}

impl CredentialStore {
    pub fn new(db: Arc<DatabaseConnection>, hasher: CredentialHasher) -> Self {
        Self { db, hasher }
    }

    /// Create a credential with a fresh salt. Returns the new id.
    #[tracing::instrument(skip(self, password, email))]
    pub async fn create_credential(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<String, CredentialError> {
        let username = username.trim();
        let email = normalize_email(email);
        validate_username(username)?;
        validate_email(&email)?;
        validate_password(password, username, &email)?;

        let txn = self.db.begin().await?;
        if find_by_username_in(&txn, username).await?.is_some() {
            return Err(CredentialError::UsernameTaken);
        }
        if find_by_email_in(&txn, &email).await?.is_some() {
            return Err(CredentialError::EmailTaken);
        }

        let salt = CredentialHasher::generate_salt();
        let password_hash = self.hasher.hash(password, &salt)?;
        let now = OffsetDateTime::now_utc();
        let id = uuid::Uuid::new_v4().to_string();

        let record = user_credential::ActiveModel {
            id: Set(id.clone()),
            username: Set(username.to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            salt: Set(salt),
            email_validated: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        record.insert(&txn).await.map_err(map_unique_violation)?;
        txn.commit().await?;

        tracing::info!(
            name = "credentials.create.succeeded",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            user_credential_id = %id,
            message = "User credential created"
        );
        Ok(id)
    }

    /// Check a username/password pair. Callers must not reveal which half was wrong.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserCredential, CredentialError> {
        let credential = self.find_by_username(username.trim()).await?;
        if self
            .hasher
            .verify(password, &credential.salt, &credential.password_hash)
        {
            Ok(credential)
        } else {
            Err(CredentialError::IncorrectPassword)
        }
    }

    /// Change email and/or password. An empty `new_email` or `new_password`
    /// keeps the current value. A changed email clears `email_validated`.
    #[tracing::instrument(skip(self, new_email, new_password))]
    pub async fn update_credential(
        &self,
        username: &str,
        new_email: &str,
        new_password: &str,
    ) -> Result<UpdateOutcome, CredentialError> {
        let txn = self.db.begin().await?;
        let current = find_by_username_in(&txn, username)
            .await?
            .ok_or(CredentialError::NotFound)?;

        let new_email = normalize_email(new_email);
        let email_changed = !new_email.is_empty() && new_email != current.email;
        if email_changed {
            validate_email(&new_email)?;
            if find_by_email_in(&txn, &new_email).await?.is_some() {
                return Err(CredentialError::EmailTaken);
            }
        }
        let effective_email = if email_changed {
            new_email.clone()
        } else {
            current.email.clone()
        };

        let password_changed = !new_password.is_empty()
            && !self
                .hasher
                .verify(new_password, &current.salt, &current.password_hash);
        if password_changed {
            validate_password(new_password, &current.username, &effective_email)?;
        }

        if !email_changed && !password_changed {
            txn.commit().await?;
            return Ok(UpdateOutcome {
                credential: current,
                email_changed,
                password_changed,
            });
        }

        let mut active: user_credential::ActiveModel = current.into();
        if email_changed {
            active.email = Set(effective_email);
            active.email_validated = Set(false);
        }
        if password_changed {
            let salt = CredentialHasher::generate_salt();
            active.password_hash = Set(self.hasher.hash(new_password, &salt)?);
            active.salt = Set(salt);
        }
        active.updated_at = Set(OffsetDateTime::now_utc());
        let credential = active.update(&txn).await.map_err(map_unique_violation)?;
        txn.commit().await?;

        tracing::info!(
            name = "credentials.update.succeeded",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            username = %credential.username,
            email_changed,
            password_changed,
            message = "User credential updated"
        );
        Ok(UpdateOutcome {
            credential,
            email_changed,
            password_changed,
        })
    }

    /// Replace the password (reset flow). Always re-salts.
    #[tracing::instrument(skip(self, new_password))]
    pub async fn reset_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> Result<(), CredentialError> {
        let current = self.find_by_username(username).await?;
        validate_password(new_password, &current.username, &current.email)?;

        let salt = CredentialHasher::generate_salt();
        let password_hash = self.hasher.hash(new_password, &salt)?;
        let mut active: user_credential::ActiveModel = current.into();
        active.password_hash = Set(password_hash);
        active.salt = Set(salt);
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    /// Mark `email` as validated for `username`. Fails with
    /// [`CredentialError::EmailMismatch`] when the account's address has
    /// changed since the confirmation link was sent. Idempotent.
    #[tracing::instrument(skip(self, email))]
    pub async fn mark_email_validated(
        &self,
        username: &str,
        email: &str,
    ) -> Result<(), CredentialError> {
        let txn = self.db.begin().await?;
        let current = find_by_username_in(&txn, username)
            .await?
            .ok_or(CredentialError::NotFound)?;
        if current.email != normalize_email(email) {
            return Err(CredentialError::EmailMismatch);
        }
        if current.email_validated {
            txn.commit().await?;
            return Ok(());
        }
        let mut active: user_credential::ActiveModel = current.into();
        active.email_validated = Set(true);
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<UserCredential, CredentialError> {
        find_by_username_in(self.db.as_ref(), username)
            .await?
            .ok_or(CredentialError::NotFound)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<UserCredential, CredentialError> {
        find_by_email_in(self.db.as_ref(), &normalize_email(email))
            .await?
            .ok_or(CredentialError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(validate_email("alice@x.com").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("alice@x").is_err());
        assert!(validate_email("al ice@x.com").is_err());
        assert!(validate_email("a@b@x.com").is_err());
    }

    #[test]
    fn username_format() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Alice@X.com "), "alice@x.com");
    }
}
