//! Purpose-scoped action tokens.
//!
//! Tokens are HS256 JWTs signed with the server secret key. They carry the
//! subject (username), a purpose tag, a purpose-specific context string and a
//! random `jti` used to enforce single use.

pub mod replay;

use crate::error::TokenError;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use replay::ConsumedTokens;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

pub const DEFAULT_LIFETIME: Duration = Duration::minutes(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    EmailConfirmation,
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionClaims {
    pub sub: String,
    pub purpose: Purpose,
    /// Pending login challenge (email confirmation) or redirect target (password reset).
    #[serde(default)]
    pub ctx: String,
    /// Address an email-confirmation token was mailed to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfirmation {
    pub username: String,
    /// The address the link was sent to. Only that address may be validated.
    pub email: String,
    /// Empty when the registration did not start from a login challenge.
    pub challenge: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub username: String,
    pub redirect_to: String,
}

#[derive(Clone)]
pub struct ActionTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
    consumed: Arc<ConsumedTokens>,
}

impl std::fmt::Debug for ActionTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTokenCodec")
            .field("lifetime", &self.lifetime)
            .field("consumed", &self.consumed.len())
            .finish_non_exhaustive()
    }
}

impl ActionTokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_lifetime(secret, DEFAULT_LIFETIME)
    }

    pub fn with_lifetime(secret: impl AsRef<[u8]>, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            lifetime,
            consumed: Arc::new(ConsumedTokens::new()),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, purpose: Purpose, subject: &str, context: &str) -> Result<String, TokenError> {
        self.issue_at(purpose, subject, context, OffsetDateTime::now_utc())
    }

    /// Issue an email-confirmation token bound to the address it is mailed to.
    pub fn issue_email_confirmation(
        &self,
        username: &str,
        email: &str,
        challenge: &str,
    ) -> Result<String, TokenError> {
        self.sign(
            Purpose::EmailConfirmation,
            username,
            email,
            challenge,
            OffsetDateTime::now_utc(),
        )
    }

    /// Issue a token as if it had been created at `issued_at`.
    pub fn issue_at(
        &self,
        purpose: Purpose,
        subject: &str,
        context: &str,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        self.sign(purpose, subject, "", context, issued_at)
    }

    fn sign(
        &self,
        purpose: Purpose,
        subject: &str,
        email: &str,
        context: &str,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = ActionClaims {
            sub: subject.to_owned(),
            purpose,
            ctx: context.to_owned(),
            email: email.to_owned(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + self.lifetime).unix_timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature and expiry. No leeway is granted.
    pub fn verify(&self, token: &str) -> Result<ActionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<ActionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })
    }

    pub fn unpack_email_confirmation(
        &self,
        claims: &ActionClaims,
    ) -> Result<EmailConfirmation, TokenError> {
        if claims.purpose != Purpose::EmailConfirmation {
            return Err(TokenError::WrongPurpose);
        }
        if claims.email.is_empty() {
            return Err(TokenError::Malformed);
        }
        Ok(EmailConfirmation {
            username: claims.sub.clone(),
            email: claims.email.clone(),
            challenge: claims.ctx.clone(),
        })
    }

    pub fn unpack_password_reset(&self, claims: &ActionClaims) -> Result<PasswordReset, TokenError> {
        if claims.purpose != Purpose::PasswordReset {
            return Err(TokenError::WrongPurpose);
        }
        Ok(PasswordReset {
            username: claims.sub.clone(),
            redirect_to: claims.ctx.clone(),
        })
    }

    /// Mark the token as used. A token can be redeemed once.
    pub fn redeem(&self, claims: &ActionClaims) -> Result<(), TokenError> {
        self.consumed.redeem(&claims.jti, claims.exp)
    }

    /// Undo [`redeem`](Self::redeem) when the guarded action did not complete.
    pub fn release(&self, claims: &ActionClaims) {
        self.consumed.release(&claims.jti);
    }

    pub fn purge_expired(&self) -> usize {
        self.consumed
            .purge_expired(OffsetDateTime::now_utc().unix_timestamp())
    }
}
