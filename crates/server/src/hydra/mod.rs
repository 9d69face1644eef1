//! Typed view of the authorization server admin API.
//!
//! [`AuthorizationServer`] is the seam the challenge engine and the bearer
//! extractor talk to; [`client::HydraClient`] is the HTTP implementation.

pub mod client;

use crate::error::HydraError;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

pub use client::HydraClient;

/// The admin API sends `null` for empty lists.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OAuth2Client {
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequestInfo {
    #[serde(default)]
    pub challenge: String,
    pub skip: bool,
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested_scope: Vec<String>,
    #[serde(default)]
    pub client: Option<OAuth2Client>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRequestInfo {
    #[serde(default)]
    pub challenge: String,
    pub skip: bool,
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested_scope: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested_access_token_audience: Vec<String>,
    #[serde(default)]
    pub client: Option<OAuth2Client>,
}

/// Answer to every accept/reject call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRequest {
    pub redirect_to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptLoginRequest {
    pub subject: String,
    pub remember: bool,
    pub remember_for: i64,
    pub acr: String,
}

/// Claims forwarded into the issued tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSession {
    #[serde(default)]
    pub access_token: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub id_token: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptConsentRequest {
    pub grant_scope: Vec<String>,
    pub grant_access_token_audience: Vec<String>,
    pub remember: bool,
    pub remember_for: i64,
    pub session: ConsentSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub error: String,
    pub error_description: String,
}

impl RejectRequest {
    pub fn access_denied() -> Self {
        Self {
            error: "access_denied".into(),
            error_description: "The resource owner denied the request".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectedToken {
    pub active: bool,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

#[async_trait]
pub trait AuthorizationServer: Send + Sync {
    async fn get_login_request(&self, challenge: &str) -> Result<LoginRequestInfo, HydraError>;

    async fn accept_login_request(
        &self,
        challenge: &str,
        body: &AcceptLoginRequest,
    ) -> Result<CompletedRequest, HydraError>;

    async fn get_consent_request(&self, challenge: &str)
    -> Result<ConsentRequestInfo, HydraError>;

    async fn accept_consent_request(
        &self,
        challenge: &str,
        body: &AcceptConsentRequest,
    ) -> Result<CompletedRequest, HydraError>;

    async fn reject_consent_request(
        &self,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, HydraError>;

    async fn accept_logout_request(&self, challenge: &str) -> Result<CompletedRequest, HydraError>;

    async fn introspect_token(&self, token: &str) -> Result<IntrospectedToken, HydraError>;
}
