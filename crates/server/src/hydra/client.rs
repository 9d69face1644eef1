use super::{
    AcceptConsentRequest, AcceptLoginRequest, AuthorizationServer, CompletedRequest,
    ConsentRequestInfo, IntrospectedToken, LoginRequestInfo, RejectRequest,
};
use crate::error::HydraError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// HTTP client for the Hydra admin API.
#[derive(Clone, Debug)]
pub struct HydraClient {
    http: reqwest::Client,
    admin_url: String,
}

impl HydraClient {
    pub fn new(admin_url: &str, timeout: Duration) -> Result<Self, HydraError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HydraError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            admin_url: admin_url.trim_end_matches('/').to_owned(),
        })
    }

    fn request_url(&self, flow: &str, action: Option<&str>, challenge: &str) -> String {
        let action = action.map(|a| format!("/{a}")).unwrap_or_default();
        format!(
            "{}/oauth2/auth/requests/{flow}{action}?challenge={}",
            self.admin_url,
            urlencoding::encode(challenge)
        )
    }

    async fn get<T: DeserializeOwned>(&self, url: String, context: &str) -> Result<T, HydraError> {
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, context))?;
        treat_response(response, context).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
        context: &str,
    ) -> Result<T, HydraError> {
        let response = self
            .http
            .put(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(e, context))?;
        treat_response(response, context).await
    }
}

fn transport_error(err: reqwest::Error, context: &str) -> HydraError {
    tracing::warn!(
        name = "hydra.request.transport_failed",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        error = %err,
        context,
        message = "Authorization server request failed"
    );
    HydraError::Transport(format!("{context}: {err}"))
}

/// Accept 200..=302 and decode the body; anything else is a failure.
async fn treat_response<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, HydraError> {
    let status = response.status().as_u16();
    if !(200..=302).contains(&status) {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            name = "hydra.request.bad_status",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            status,
            context,
            body = %body,
            message = "Authorization server rejected the request"
        );
        return Err(HydraError::Status {
            status,
            context: context.to_owned(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| HydraError::Transport(format!("{context}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| HydraError::Decode(format!("{context}: {e}")))
}

#[async_trait]
impl AuthorizationServer for HydraClient {
    #[tracing::instrument(skip(self))]
    async fn get_login_request(&self, challenge: &str) -> Result<LoginRequestInfo, HydraError> {
        self.get(self.request_url("login", None, challenge), "get login request")
            .await
    }

    #[tracing::instrument(skip(self, body))]
    async fn accept_login_request(
        &self,
        challenge: &str,
        body: &AcceptLoginRequest,
    ) -> Result<CompletedRequest, HydraError> {
        self.put(
            self.request_url("login", Some("accept"), challenge),
            body,
            "accept login request",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_consent_request(
        &self,
        challenge: &str,
    ) -> Result<ConsentRequestInfo, HydraError> {
        self.get(
            self.request_url("consent", None, challenge),
            "get consent request",
        )
        .await
    }

    #[tracing::instrument(skip(self, body))]
    async fn accept_consent_request(
        &self,
        challenge: &str,
        body: &AcceptConsentRequest,
    ) -> Result<CompletedRequest, HydraError> {
        self.put(
            self.request_url("consent", Some("accept"), challenge),
            body,
            "accept consent request",
        )
        .await
    }

    #[tracing::instrument(skip(self, body))]
    async fn reject_consent_request(
        &self,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, HydraError> {
        self.put(
            self.request_url("consent", Some("reject"), challenge),
            body,
            "reject consent request",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn accept_logout_request(&self, challenge: &str) -> Result<CompletedRequest, HydraError> {
        self.put(
            self.request_url("logout", Some("accept"), challenge),
            &serde_json::json!({}),
            "accept logout request",
        )
        .await
    }

    #[tracing::instrument(skip(self, token))]
    async fn introspect_token(&self, token: &str) -> Result<IntrospectedToken, HydraError> {
        let context = "introspect token";
        let response = self
            .http
            .post(format!("{}/oauth2/introspect", self.admin_url))
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| transport_error(e, context))?;
        treat_response(response, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_urls_follow_admin_layout() {
        let client = HydraClient::new("http://hydra:4445/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.request_url("login", None, "abc"),
            "http://hydra:4445/oauth2/auth/requests/login?challenge=abc"
        );
        assert_eq!(
            client.request_url("consent", Some("reject"), "a b&c"),
            "http://hydra:4445/oauth2/auth/requests/consent/reject?challenge=a%20b%26c"
        );
    }
}
