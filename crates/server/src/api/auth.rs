//! Bearer token extractor for the `/secure` endpoints.
//!
//! Access tokens are issued by the authorization server, so they are checked
//! through its introspection endpoint rather than locally.

use crate::AppState;
use crate::error::AppError;
use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts},
};
use serde::Deserialize;

/// Identity behind an active access token.
#[derive(Debug, Clone)]
pub struct IntrospectedUser {
    /// Username the token was issued for.
    pub subject: String,
    pub scopes: Vec<String>,
    /// The raw token, for pages that call back into the API.
    pub token: String,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// `Authorization: Bearer <token>`, falling back to a `token` query parameter
/// for plain browser navigations.
fn bearer_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|t| !t.is_empty())
        .map(str::to_owned);
    if from_header.is_some() {
        return from_header;
    }
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for IntrospectedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

        let introspected = state.engine.server().introspect_token(&token).await?;
        if !introspected.active {
            return Err(AppError::Unauthorized("token is not active".into()));
        }
        let subject = introspected
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("token has no subject".into()))?;

        Ok(IntrospectedUser {
            subject,
            scopes: introspected
                .scope
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
            token,
        })
    }
}
