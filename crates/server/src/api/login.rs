//! Login challenge endpoints.

use super::pages::{LoginPage, PageError, found, render};
use super::{CHALLENGE_TAG, RedirectResponse};
use crate::AppState;
use crate::challenge::LoginStep;
use crate::error::{AppError, ErrorBody};
use axum::{
    Json,
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    /// Challenge issued by the authorization server.
    #[serde(default)]
    pub login_challenge: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub challenge: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(login_page, login_submit))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/login",
    tag = CHALLENGE_TAG,
    operation_id = "Login Page",
    summary = "Open a login challenge",
    description = "Fetches the login request from the authorization server. When the server reports that the \
                   user is already authenticated the request is accepted and the browser is redirected; \
                   otherwise the login form is rendered.",
    params(LoginQuery),
    responses(
        (status = 200, description = "Login page", content_type = "text/html"),
        (status = 302, description = "Login skipped, redirect to the authorization server"),
        (status = 400, description = "Missing challenge"),
        (status = 502, description = "Authorization server failure"),
    )
)]
async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, PageError> {
    match state.engine.begin_login(&query.login_challenge).await? {
        LoginStep::Redirect(to) => Ok(found(&to)),
        LoginStep::Prompt(info) => Ok(render(&LoginPage {
            challenge: query.login_challenge,
            client_name: info.client.map(|c| c.client_name).unwrap_or_default(),
        })),
    }
}

#[tracing::instrument(skip(state, body), fields(username = %body.username))]
#[utoipa::path(
    post,
    path = "/login",
    tag = CHALLENGE_TAG,
    operation_id = "Login Submit",
    summary = "Submit credentials for a login challenge",
    description = "Verifies the credentials and accepts the login request. Accounts whose email address has \
                   not been confirmed are refused with 403 and sent a new confirmation email.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login accepted", body = RedirectResponse),
        (status = 401, description = "Invalid username or password", body = ErrorBody),
        (status = 403, description = "Email address not confirmed", body = ErrorBody),
        (status = 502, description = "Authorization server failure", body = ErrorBody),
    )
)]
async fn login_submit(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let redirect_to = state
        .engine
        .submit_login(&body.challenge, &body.username, &body.password, body.remember)
        .await?;
    Ok(Json(RedirectResponse { redirect_to }))
}
