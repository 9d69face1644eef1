//! Registration and email confirmation.

use super::ACCOUNT_TAG;
use super::pages::{EmailConfirmedPage, PageError, RegistrationPage, render};
use crate::AppState;
use crate::credentials::password::password_rules;
use crate::error::{AppError, ErrorBody};
use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegistrationQuery {
    #[serde(default)]
    pub login_challenge: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    /// Pending login challenge, resumed once the email is confirmed.
    #[serde(default)]
    pub challenge: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegistrationResponse {
    pub user_credential_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConfirmationQuery {
    #[serde(default)]
    pub token: String,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(registration_page, register))
        .routes(routes!(confirm_email))
}

#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/registration",
    tag = ACCOUNT_TAG,
    operation_id = "Registration Page",
    summary = "Render the registration form",
    params(RegistrationQuery),
    responses((status = 200, description = "Registration page", content_type = "text/html"))
)]
async fn registration_page(Query(query): Query<RegistrationQuery>) -> Response {
    render(&RegistrationPage {
        challenge: query.login_challenge,
        password_rules: password_rules(),
    })
}

#[tracing::instrument(skip(state, body), fields(username = %body.username))]
#[utoipa::path(
    post,
    path = "/registration",
    tag = ACCOUNT_TAG,
    operation_id = "Register",
    summary = "Create a user credential",
    description = "Creates the credential and sends an email confirmation link. The account cannot sign in \
                   until the address is confirmed.",
    request_body = RegistrationRequest,
    responses(
        (status = 200, description = "Credential created", body = RegistrationResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 409, description = "Username or email already registered", body = ErrorBody),
    )
)]
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegistrationRequest>,
) -> Result<Json<RegistrationResponse>, AppError> {
    let user_credential_id = state
        .accounts
        .register(
            &body.username,
            &body.email,
            &body.password,
            &body.password_confirmation,
            &body.challenge,
        )
        .await?;
    Ok(Json(RegistrationResponse { user_credential_id }))
}

#[tracing::instrument(skip(state, query))]
#[utoipa::path(
    get,
    path = "/email-confirmation",
    tag = ACCOUNT_TAG,
    operation_id = "Confirm Email",
    summary = "Redeem an email confirmation link",
    description = "Marks the address as confirmed. When the link carries a pending login challenge, the login \
                   is accepted and the page links back to the authorization server.",
    params(ConfirmationQuery),
    responses(
        (status = 200, description = "Email confirmed", content_type = "text/html"),
        (status = 401, description = "Link invalid, expired or already used", content_type = "text/html"),
    )
)]
async fn confirm_email(
    State(state): State<AppState>,
    Query(query): Query<ConfirmationQuery>,
) -> Result<Response, PageError> {
    let confirmation = match state.accounts.confirm_email(&query.token).await {
        Ok(confirmation) => confirmation,
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                return Err(e.into());
            }
            let page = EmailConfirmedPage {
                successful: false,
                message: e.public_message(),
                redirect_to: None,
            };
            return Ok((status, render(&page)).into_response());
        }
    };

    let redirect_to = if confirmation.challenge.is_empty() {
        None
    } else {
        Some(
            state
                .engine
                .accept_login_for(&confirmation.challenge, &confirmation.username)
                .await?,
        )
    };
    let page = EmailConfirmedPage {
        successful: true,
        message: "Your email has been confirmed".into(),
        redirect_to,
    };
    Ok(render(&page))
}
