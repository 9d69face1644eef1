//! Password reset ("forgot password") flow.

use super::ACCOUNT_TAG;
use super::RedirectResponse;
use super::pages::{ChangePasswordStep1Page, ChangePasswordStep2Page, PageError, render};
use crate::AppState;
use crate::credentials::password::password_rules;
use crate::error::{AppError, ErrorBody};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StepOneQuery {
    /// Where to send the user once the password has been changed.
    #[serde(default)]
    pub redirect_to: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StepTwoQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
    #[serde(default)]
    pub redirect_to: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    pub token: String,
    pub new_password: String,
    pub new_password_confirmation: String,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(step_one_page))
        .routes(routes!(step_two_page))
        .routes(routes!(request_reset, change_password))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/change-password/step-1",
    tag = ACCOUNT_TAG,
    operation_id = "Password Reset Page",
    summary = "Render the forgot-password form",
    params(StepOneQuery),
    responses((status = 200, description = "Forgot-password page", content_type = "text/html"))
)]
async fn step_one_page(
    State(state): State<AppState>,
    Query(query): Query<StepOneQuery>,
) -> Response {
    let mut redirect_to = query.redirect_to;
    if !state.accounts.redirects().allows(&redirect_to) {
        redirect_to.clear();
    }
    render(&ChangePasswordStep1Page { redirect_to })
}

#[tracing::instrument(skip(state, query))]
#[utoipa::path(
    get,
    path = "/change-password/step-2",
    tag = ACCOUNT_TAG,
    operation_id = "New Password Page",
    summary = "Render the new-password form for a reset link",
    params(StepTwoQuery),
    responses(
        (status = 200, description = "New-password page", content_type = "text/html"),
        (status = 401, description = "Link invalid or expired", content_type = "text/html"),
    )
)]
async fn step_two_page(
    State(state): State<AppState>,
    Query(query): Query<StepTwoQuery>,
) -> Result<Response, PageError> {
    let tokens = state.accounts.tokens();
    let claims = tokens.verify(&query.token).map_err(AppError::from)?;
    tokens
        .unpack_password_reset(&claims)
        .map_err(AppError::from)?;
    Ok(render(&ChangePasswordStep2Page {
        token: query.token,
        password_rules: password_rules(),
    }))
}

#[tracing::instrument(skip(state, body))]
#[utoipa::path(
    post,
    path = "/change-password",
    tag = ACCOUNT_TAG,
    operation_id = "Request Password Reset",
    summary = "Send a password reset link",
    description = "Always answers 202 for a well-formed request, whether or not an account uses the address. \
                   `redirect_to` must be a path on this service or a URL on this service or the \
                   authorization server.",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "Request accepted"),
        (status = 400, description = "redirect_to points elsewhere", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody),
    )
)]
async fn request_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<StatusCode, AppError> {
    state
        .accounts
        .request_password_reset(&body.email, &body.redirect_to)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[tracing::instrument(skip(state, body))]
#[utoipa::path(
    put,
    path = "/change-password",
    tag = ACCOUNT_TAG,
    operation_id = "Change Password",
    summary = "Set a new password with a reset token",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = RedirectResponse),
        (status = 400, description = "Password rejected by the policy", body = ErrorBody),
        (status = 401, description = "Token not valid", body = ErrorBody),
    )
)]
async fn change_password(
    State(state): State<AppState>,
    Json(body): Json<PasswordChangeRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let redirect_to = state
        .accounts
        .reset_password(
            &body.token,
            &body.new_password,
            &body.new_password_confirmation,
        )
        .await?;
    Ok(Json(RedirectResponse { redirect_to }))
}
