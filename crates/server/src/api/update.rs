//! Credential update for signed-in users.

use super::ACCOUNT_TAG;
use super::auth::IntrospectedUser;
use super::pages::{PageError, UpdatePage, render};
use crate::AppState;
use crate::credentials::password::password_rules;
use crate::error::{AppError, ErrorBody};
use axum::{
    Json,
    extract::{Query, State},
    response::Response,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UpdateQuery {
    #[serde(default)]
    pub redirect_to: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRequest {
    pub old_password: String,
    /// Empty keeps the current password.
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirmation: String,
    /// Empty keeps the current address.
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateResponse {
    pub email_changed: bool,
    pub password_changed: bool,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(update_page, update_credential))
}

#[tracing::instrument(skip(state, user), fields(subject = %user.subject))]
#[utoipa::path(
    get,
    path = "/secure/update",
    tag = ACCOUNT_TAG,
    operation_id = "Update Page",
    summary = "Render the account settings form",
    params(UpdateQuery),
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Account settings page", content_type = "text/html"),
        (status = 401, description = "Missing or inactive access token", body = ErrorBody),
    )
)]
async fn update_page(
    State(state): State<AppState>,
    user: IntrospectedUser,
    Query(query): Query<UpdateQuery>,
) -> Result<Response, PageError> {
    let credential = state
        .accounts
        .store()
        .find_by_username(&user.subject)
        .await
        .map_err(AppError::from)?;
    let mut redirect_to = query.redirect_to;
    if !state.accounts.redirects().allows(&redirect_to) {
        redirect_to.clear();
    }
    Ok(render(&UpdatePage {
        username: credential.username,
        email: credential.email,
        bearer: user.token,
        redirect_to,
        password_rules: password_rules(),
    }))
}

#[tracing::instrument(skip(state, user, body), fields(subject = %user.subject))]
#[utoipa::path(
    put,
    path = "/secure/update",
    tag = ACCOUNT_TAG,
    operation_id = "Update Credential",
    summary = "Change email and/or password",
    description = "Requires the current password. A changed email address must be confirmed again before \
                   the next sign-in.",
    request_body = UpdateRequest,
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Credential updated", body = UpdateResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Wrong current password or inactive token", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    )
)]
async fn update_credential(
    State(state): State<AppState>,
    user: IntrospectedUser,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, AppError> {
    let outcome = state
        .accounts
        .update(
            &user.subject,
            &body.old_password,
            &body.email,
            &body.new_password,
            &body.new_password_confirmation,
        )
        .await?;
    Ok(Json(UpdateResponse {
        email_changed: outcome.email_changed,
        password_changed: outcome.password_changed,
    }))
}
