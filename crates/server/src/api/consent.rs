//! Consent challenge endpoints.

use super::pages::{ConsentPage, PageError, found, render};
use super::{CHALLENGE_TAG, RedirectResponse};
use crate::AppState;
use crate::challenge::ConsentStep;
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
pub struct ConsentQuery {
    #[serde(default)]
    pub consent_challenge: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsentRequest {
    pub challenge: String,
    pub accept: bool,
    #[serde(default)]
    pub grant_scope: Vec<String>,
    #[serde(default)]
    pub remember: bool,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(consent_page, consent_submit))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/consent",
    tag = CHALLENGE_TAG,
    operation_id = "Consent Page",
    summary = "Open a consent challenge",
    description = "Fetches the consent request. Previously granted requests are accepted with every requested \
                   scope and audience and redirected; otherwise the consent form is rendered.",
    params(ConsentQuery),
    responses(
        (status = 200, description = "Consent page", content_type = "text/html"),
        (status = 302, description = "Consent skipped, redirect to the authorization server"),
        (status = 502, description = "Authorization server failure"),
    )
)]
async fn consent_page(
    State(state): State<AppState>,
    Query(query): Query<ConsentQuery>,
) -> Result<Response, PageError> {
    match state.engine.begin_consent(&query.consent_challenge).await? {
        ConsentStep::Redirect(to) => Ok(found(&to)),
        ConsentStep::Prompt(prompt) => Ok(render(&ConsentPage { prompt })),
    }
}

#[tracing::instrument(skip(state, body), fields(accept = body.accept))]
#[utoipa::path(
    post,
    path = "/consent",
    tag = CHALLENGE_TAG,
    operation_id = "Consent Submit",
    summary = "Grant or deny a consent challenge",
    request_body = ConsentRequest,
    responses(
        (status = 200, description = "Decision forwarded", body = RedirectResponse),
        (status = 400, description = "Missing challenge", body = ErrorBody),
        (status = 502, description = "Authorization server failure", body = ErrorBody),
    )
)]
async fn consent_submit(
    State(state): State<AppState>,
    Json(body): Json<ConsentRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let redirect_to = state
        .engine
        .submit_consent(&body.challenge, body.accept, &body.grant_scope, body.remember)
        .await?;
    Ok(Json(RedirectResponse { redirect_to }))
}
