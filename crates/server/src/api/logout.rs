use super::CHALLENGE_TAG;
use super::pages::{PageError, found};
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogoutQuery {
    #[serde(default, alias = "challenge")]
    pub logout_challenge: String,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(logout))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/logout",
    tag = CHALLENGE_TAG,
    operation_id = "Logout",
    summary = "Accept a logout challenge",
    params(LogoutQuery),
    responses(
        (status = 302, description = "Redirect to the authorization server"),
        (status = 400, description = "Missing challenge"),
        (status = 502, description = "Authorization server failure"),
    )
)]
async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
) -> Result<Response, PageError> {
    let redirect_to = state.engine.accept_logout(&query.logout_challenge).await?;
    Ok(found(&redirect_to))
}
