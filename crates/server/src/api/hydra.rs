use super::MISC_TAG;
use crate::AppState;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Authorization server addresses, for UI clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HydraInfo {
    pub hydra_admin_url: String,
    pub hydra_public_url: String,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(hydra_info))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/hydra",
    tag = MISC_TAG,
    operation_id = "Hydra Info",
    summary = "Authorization server addresses",
    responses((status = 200, description = "Configured authorization server URLs", body = HydraInfo))
)]
async fn hydra_info(State(state): State<AppState>) -> Json<HydraInfo> {
    Json(HydraInfo {
        hydra_admin_url: state.config.hydra.admin_url.clone(),
        hydra_public_url: state.config.hydra.public_url.clone(),
    })
}
