//! Prometheus metrics endpoint.

use crate::AppState;
use crate::api::health::MISC_TAG;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/metrics",
    tag = MISC_TAG,
    operation_id = "Prometheus Metrics",
    summary = "Request latency metrics",
    responses(
        (status = 200, description = "Prometheus metrics in text exposition format", body = String, content_type = "text/plain")
    )
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
