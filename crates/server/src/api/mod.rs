//! HTTP boundary.
//!
//! - `login`, `consent`, `logout` - challenge pages and submissions
//! - `registration` - registration and email confirmation
//! - `password` - password reset
//! - `update` - credential update behind a bearer token
//! - `hydra`, `health`, `metrics` - miscellaneous endpoints
//! - `openapi` - API documentation

pub mod auth;
pub mod consent;
pub mod health;
pub mod hydra;
pub mod login;
pub mod logout;
pub mod metrics;
pub mod openapi;
pub mod pages;
pub mod password;
pub mod registration;
pub mod update;

pub use health::MISC_TAG;

use crate::AppState;
use crate::telemetry::track_latency;
use axum::Router;
use axum::middleware;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

pub const CHALLENGE_TAG: &str = "Challenges";
pub const ACCOUNT_TAG: &str = "Account";

/// Where the browser should go next.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RedirectResponse {
    pub redirect_to: String,
}

/// Build the application router with documentation and static assets.
pub fn app(state: AppState) -> Router {
    let static_dir = format!("{}/static", state.config.base_ui_path.trim_end_matches('/'));
    let latency = state.metrics.clone();

    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(login::router())
        .merge(consent::router())
        .merge(logout::router())
        .merge(registration::router())
        .merge(password::router())
        .merge(update::router())
        .merge(hydra::router())
        .routes(routes!(health::health))
        .routes(routes!(metrics::metrics))
        .with_state(state)
        .split_for_parts();

    router
        .merge(Redoc::with_url("/api-docs", api))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(latency, track_latency))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves, then drain open connections.
#[tracing::instrument(skip(state, shutdown))]
pub async fn start_webserver(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> color_eyre::Result<()> {
    let addr = state.config.listen_addr.clone();
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        name = "http.server.listening",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        addr = %addr,
        message = "Server running"
    );
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
