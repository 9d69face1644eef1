use migration::{Migrator, MigratorTrait};
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use whisper::AppState;
use whisper::api::start_webserver;
use whisper::config::load_config;
use whisper::hydra::HydraClient;
use whisper::notifications::{self, Dispatcher, SmtpTransport};

fn initialize_standard_tracing(level: &str) {
    let default_directives = format!("whisper={level},tower_http={level},sea_orm=warn");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(
            name = "server.signal.failed",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            error = %e,
            message = "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    tracing::info!(
        name = "server.signal.received",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        message = "Shutdown requested"
    );
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    let config = load_config()?;
    initialize_standard_tracing(&config.log_level);

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider)
        .map_err(|_| color_eyre::eyre::eyre!("Failed to install crypto provider"))?;

    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .sqlx_logging(false);
    let db = Arc::new(Database::connect(options).await?);
    Migrator::up(db.as_ref(), None).await?;
    tracing::info!(
        name = "server.database.ready",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        max_connections = config.db_max_connections,
        message = "Database connected and migrated"
    );

    let hydra = Arc::new(HydraClient::new(
        &config.hydra.admin_url,
        std::time::Duration::from_secs(config.hydra.request_timeout_secs),
    )?);
    let transport = Arc::new(SmtpTransport::new(&config.smtp)?);

    let (outbox, inbox) = notifications::channel();
    let dispatcher = Dispatcher::start(inbox, transport);

    let state = AppState::build(config, db, hydra, outbox)?;

    // Forget redeemed action tokens once they have expired and drain the
    // latency histograms between scrapes.
    {
        let tokens = state.accounts.tokens().clone();
        let metrics = state.metrics.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                metrics.run_upkeep();
                let purged = tokens.purge_expired();
                if purged > 0 {
                    tracing::debug!(
                        name = "tokens.purge.completed",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        purged,
                        message = "Purged expired token redemptions"
                    );
                }
            }
        });
    }

    start_webserver(state, shutdown_signal()).await?;

    dispatcher.stop();
    dispatcher.join().await;
    Ok(())
}
