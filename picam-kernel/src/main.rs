/**
 * PICAM KERNEL - Point d'entrée du serveur
 *
 * RÔLE : Bootstrap : .env, logs, config YAML, moteur de flotte, poller, API Axum.
 */

use anyhow::{Context, Result};
use picam_kernel::config::load_config;
use picam_kernel::engine::{EngineSettings, FleetEngine};
use picam_kernel::health::HealthTracker;
use picam_kernel::http::{build_router, AppState};
use picam_kernel::remote::SshCommandExecutor;
use picam_kernel::transport::ReqwestTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("picam_kernel=info")),
        )
        .init();

    let cfg = load_config().await.context("failed to load camera config")?;

    let http = Arc::new(ReqwestTransport::new().context("failed to build HTTP client")?);
    let executor = Arc::new(SshCommandExecutor::default());
    let engine = FleetEngine::new(cfg.cameras.clone(), http, executor, EngineSettings::from_config(&cfg));

    let poller = engine.start();

    let app = build_router(AppState { engine, health_tracker: HealthTracker::new() });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        cameras = %cfg.cameras.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "),
        "picam kernel listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    poller.shutdown().await;
    Ok(())
}
