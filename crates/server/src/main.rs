//! agentid-server binary

use std::sync::Arc;

use agentid_server::{
    create_router, ApiKeyAuthenticator, AppState, LogFormat, SeedFile, ServerConfig,
};
use agentid_trust::TrustConfig;
use agentid_verify::VerifierConfig;
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    let trust_config = match &config.trust_config {
        Some(path) => TrustConfig::from_toml_file(path)
            .with_context(|| format!("failed to load trust config from {}", path.display()))?,
        None => TrustConfig::default(),
    };
    let verifier_config = VerifierConfig {
        dependency_timeout: config.verify_timeout,
        ..VerifierConfig::default()
    };
    let authenticator = Arc::new(ApiKeyAuthenticator::from_entries(&config.api_keys));

    let (state, worker) = AppState::in_memory(
        trust_config,
        verifier_config,
        authenticator,
        config.recalc_interval,
    )
    .context("invalid trust configuration")?;
    let (worker_shutdown, worker_task) = worker.start();

    if let Some(path) = &config.agents_file {
        let seed = SeedFile::from_file(path)
            .with_context(|| format!("failed to load agents from {}", path.display()))?;
        let seeded = state
            .seed_agents(&seed)
            .await
            .context("failed to seed agents")?;
        tracing::info!(agents = seeded.len(), path = %path.display(), "Agents seeded");
    } else {
        tracing::warn!("AGENTID_AGENTS not set, starting with an empty agent registry");
    }

    let app = create_router(state);
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        api_keys = config.api_keys.len(),
        verify_timeout_ms = config.verify_timeout.as_millis() as u64,
        "Starting agentid-server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = worker_shutdown.send(true);
    if let Err(err) = worker_task.await {
        tracing::warn!(error = %err, "recalculation worker did not stop cleanly");
    }
    tracing::info!("agentid-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
