//! Sluice server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use sluice_core::config::AppConfig;
use sluice_server::{AppState, create_router};
use sluice_storage::{StorageError, UnsupportedWriter};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sluice - chunked file upload service
#[derive(Parser, Debug)]
#[command(name = "sluiced")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SLUICE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sluice v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::info!("no config file at {}, using defaults and environment", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SLUICE_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    sluice_server::metrics::register_metrics();

    // Chunked uploads only exist on a local filesystem. A remote backend
    // still gets a running service so the rest of the framework's upload
    // surface keeps working; chunk requests are refused.
    let writer = match sluice_storage::from_config(&config.storage).await {
        Ok(writer) => writer,
        Err(StorageError::UnsupportedBackend(backend)) => {
            tracing::warn!(
                backend,
                "storage backend does not support chunked uploads; chunk requests will be refused"
            );
            Arc::new(UnsupportedWriter::new(backend)) as Arc<dyn sluice_storage::ChunkWriter>
        }
        Err(e) => return Err(e).context("failed to initialize chunk writer"),
    };
    writer
        .health_check()
        .await
        .context("chunk writer health check failed")?;
    tracing::info!(backend = writer.backend_name(), "chunk writer initialized");

    let sessions = sluice_session::from_config(&config.session_store)
        .await
        .context("failed to initialize session store")?;
    sessions
        .health_check()
        .await
        .context("session store health check failed")?;
    tracing::info!("session store initialized");

    if config.gate.token_hash.is_none() {
        tracing::warn!("no gate token configured, upload routes are unauthenticated");
    }

    let bind = config.server.bind.clone();
    let state = AppState::new(config, sessions, writer);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
