//! Coffer server binary.

use anyhow::{Context, Result};
use clap::Parser;
use coffer_core::config::{AppConfig, StorageConfig};
use coffer_server::{create_router, AppState, RemoteAnalyzer};
use coffer_session::SessionManager;
use coffer_storage::{FilesystemBackend, ObjectStore, S3Backend};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Coffer - secure document-session service
#[derive(Parser, Debug)]
#[command(name = "cofferd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "COFFER_CONFIG",
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

    tracing::info!("Coffer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("COFFER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .storage
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid storage configuration")?;

    // Initialize storage: object storage when configured, with the local
    // fallback always available
    let (object_storage, local_storage): (Option<Arc<dyn ObjectStore>>, Arc<dyn ObjectStore>) =
        match &config.storage {
            StorageConfig::S3 {
                bucket,
                endpoint,
                region,
                access_key_id,
                secret_access_key,
                force_path_style,
            } => {
                let s3 = S3Backend::new(
                    bucket,
                    endpoint.clone(),
                    region.clone(),
                    access_key_id.clone(),
                    secret_access_key.clone(),
                    *force_path_style,
                )
                .await
                .context("failed to initialize object storage")?;

                s3.health_check()
                    .await
                    .context("object storage health check failed")?;
                s3.ensure_lifecycle().await;

                let local = FilesystemBackend::new(&config.server.upload_dir)
                    .await
                    .context("failed to initialize local fallback storage")?;

                tracing::info!(bucket = %bucket, "object storage initialized");
                (Some(Arc::new(s3) as Arc<dyn ObjectStore>), Arc::new(local))
            }
            StorageConfig::Filesystem { .. } => {
                let local = coffer_storage::from_config(&config.storage)
                    .await
                    .context("failed to initialize local storage")?;
                local
                    .health_check()
                    .await
                    .context("local storage health check failed")?;
                tracing::info!("filesystem storage initialized");
                (None, local)
            }
        };

    // Session manager over the in-process store
    let sessions = Arc::new(SessionManager::in_memory(config.server.session_ttl()));

    // Analyzer boundary
    let analyzer = RemoteAnalyzer::from_config(&config.analysis)
        .context("failed to initialize analysis client")?;
    if config.analysis.endpoint.is_none() {
        tracing::warn!("no analysis endpoint configured, processing requests will fail");
    }

    let bind = config.server.bind.clone();
    let sweep_interval = config.server.sweep_interval();

    let state = AppState::new(config, object_storage, local_storage, sessions, analyzer);

    // Periodic expired-session sweep (deletes orphaned ciphertext too)
    if let Some(interval) = sweep_interval {
        let _sweep_handle = coffer_server::sweep::spawn_sweep_task(state.clone(), interval);
        tracing::info!(interval_secs = interval.as_secs(), "session sweep task spawned");
    } else {
        tracing::warn!("session sweeping disabled, expired sessions persist until restart");
    }

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "server listening");

    axum::serve(listener, router)
        .await
        .context("server error")?;

    Ok(())
}
