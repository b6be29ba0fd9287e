use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runtosip::config::Config;
use runtosip::AppState;

#[derive(Parser, Debug)]
#[command(name = "runtosip")]
#[command(author, version, about = "RunToSip running club backend", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "runtosip.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RunToSip v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data and uploads directories exist
    runtosip::utils::ensure_dir(&config.server.data_dir)?;
    runtosip::utils::ensure_dir(&config.uploads.dir)?;

    // Initialize database
    let db = runtosip::db::init(&config.server.data_dir).await?;

    // Ensure an admin account exists
    runtosip::api::auth::ensure_admin_user(&db, &config.auth).await?;

    // Shared client for link-preview fetches
    let http = runtosip::preview::build_client(&config.preview)?;

    let state = Arc::new(AppState::new(config.clone(), db, http));

    // API router
    let api_router = runtosip::api::create_router(state);

    // Serve uploaded images statically
    let serve_uploads = ServeDir::new(&config.uploads.dir);

    // Serve the site bundle with SPA fallback
    let static_dir = PathBuf::from("static/dist");
    let index_file = static_dir.join("index.html");
    let serve_static = ServeDir::new(&static_dir).not_found_service(ServeFile::new(&index_file));

    let app = axum::Router::new()
        .merge(api_router)
        .nest_service("/uploads", serve_uploads)
        .fallback_service(serve_static);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
