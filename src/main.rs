//! connwatch Binary Entry Point
//!
//! Runs the web UI, the JSON API and the optional auto-test timer.
//! Core functionality is provided by the `connwatch` library crate.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use connwatch::{
    AutoTester, HttpProbe, LogStore, TestRunner,
    config::{AppConfig, parse_duration},
    server::{AppState, create_router},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// connwatch - Connectivity checker with a stats dashboard
#[derive(Parser, Debug)]
#[command(name = "connwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "CONNWATCH_CONFIG"
    )]
    config: PathBuf,

    /// Server bind address (overrides config file)
    #[arg(long, env = "CONNWATCH_BIND")]
    bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Directory served under /static (overrides config file)
    #[arg(long, env = "CONNWATCH_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Log file path (overrides config file)
    #[arg(long, env = "CONNWATCH_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// Probe target URL (overrides config file)
    #[arg(long, env = "CONNWATCH_URL")]
    url: Option<String>,

    /// Probe timeout, e.g. "5s" (overrides config file)
    #[arg(long, env = "CONNWATCH_TIMEOUT", value_parser = parse_duration)]
    timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,connwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("connwatch - connectivity checker");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = AppConfig::load_or_default(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.static_dir {
        config.server.static_dir = dir;
    }
    if let Some(path) = cli.log_path {
        config.log.path = path;
    }
    if let Some(url) = cli.url {
        config.probe.url = url;
    }
    if let Some(timeout) = cli.timeout {
        config.probe.timeout = timeout;
    }
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Log: {}, Target: {} (timeout {:?})",
        config.server.bind,
        config.server.port,
        config.log.path.display(),
        config.probe.url,
        config.probe.timeout,
    );

    let probe = HttpProbe::new(config.probe.clone())?;
    let store = LogStore::new(config.log.path.clone());
    let runner = TestRunner::new(Arc::new(probe), store);
    let auto = Arc::new(AutoTester::new(
        runner.clone(),
        config.auto.default_interval,
    ));

    let app = create_router(AppState {
        runner,
        auto: Arc::clone(&auto),
        auto_config: config.auto.clone(),
        static_dir: config.server.static_dir.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping auto test...");
    auto.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
