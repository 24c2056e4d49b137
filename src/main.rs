//! accessguard server
//!
//! Serves the secure-link access API over HTTP.

use accessguard::{
    access::AccessRuleEngine,
    auth::create_auth_provider,
    config::{LogFormat, LoggingConfig, load_config},
    drive::DriveClient,
    identity::create_identity_verifier,
    metrics::AccessMetrics,
    server::{AppState, HttpConfig, run_server_blocking},
    store::open_policy_store,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// accessguard - time-boxed, user-restricted links to Drive files
#[derive(Parser, Debug)]
#[command(name = "accessguard")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "ACCESSGUARD_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long, env = "ACCESSGUARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// HTTP server host; overrides server.host
    #[arg(long, env = "ACCESSGUARD_HOST")]
    host: Option<String>,

    /// HTTP server port; overrides server.port
    #[arg(long, env = "ACCESSGUARD_PORT")]
    port: Option<u16>,
}

fn init_logging(logging: &LoggingConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (pretty, json) = match logging.format {
        LogFormat::Pretty => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json)
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Logging format lives in the config, so it is read first
    let config = load_config(args.config.as_deref())?;
    init_logging(&config.logging, args.log_level.as_deref());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting accessguard"
    );

    let identity = create_identity_verifier(&config.identity)
        .inspect_err(|e| error!(error = %e, "Failed to create identity verifier"))?;
    info!(verifier = identity.verifier_type(), "Identity verifier ready");

    let store = open_policy_store(&config.store)
        .inspect_err(|e| error!(error = %e, "Failed to open policy store"))?;
    info!(backend = store.backend_name(), "Policy store ready");

    let auth = create_auth_provider(&config.drive)
        .inspect_err(|e| error!(error = %e, "Failed to create auth provider"))?;
    let drive = Arc::new(
        DriveClient::new(&config.drive, auth)
            .inspect_err(|e| error!(error = %e, "Failed to create Drive client"))?,
    );

    let metrics = config.metrics.enabled.then(|| {
        Arc::new(AccessMetrics::with_limits(
            config.metrics.recent_capacity,
            config.metrics.resource_capacity,
        ))
    });

    let mut engine = AccessRuleEngine::new(identity, store, drive, &config.access);
    if let Some(metrics) = &metrics {
        engine = engine.with_metrics(metrics.clone());
    }

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let http_config = HttpConfig::from_host_port(&host, port)?;

    let state = AppState {
        engine: Arc::new(engine),
        metrics,
        config: Arc::new(config),
    };

    run_server_blocking(http_config, state).await?;
    Ok(())
}
