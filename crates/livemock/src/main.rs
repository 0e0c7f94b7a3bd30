//! Livemock - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use livemock::admin_api::{AdminApiServer, AdminState};
use livemock::config::ServerConfig;
use livemock::live::{InterceptionCoordinator, LiveHub, LiveServer};
use livemock::registry::{EndpointRegistry, JsonFileStore};
use livemock::server::{MockContext, MockServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "livemock",
    about = "Programmable HTTP mock server with live request interception",
    version
)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "LIVEMOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Address serving mocked endpoints
    #[arg(long, env = "LIVEMOCK_MOCK_ADDR", value_name = "ADDR")]
    mock_addr: Option<SocketAddr>,

    /// Address of the management API
    #[arg(long, env = "LIVEMOCK_ADMIN_ADDR", value_name = "ADDR")]
    admin_addr: Option<SocketAddr>,

    /// Address accepting live operator sessions
    #[arg(long, env = "LIVEMOCK_LIVE_ADDR", value_name = "ADDR")]
    live_addr: Option<SocketAddr>,

    /// JSON file holding the mock catalog
    #[arg(long, env = "LIVEMOCK_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Directory for catalog backups
    #[arg(long, env = "LIVEMOCK_BACKUP_DIR")]
    backup_dir: Option<PathBuf>,

    /// How long an intercepted request waits for an override (milliseconds)
    #[arg(long, env = "LIVEMOCK_INTERCEPT_TIMEOUT_MS")]
    intercept_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'L', long, env = "LIVEMOCK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Args {
    /// Load the file configuration, then apply flag and environment overrides.
    fn resolve_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(addr) = self.mock_addr {
            config.mock_addr = addr;
        }
        if let Some(addr) = self.admin_addr {
            config.admin_addr = addr;
        }
        if let Some(addr) = self.live_addr {
            config.live_addr = addr;
        }
        if let Some(path) = &self.data_file {
            config.data_file = path.clone();
        }
        if let Some(dir) = &self.backup_dir {
            config.backup_dir = dir.clone();
        }
        if let Some(ms) = self.intercept_timeout_ms {
            config.intercept_timeout_ms = ms;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if args.print_config {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    config.validate()?;
    if args.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    // Catalog
    let store = Arc::new(JsonFileStore::new(&config.data_file, &config.backup_dir));
    let registry = Arc::new(EndpointRegistry::open_with_default_project(
        store,
        &config.default_project,
    )?);
    info!(
        path = %config.data_file.display(),
        mocks = registry.len(),
        "Mock catalog loaded"
    );

    // Live interception
    let hub = Arc::new(LiveHub::new());
    let coordinator = InterceptionCoordinator::new(hub.clone(), config.intercept_timeout());

    let mock_server = MockServer::bind(
        config.mock_addr,
        Arc::new(MockContext::new(
            Arc::clone(&registry),
            Arc::clone(&coordinator),
            config.normalize_options(),
        )),
    )
    .await?;
    let admin_server = AdminApiServer::bind(
        config.admin_addr,
        Arc::new(AdminState::new(Arc::clone(&registry), Arc::clone(&coordinator))),
    )
    .await?;
    let live_server = LiveServer::bind(config.live_addr, hub).await?;

    info!(
        timeout_ms = config.intercept_timeout_ms,
        "Livemock started"
    );

    tokio::select! {
        result = mock_server.run() => {
            if let Err(e) = result {
                error!("Mock server stopped: {}", e);
            }
        }
        result = admin_server.run() => {
            if let Err(e) = result {
                error!("Admin API stopped: {}", e);
            }
        }
        result = live_server.run() => {
            if let Err(e) = result {
                error!("Live session server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
