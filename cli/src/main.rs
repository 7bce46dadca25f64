//! Texnouz billing guard: CLI server
//!
//! Headless metering and wallet-guard billing engine for OCPP 1.6 charge
//! points, suitable for a systemd service, Docker container, or standalone
//! process.
//!
//! ```sh
//! # Run with default config (~/.config/texnouz-billing/config.toml)
//! billing-guard
//!
//! # Custom config path
//! billing-guard --config /etc/texnouz-billing/config.toml
//!
//! # Override ports, keep state in memory
//! billing-guard --api-port 8080 --ws-port 9000 --in-memory
//!
//! # Validate config without starting
//! billing-guard --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use texnouz_billing::config::AppConfig;
use texnouz_billing::server::{init_tracing, ServerHandle, ServerOptions};

/// Texnouz billing guard: wallet-guarded metering for EV charging sessions.
#[derive(Parser, Debug)]
#[command(
    name = "billing-guard",
    version,
    about = "Metering and wallet-guard billing engine for EV charging",
    long_about = "Texnouz billing guard: OCPP 1.6 WebSocket endpoint plus REST API \
                  that meters charging sessions, bills them against tariffs, and stops \
                  sessions whose wallet runs dry.\n\n\
                  Default config: ~/.config/texnouz-billing/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "BILLING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the WebSocket listen port.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Keep all billing state in memory instead of SQLite.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .unwrap_or_else(texnouz_billing::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            // Fallback tracing init
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            AppConfig::default()
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }
    if let Some(port) = cli.ws_port {
        info!("CLI override: ws_port = {}", port);
        config.server.ws_port = port;
    }
    if let Some(ref level) = cli.log_level {
        info!("CLI override: log_level = {}", level);
        config.logging.level = level.clone();
    }
    if cli.in_memory {
        info!("CLI override: database.in_memory = true");
        config.database.in_memory = true;
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        if let Err(e) = config.validate() {
            println!("❌ Configuration is invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        println!("   Config file   : {}", config_path.display());
        println!("   API address   : {}", config.server.api_address());
        println!("   WS address    : {}", config.server.ws_address());
        println!("   Database      : {}", config.database.connection_url());
        println!("   Log level     : {}", config.logging.level);
        println!("   Floor         : {}", config.billing.floor_threshold);
        println!("   Poll interval : {}s", config.billing.poll_interval_secs);
        println!("   Wallets       : {}", config.providers.wallets.len());
        println!("   Schedules     : {}", config.providers.schedules.len());
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
