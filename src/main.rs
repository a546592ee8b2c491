use anyhow::Result;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use switchbot_exporter::{config::Config, probe, server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// SwitchBot API token (overrides config)
    #[arg(long, env = "SWITCHBOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// SwitchBot API secret (overrides config)
    #[arg(long, env = "SWITCHBOT_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Port to listen on for metrics (overrides config)
    #[arg(short, long, env = "EXPORTER_PORT")]
    port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long, env = "EXPORTER_ADDR")]
    addr: Option<String>,

    /// Seconds between collection cycles (overrides config)
    #[arg(long, env = "COLLECTION_INTERVAL")]
    interval: Option<u64>,

    /// Path to devices.json (overrides config)
    #[arg(long, env = "DEVICES_FILE")]
    devices: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the exporter (default)
    Serve,
    /// Fetch device status once and print the raw API response
    Probe {
        /// Device ids to query; defaults to every device in the device file
        device_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(token) = args.token {
        config.switchbot.token = SecretString::from(token.trim().to_string());
    }
    if let Some(secret) = args.secret {
        config.switchbot.secret = SecretString::from(secret.trim().to_string());
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(interval) = args.interval {
        config.metrics.collection_interval_seconds = interval;
    }
    if let Some(devices) = args.devices {
        config.metrics.device_config_path = devices;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!(
                "Starting SwitchBot Prometheus Exporter v{}",
                env!("CARGO_PKG_VERSION")
            );
            info!("SwitchBot API: {}", config.switchbot.base_url);
            info!(
                "Metrics endpoint: http://{}:{}/metrics",
                config.server.addr, config.server.port
            );

            if let Err(e) = server::start(config).await {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Probe { device_ids } => {
            probe::run(
                config.switchbot,
                &config.metrics.device_config_path,
                device_ids,
            )
            .await?;
        }
    }

    Ok(())
}
