//! Gatenet daemon: binds the three role listeners and runs until
//! interrupted. Game logic plugs in by embedding the library; this
//! binary wires echo handlers so the wire path can be exercised and
//! load-tested end to end.

use clap::Parser;
use gatenet::config::GateConfig;
use gatenet::handler::{EchoHandlerFactory, HandlerFactorySet};
use gatenet::server::ServerSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "gatenetd", version, about = "Connection daemon for the game server suite")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run sessions under the all-zero key (emergency recovery only)
    #[arg(long)]
    null_key_mode: bool,

    /// Override the configured log level (trace|debug|info|warn|error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_example_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_example_config {
        println!("{}", GateConfig::example_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => GateConfig::from_file(path)?,
        None => GateConfig::default(),
    };
    config.apply_env_overrides();
    if args.null_key_mode {
        config.security.null_key_mode = true;
    }
    if let Some(level) = &args.log_level {
        config.logging.log_level = level.parse::<Level>()?;
    }

    init_tracing(&config);

    for issue in config.validate() {
        if let Some(advisory) = issue.strip_prefix("WARNING: ") {
            warn!("{advisory}");
        }
    }
    config.validate_strict()?;

    info!(
        bind = %config.server.bind_address,
        launch = config.server.launch_port,
        login = config.server.login_port,
        map = config.server.map_port,
        max_per_ip = config.server.max_connections_per_ip,
        null_key_mode = config.security.null_key_mode,
        "Starting gatenetd"
    );

    let factories = HandlerFactorySet::uniform(Arc::new(EchoHandlerFactory));
    let servers = ServerSet::new(config, factories);
    servers.start_all().await?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    servers.shutdown_all();
    Ok(())
}

fn init_tracing(config: &GateConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.log_level.to_string()));

    if config.logging.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
