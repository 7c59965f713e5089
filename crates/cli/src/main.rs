use clap::{Parser, Subcommand};
use gateway_core::config::{AppConfig, LoggingConfig};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
use commands::{handle_config_command, inspect, utils::print_error, ConfigCommands};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Inspect cache keys, request limits, and upstream responses for the gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (defaults to $GATEWAY_CONFIG or config/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the URN and cache key of each call in a request file
    Key {
        /// JSON-RPC request file, or `-` for stdin
        file: String,
    },

    /// Check a request file against the configured limits
    Limits {
        /// JSON-RPC request file, or `-` for stdin
        file: String,
    },

    /// Validate an upstream response against the request that produced it
    Check {
        /// JSON-RPC request file
        request: String,

        /// Upstream response file, or `-` for stdin
        response: String,

        /// Last irreversible block number used to resolve irreversible TTLs
        #[arg(long)]
        last_irreversible_block: Option<u64>,
    },

    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,gateway_core={0},gateway_cli={0}", config.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    } else {
        // "pretty" and any other format default to pretty logging
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config(config_command) = cli.command {
        return Ok(handle_config_command(config_command, cli.config.as_deref())?);
    }

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging);
    debug!(
        environment = %config.environment,
        cache_enabled = config.cache.enabled,
        "configuration loaded"
    );

    let outcome = match cli.command {
        Commands::Key { file } => inspect::key_command(&file),
        Commands::Limits { file } => inspect::limits_command(&file, &config),
        Commands::Check { request, response, last_irreversible_block } => {
            inspect::check_command(&request, &response, last_irreversible_block)
        }
        Commands::Config(_) => Ok(()),
    };

    if let Err(e) = &outcome {
        print_error(&e.to_string());
    }
    Ok(outcome?)
}
