use clap::Subcommand;
use gateway_core::config::AppConfig;
use std::path::Path;

use super::utils::{print_error, print_info, print_success, CliError, CliResult};

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the configuration file
    Validate,

    /// Show the effective configuration, including `GATEWAY__*` overrides
    Show,

    /// Generate a sample configuration file
    Generate {
        /// Output path for the config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: String,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config_command(command: ConfigCommands, path: Option<&str>) -> CliResult<()> {
    let file = resolve_path(path);
    match command {
        ConfigCommands::Validate => validate_config(&file),
        ConfigCommands::Show => show_config(&file),
        ConfigCommands::Generate { output, force } => generate_config(&output, force),
    }
}

fn resolve_path(path: Option<&str>) -> String {
    path.map(str::to_string)
        .or_else(|| std::env::var("GATEWAY_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

fn load(file: &str) -> CliResult<AppConfig> {
    AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));
    let config = load(file)?;

    print_info("Validating configuration...");
    config.validate().map_err(CliError::Config)?;

    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!("  Environment: {}", config.environment);
    println!("  Cache: {}", if config.cache.enabled { "enabled" } else { "disabled" });
    println!(
        "  Limits: {}",
        if config.limits.is_some() { "configured" } else { "defaults" }
    );

    Ok(())
}

fn show_config(file: &str) -> CliResult<()> {
    let config = load(file)?;

    println!("Configuration from {file}:");

    println!("\n[Cache]");
    println!("  Enabled: {}", config.cache.enabled);
    println!("  Read Timeout: {}ms", config.cache.read_timeout_ms);
    match config.memory_max_ttl() {
        Some(ttl) => println!("  Memory Max TTL: {}s", ttl.as_secs()),
        None => println!("  Memory Max TTL: unbounded"),
    }
    println!("  Memory Max Entries: {}", config.cache.memory_max_entries);

    println!("\n[Limits]");
    match &config.limits {
        Some(limits) => {
            let mut blacklist: Vec<&String> =
                limits.accounts_blacklist.iter().flatten().collect();
            blacklist.sort();
            println!("  Accounts Blacklist: {} account(s)", blacklist.len());
            for account in blacklist {
                println!("    {account}");
            }
            println!("  Custom JSON Size Limit: {}", limits.custom_json_size_limit);
            println!("  Batch Size Limit: {}", limits.batch_size_limit);
        }
        None => println!("  (not configured, built-in defaults apply)"),
    }

    println!("\n[Logging]");
    println!("  Level: {}", config.logging.level);
    println!("  Format: {}", config.logging.format);

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# JSON-RPC Gateway Configuration
# Every value below is optional; omitted values fall back to built-in defaults.
# Any field can be overridden with GATEWAY__<SECTION>__<FIELD> environment variables.

environment = "development"

[cache]
enabled = true
# Cache reads slower than this count as misses
read_timeout_ms = 1000
# Memory store expiry cap in seconds (0 disables the cap)
memory_max_ttl_seconds = 180
memory_max_entries = 2000

[limits]
accounts_blacklist = []
custom_json_size_limit = 2000
batch_size_limit = 50

[logging]
level = "info"
format = "pretty"
"#;

fn generate_config(output: &str, force: bool) -> CliResult<()> {
    if Path::new(output).exists() && !force {
        return Err(CliError::Config(format!(
            "File {output} already exists. Use --force to overwrite."
        )));
    }

    if let Some(parent) = Path::new(output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, SAMPLE_CONFIG)?;

    print_success(&format!("Sample configuration written to {output}"));
    print_info("Edit the [limits] section before deploying");

    Ok(())
}
