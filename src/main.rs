//! herakles-vm-dashboard - version 0.1.0
//!
//! Virtual memory dashboard with tracing logging.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;
mod config;
mod startup_checks;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use cli::{Args, Commands, LogLevel};
use commands::{
    command_check, command_config, command_hierarchy, command_leaks, command_maps,
    command_page_table, command_snapshot, command_stats, command_stress, command_system,
};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Maps a config-file level name to the CLI enum.
fn parse_log_level(name: &str) -> Option<LogLevel> {
    match name.to_ascii_lowercase().as_str() {
        "off" => Some(LogLevel::Off),
        "error" => Some(LogLevel::Error),
        "warn" => Some(LogLevel::Warn),
        "info" => Some(LogLevel::Info),
        "debug" => Some(LogLevel::Debug),
        "trace" => Some(LogLevel::Trace),
        _ => None,
    }
}

/// Initializes tracing logging subsystem with configured log level.
/// Logs go to stderr; stdout carries only command output.
fn setup_logging(config: &Config, args: &Args) {
    let level = args
        .log_level
        .clone()
        .or_else(|| config.log_level.as_deref().and_then(parse_log_level))
        .unwrap_or(LogLevel::Warn);

    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Config generation and requirement checks don't need a valid config
    match &args.command {
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => return command_config(output.clone(), format.clone(), *commented),
        Some(Commands::Check) => {
            let config = resolve_config(&args)?;
            setup_logging(&config, &args);
            return command_check(&config);
        }
        _ => {}
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    let result = match args.command.as_ref().unwrap_or(&Commands::Snapshot) {
        Commands::System => command_system(&config),
        Commands::Maps => command_maps(&config),
        Commands::Leaks { file } => command_leaks(file.clone(), &config),
        Commands::Stats {
            samples,
            interval_ms,
        } => command_stats(*samples, *interval_ms, &config),
        Commands::PageTable => command_page_table(&config),
        Commands::Hierarchy { summary } => command_hierarchy(*summary, &config),
        Commands::Snapshot => command_snapshot(&config),
        Commands::Stress {
            chunked,
            workers,
            allocations,
            chunk_mb,
            cap_mb,
        } => command_stress(*chunked, *workers, *allocations, *chunk_mb, *cap_mb, &config)
            .map_err(|e| -> Box<dyn std::error::Error> { e.into() }),

        Commands::Check => unreachable!("Check handled above"),
        Commands::Config { .. } => unreachable!("Config handled above"),
    };

    if let Err(e) = &result {
        error!("Command failed: {}", e);
    }
    result
}
