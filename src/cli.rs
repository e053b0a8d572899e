//! CLI arguments and subcommands for herakles-vm-dashboard.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-vm-dashboard",
    about = "Virtual memory dashboard for Linux processes",
    long_about = "Virtual memory dashboard for Linux processes.\n\n\
                  Reports system memory pressure, fragmentation and page-fault rate, samples \
                  virtual-to-physical page mappings, classifies the memory map into a region \
                  hierarchy and attributes outstanding tracked allocations to their call site. \
                  Every command writes JSON to stdout.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-vm-dashboard — More info: https://www.herakles.now — Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Inspect this process instead of the dashboard itself
    #[arg(short = 'p', long)]
    pub pid: Option<u32>,

    /// Root of the proc filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Sample every N-th page of each region
    #[arg(long)]
    pub page_sample_stride: Option<u64>,

    /// Maximum page-table entries per walk
    #[arg(long)]
    pub page_table_capacity: Option<usize>,

    /// Emit single-line JSON
    #[arg(long)]
    pub compact: bool,

    /// Log level, logs go to stderr [default: warn]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands; without one a full dashboard snapshot is printed
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every /proc/meminfo counter
    System,

    /// Print the raw virtual memory map
    Maps,

    /// Demonstrate site-based leak attribution with tracked allocations
    Leaks {
        /// Report outstanding allocations from this source file instead
        #[arg(long)]
        file: Option<String>,
    },

    /// Print memory statistics
    Stats {
        /// Number of samples to take
        #[arg(short = 'n', long, default_value_t = 1)]
        samples: usize,

        /// Delay between samples in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Print sampled page-table entries
    PageTable,

    /// Print the classified memory region hierarchy
    Hierarchy {
        /// Print per-type totals instead of individual regions
        #[arg(long)]
        summary: bool,
    },

    /// Print every view in one document
    Snapshot,

    /// Run a tracked allocation workload and report statistics
    Stress {
        /// Allocate fixed-size chunks at an interval instead of random sizes
        #[arg(long)]
        chunked: bool,

        /// Worker threads (override config)
        #[arg(long)]
        workers: Option<usize>,

        /// Allocations per worker (override config)
        #[arg(long)]
        allocations: Option<usize>,

        /// Chunk size in MB for --chunked (override config)
        #[arg(long)]
        chunk_mb: Option<usize>,

        /// Upper bound in MB for --chunked (override config)
        #[arg(long)]
        cap_mb: Option<usize>,
    },

    /// Check runtime requirements and permissions
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
