//! CLI command implementations for herakles-vm-dashboard.
//!
//! This module provides implementations for all CLI subcommands:
//! - `system`: Raw /proc/meminfo counters
//! - `maps`: Raw virtual memory map
//! - `leaks`: Site-based leak attribution demonstration
//! - `stats`: Memory statistics
//! - `page_table`: Sampled page-table entries
//! - `hierarchy`: Classified memory regions
//! - `snapshot`: Every view in one document
//! - `stress`: Tracked allocation workload
//! - `check`: Runtime requirement validation
//! - `config`: Configuration file generation

pub mod check;
pub mod config;
pub mod hierarchy;
pub mod leaks;
pub mod maps;
pub mod page_table;
pub mod snapshot;
pub mod stats;
pub mod stress;
pub mod system;

use serde::Serialize;

use herakles_vm_dashboard::system::PAGE_SIZE;
use herakles_vm_dashboard::{Inspector, PageTableWalker};

use crate::config::Config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use hierarchy::command_hierarchy;
pub use leaks::command_leaks;
pub use maps::command_maps;
pub use page_table::command_page_table;
pub use snapshot::command_snapshot;
pub use stats::command_stats;
pub use stress::command_stress;
pub use system::command_system;

/// Builds the inspection context described by the effective config.
pub fn build_inspector(config: &Config) -> Inspector {
    let walker = PageTableWalker::new(*PAGE_SIZE)
        .with_stride(config.stride())
        .with_capacity(config.capacity());
    Inspector::new(config.process_paths(), walker)
}

/// Serializes `value` as JSON and writes it to stdout.
pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
