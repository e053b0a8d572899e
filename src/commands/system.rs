//! System command implementation.
//!
//! Prints every /proc/meminfo counter.

use tracing::debug;

use super::{build_inspector, print_json};
use crate::config::Config;

/// Prints the full meminfo table.
pub fn command_system(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let inspector = build_inspector(config);
    let report = inspector.system()?;
    debug!("Read {} meminfo counters", report.meminfo.len());
    print_json(&report, config.pretty())
}
