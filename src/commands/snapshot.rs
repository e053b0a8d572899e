//! Snapshot command implementation.
//!
//! Prints statistics, page table, region hierarchy and outstanding tracked
//! allocations as one document.

use super::{build_inspector, print_json};
use crate::config::Config;

pub fn command_snapshot(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = build_inspector(config).snapshot();
    print_json(&snapshot, config.pretty())
}
