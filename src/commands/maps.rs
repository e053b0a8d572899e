//! Maps command implementation.
//!
//! Prints the raw virtual memory map of the inspected process.

use super::{build_inspector, print_json};
use crate::config::Config;

pub fn command_maps(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let report = build_inspector(config).maps();
    print_json(&report, config.pretty())
}
