//! Hierarchy command implementation.
//!
//! Prints the memory map classified into heap, stack, code, shared and data
//! regions.

use herakles_vm_dashboard::process::summarize;

use super::{build_inspector, print_json};
use crate::config::Config;

pub fn command_hierarchy(summary: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let inspector = build_inspector(config);
    if summary {
        print_json(&summarize(&inspector.regions()), config.pretty())
    } else {
        print_json(&inspector.hierarchy(), config.pretty())
    }
}
