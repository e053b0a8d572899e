//! Page-table command implementation.
//!
//! Prints sampled virtual-to-physical mappings. Physical addresses read as
//! zero unless the dashboard runs with CAP_SYS_ADMIN.

use tracing::info;

use super::{build_inspector, print_json};
use crate::config::Config;

pub fn command_page_table(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let inspector = build_inspector(config);
    let report = inspector.page_table();
    info!(
        "Sampled {} pages (stride {}, capacity {})",
        report.page_table.len(),
        inspector.walker().stride_pages,
        inspector.walker().capacity
    );
    print_json(&report, config.pretty())
}
