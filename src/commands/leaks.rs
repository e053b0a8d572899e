//! Leaks command implementation.
//!
//! Makes two tracked allocations (400 and 800 bytes) from this file, frees
//! the first and reports what is still outstanding. The report is
//! site-based: it lists allocations not yet freed, not unreachable ones.

use tracing::info;

use herakles_vm_dashboard::track_alloc;

use super::{build_inspector, print_json};
use crate::config::Config;

pub fn command_leaks(file: Option<String>, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let inspector = build_inspector(config);
    let ledger = inspector.ledger();

    let first = track_alloc!(ledger, 400).ok_or("tracked allocation of 400 bytes failed")?;
    let second = track_alloc!(ledger, 800).ok_or("tracked allocation of 800 bytes failed")?;
    ledger.free(first);

    let filter = file.unwrap_or_else(|| file!().to_string());
    let report = inspector.leak_report(&filter);
    info!(
        "{} outstanding allocations ({} bytes) from {}",
        report.leak_count, report.total_leaked, filter
    );
    print_json(&report, config.pretty())?;

    ledger.free(second);
    Ok(())
}
