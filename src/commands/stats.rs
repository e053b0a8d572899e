//! Stats command implementation.
//!
//! Samples memory analytics one or more times. The first sample's fault
//! rate covers the time since the engine was created; later samples cover
//! the interval between samples.

use std::thread;
use std::time::Duration;
use tracing::debug;

use herakles_vm_dashboard::StatsReport;

use super::{build_inspector, print_json};
use crate::config::Config;

pub fn command_stats(
    samples: usize,
    interval_ms: u64,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let inspector = build_inspector(config);
    let samples = samples.max(1);

    for i in 1..=samples {
        let snapshot = inspector.sample();
        debug!(
            "Sample {}/{}: window {:.3}s, tracked {} bytes",
            i, samples, snapshot.elapsed_seconds, snapshot.tracked_usage
        );
        print_json(&StatsReport::from(&snapshot), config.pretty())?;

        if i < samples {
            thread::sleep(Duration::from_millis(interval_ms));
        }
    }

    Ok(())
}
