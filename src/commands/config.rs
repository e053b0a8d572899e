//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-vm-dashboard.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles VM Dashboard Configuration
# ===================================
#
# Data Sources
# ------------
# proc_root: "/proc"           # Root of the proc filesystem
# pid: null                    # Process to inspect (null = the dashboard itself)
#
# Page-Table Sampling
# -------------------
# page_sample_stride: 10       # Sample every N-th page of each region
# page_table_capacity: 1000    # Maximum entries per walk
#
# Output
# ------
# pretty_json: true            # Indented JSON output
#
# Logging
# -------
# log_level: "warn"            # off, error, warn, info, debug, trace (stderr)
#
# Stress Workload
# ---------------
# stress:
#   workers: 4                 # Concurrent workers (random mode)
#   allocations_per_worker: 1000
#   min_size_bytes: 64         # Random allocation size range
#   max_size_bytes: 65536
#   free_ratio: 0.9            # Probability of freeing right away
#   chunk_mb: 50               # Chunk size (chunked mode)
#   cap_mb: 500                # Stop after this many MB (chunked mode)
#   interval_ms: 1000          # Delay between chunks
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_config_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dash.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Herakles VM Dashboard Configuration"));

        let loaded = crate::config::load_config(path.to_str()).unwrap();
        assert_eq!(loaded.stride(), 10);
        assert_eq!(loaded.stress.cap_mb, 500);
    }
}
