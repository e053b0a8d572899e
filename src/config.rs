//! Configuration management for herakles-vm-dashboard.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use herakles_vm_dashboard::process::{DEFAULT_CAPACITY, DEFAULT_STRIDE_PAGES};
use herakles_vm_dashboard::ProcessPaths;

// Default configuration constants
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Workload settings for the `stress` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressConfig {
    /// Concurrent workers in random mode (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Allocations per worker in random mode (default: 1000)
    #[serde(default = "default_allocations_per_worker")]
    pub allocations_per_worker: usize,

    /// Smallest random allocation in bytes (default: 64)
    #[serde(default = "default_min_size_bytes")]
    pub min_size_bytes: usize,

    /// Largest random allocation in bytes (default: 65536)
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: usize,

    /// Probability that a worker frees an allocation right away (default: 0.9)
    #[serde(default = "default_free_ratio")]
    pub free_ratio: f64,

    /// Chunk size in MB in chunked mode (default: 50)
    #[serde(default = "default_chunk_mb")]
    pub chunk_mb: usize,

    /// Total MB allocated in chunked mode before stopping (default: 500)
    #[serde(default = "default_cap_mb")]
    pub cap_mb: usize,

    /// Delay between chunks in milliseconds (default: 1000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_workers() -> usize {
    4
}
fn default_allocations_per_worker() -> usize {
    1000
}
fn default_min_size_bytes() -> usize {
    64
}
fn default_max_size_bytes() -> usize {
    64 * 1024
}
fn default_free_ratio() -> f64 {
    0.9
}
fn default_chunk_mb() -> usize {
    50
}
fn default_cap_mb() -> usize {
    500
}
fn default_interval_ms() -> u64 {
    1000
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            allocations_per_worker: default_allocations_per_worker(),
            min_size_bytes: default_min_size_bytes(),
            max_size_bytes: default_max_size_bytes(),
            free_ratio: default_free_ratio(),
            chunk_mb: default_chunk_mb(),
            cap_mb: default_cap_mb(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data sources
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    /// Process to inspect; None inspects the dashboard itself
    pub pid: Option<u32>,

    // Page-table sampling
    #[serde(alias = "page-sample-stride")]
    pub page_sample_stride: Option<u64>,
    #[serde(alias = "page-table-capacity")]
    pub page_table_capacity: Option<usize>,

    // Output
    #[serde(alias = "pretty-json")]
    pub pretty_json: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // Stress workload
    #[serde(default)]
    pub stress: StressConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            pid: None,
            page_sample_stride: Some(DEFAULT_STRIDE_PAGES),
            page_table_capacity: Some(DEFAULT_CAPACITY),
            pretty_json: Some(true),
            log_level: Some("warn".into()),
            stress: StressConfig::default(),
        }
    }
}

impl Config {
    pub fn process_paths(&self) -> ProcessPaths {
        let root = self
            .proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT));
        ProcessPaths::new(root, self.pid)
    }

    pub fn stride(&self) -> u64 {
        self.page_sample_stride.unwrap_or(DEFAULT_STRIDE_PAGES)
    }

    pub fn capacity(&self) -> usize {
        self.page_table_capacity.unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn pretty(&self) -> bool {
        self.pretty_json.unwrap_or(true)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.page_sample_stride == Some(0) {
        return Err("page_sample_stride must be at least 1".into());
    }
    if cfg.page_table_capacity == Some(0) {
        return Err("page_table_capacity must be at least 1".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        match level {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(format!(
                    "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                    other
                )
                .into());
            }
        }
    }

    // Stress workload validation
    let stress = &cfg.stress;
    if stress.workers == 0 {
        return Err("stress.workers must be at least 1".into());
    }
    if stress.min_size_bytes > stress.max_size_bytes {
        return Err(format!(
            "stress.min_size_bytes ({}) exceeds stress.max_size_bytes ({})",
            stress.min_size_bytes, stress.max_size_bytes
        )
        .into());
    }
    if !(0.0..=1.0).contains(&stress.free_ratio) {
        return Err(format!(
            "stress.free_ratio must be between 0 and 1, got {}",
            stress.free_ratio
        )
        .into());
    }
    if stress.chunk_mb == 0 {
        return Err("stress.chunk_mb must be at least 1".into());
    }
    if stress.cap_mb < stress.chunk_mb {
        return Err(format!(
            "stress.cap_mb ({}) is smaller than stress.chunk_mb ({})",
            stress.cap_mb, stress.chunk_mb
        )
        .into());
    }

    if let Some(root) = cfg.proc_root.as_deref() {
        if !root.is_dir() {
            return Err(format!("proc_root is not a directory: {}", root.display()).into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if args.pid.is_some() {
        config.pid = args.pid;
    }
    if let Some(stride) = args.page_sample_stride {
        config.page_sample_stride = Some(stride);
    }
    if let Some(capacity) = args.page_table_capacity {
        config.page_table_capacity = Some(capacity);
    }
    if args.compact {
        config.pretty_json = Some(false);
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/vm-dashboard.yaml",
            "/etc/herakles/vm-dashboard.yml",
            "/etc/herakles/vm-dashboard.json",
            "./herakles-vm-dashboard.yaml",
            "./herakles-vm-dashboard.yml",
            "./herakles-vm-dashboard.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
