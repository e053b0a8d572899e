//! Per-process virtual memory sources.
//!
//! This module provides:
//! - `maps`: Parsing of /proc/<pid>/maps
//! - `classifier`: Region classification for the memory hierarchy
//! - `pagemap`: Sampled virtual-to-physical mappings from /proc/<pid>/pagemap

pub mod classifier;
pub mod maps;
pub mod pagemap;

use std::path::{Path, PathBuf};

// Re-export commonly used types
pub use classifier::{analyze_hierarchy, classify, classify_regions, summarize, RegionSummary};
pub use maps::{parse_maps, parse_maps_line, read_maps, MapsEntry};
pub use pagemap::{
    PageTableWalker, PagemapRecord, DEFAULT_CAPACITY, DEFAULT_STRIDE_PAGES, PAGEMAP_ENTRY_SIZE,
};

/// Locates the /proc files of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPaths {
    root: PathBuf,
    pid: Option<u32>,
}

impl ProcessPaths {
    /// `pid = None` addresses the calling process through `self`.
    pub fn new(proc_root: impl Into<PathBuf>, pid: Option<u32>) -> Self {
        Self {
            root: proc_root.into(),
            pid,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn process_dir(&self) -> PathBuf {
        match self.pid {
            Some(pid) => self.root.join(pid.to_string()),
            None => self.root.join("self"),
        }
    }

    pub fn maps(&self) -> PathBuf {
        self.process_dir().join("maps")
    }

    pub fn pagemap(&self) -> PathBuf {
        self.process_dir().join("pagemap")
    }

    pub fn stat(&self) -> PathBuf {
        self.process_dir().join("stat")
    }

    pub fn meminfo(&self) -> PathBuf {
        self.root.join("meminfo")
    }
}

impl Default for ProcessPaths {
    fn default() -> Self {
        Self::new("/proc", None)
    }
}
