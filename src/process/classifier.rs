//! Region classification for the memory hierarchy view.
//!
//! Each maps entry is tagged `heap`, `stack`, `code`, `shared` or `data`.
//! Rules are evaluated in that order and the first match wins, so a heap
//! mapping stays `heap` even when it is executable.

use ahash::AHashMap as HashMap;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

use crate::model::{MemoryRegion, RegionKind};
use crate::process::maps::{parse_maps, read_maps_text, MapsEntry};

const HEAP_MARKER: &str = "[heap]";
const STACK_MARKER: &str = "[stack]";
/// Per-thread stacks on older kernels: `[stack:<tid>]`.
const THREAD_STACK_PREFIX: &str = "[stack:";

fn is_heap(path: &str) -> bool {
    path == HEAP_MARKER
}

fn is_stack(path: &str) -> bool {
    path == STACK_MARKER || path.starts_with(THREAD_STACK_PREFIX)
}

/// Classifies a maps entry.
pub fn classify(entry: &MapsEntry) -> RegionKind {
    let path = entry.pathname.as_str();
    if is_heap(path) {
        RegionKind::Heap
    } else if is_stack(path) {
        RegionKind::Stack
    } else if entry.permissions().executable() {
        RegionKind::Code
    } else if !path.is_empty() {
        RegionKind::Shared
    } else {
        RegionKind::Data
    }
}

/// Builds a typed region from a maps entry. The path is copied.
pub fn to_region(entry: &MapsEntry, page_size: u64) -> MemoryRegion {
    MemoryRegion {
        start_addr: entry.start,
        end_addr: entry.end,
        permissions: entry.permissions(),
        shared: entry.is_shared(),
        page_size,
        kind: classify(entry),
        mapped_file: entry.pathname.clone(),
    }
}

/// Classifies every valid line of a memory map, preserving map order.
pub fn classify_regions(maps_content: &str, page_size: u64) -> Vec<MemoryRegion> {
    parse_maps(maps_content)
        .iter()
        .map(|e| to_region(e, page_size))
        .collect()
}

/// Reads a maps file and classifies it. An unreadable source yields an
/// empty hierarchy.
pub fn analyze_hierarchy(maps_path: &Path, page_size: u64) -> Vec<MemoryRegion> {
    match read_maps_text(maps_path) {
        Ok(content) => {
            let regions = classify_regions(&content, page_size);
            debug!(
                "Classified {} regions from {}",
                regions.len(),
                maps_path.display()
            );
            regions
        }
        Err(e) => {
            warn!("Memory hierarchy unavailable: {}", e);
            Vec::new()
        }
    }
}

/// Per-kind totals over a region list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    #[serde(rename = "type")]
    pub kind: RegionKind,
    pub count: usize,
    pub total_bytes: u64,
}

/// Aggregates regions by kind, in heap/stack/code/shared/data order.
pub fn summarize(regions: &[MemoryRegion]) -> Vec<RegionSummary> {
    let mut totals: HashMap<RegionKind, (usize, u64)> = HashMap::new();
    for r in regions {
        let slot = totals.entry(r.kind).or_default();
        slot.0 += 1;
        slot.1 += r.size();
    }

    [
        RegionKind::Heap,
        RegionKind::Stack,
        RegionKind::Code,
        RegionKind::Shared,
        RegionKind::Data,
    ]
    .into_iter()
    .filter_map(|kind| {
        totals.get(&kind).map(|&(count, total_bytes)| RegionSummary {
            kind,
            count,
            total_bytes,
        })
    })
    .collect()
}
