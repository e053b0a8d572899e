//! Serializable output views.
//!
//! Addresses are rendered as `0x`-prefixed hex strings and the fractional
//! metrics of the stats view are rounded to two decimals. Views borrow
//! nothing; they are built from owned entities and serialized once.

use serde::Serialize;

use crate::model::{MemoryRegion, MemorySnapshot, PageTableEntry, RegionKind};
use crate::process::maps::MapsEntry;
use crate::system::MemInfoField;

/// Rounds to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn hex(v: u64) -> String {
    format!("{:#x}", v)
}

/// Statistics view of a [`MemorySnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub fragmentation_index: f64,
    pub fault_rate: f64,
    pub pressure_score: f64,
    pub swap_usage_percent: u32,
    pub major_faults: u64,
    pub minor_faults: u64,
    pub memory_usage: u64,
    pub total_memory: u64,
    pub free_memory: u64,
}

impl From<&MemorySnapshot> for StatsReport {
    fn from(s: &MemorySnapshot) -> Self {
        Self {
            fragmentation_index: round2(s.fragmentation_index),
            fault_rate: round2(s.fault_rate),
            pressure_score: round2(s.pressure_score),
            swap_usage_percent: s.swap_usage_percent,
            major_faults: s.major_faults,
            minor_faults: s.minor_faults,
            memory_usage: s.memory_usage,
            total_memory: s.total_memory,
            free_memory: s.free_memory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageTableEntryView {
    pub virtual_addr: String,
    /// `"0x0"` for pages that are not present.
    pub physical_addr: String,
    pub page_size: u64,
    pub is_present: bool,
    pub is_writable: bool,
    pub is_executable: bool,
    pub is_cached: bool,
    pub is_dirty: bool,
    pub level: u8,
}

impl From<&PageTableEntry> for PageTableEntryView {
    fn from(e: &PageTableEntry) -> Self {
        Self {
            virtual_addr: hex(e.virtual_addr),
            physical_addr: hex(e.physical_addr.unwrap_or(0)),
            page_size: e.page_size,
            is_present: e.is_present,
            is_writable: e.is_writable,
            is_executable: e.is_executable,
            is_cached: e.is_cached,
            is_dirty: e.is_dirty,
            level: e.level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageTableReport {
    pub page_table: Vec<PageTableEntryView>,
}

impl PageTableReport {
    pub fn new(entries: &[PageTableEntry]) -> Self {
        Self {
            page_table: entries.iter().map(PageTableEntryView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionView {
    #[serde(rename = "type")]
    pub kind: RegionKind,
    pub start_addr: String,
    pub end_addr: String,
    pub size: u64,
    pub permissions: String,
    pub mapped_file: String,
}

impl From<&MemoryRegion> for RegionView {
    fn from(r: &MemoryRegion) -> Self {
        Self {
            kind: r.kind,
            start_addr: hex(r.start_addr),
            end_addr: hex(r.end_addr),
            size: r.size(),
            permissions: r.permissions.to_rwx(),
            mapped_file: r.mapped_file.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyReport {
    pub memory_regions: Vec<RegionView>,
}

impl HierarchyReport {
    pub fn new(regions: &[MemoryRegion]) -> Self {
        Self {
            memory_regions: regions.iter().map(RegionView::from).collect(),
        }
    }
}

/// Raw view of one maps line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingView {
    pub start_addr: String,
    pub end_addr: String,
    pub size: u64,
    pub perms: String,
    pub offset: String,
    pub dev: String,
    pub inode: u64,
    pub pathname: String,
}

impl From<&MapsEntry> for MappingView {
    fn from(e: &MapsEntry) -> Self {
        Self {
            start_addr: hex(e.start),
            end_addr: hex(e.end),
            size: e.size(),
            perms: e.perms.clone(),
            offset: hex(e.offset),
            dev: e.dev.clone(),
            inode: e.inode,
            pathname: e.pathname.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapsReport {
    pub mapping_count: usize,
    pub total_size: u64,
    pub mappings: Vec<MappingView>,
}

impl MapsReport {
    pub fn new(entries: &[MapsEntry]) -> Self {
        Self {
            mapping_count: entries.len(),
            total_size: entries.iter().map(MapsEntry::size).sum(),
            mappings: entries.iter().map(MappingView::from).collect(),
        }
    }
}

/// Full /proc/meminfo table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemReport {
    pub meminfo: Vec<MemInfoField>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Permissions, LEAF_LEVEL};
    use chrono::Utc;

    fn snapshot() -> MemorySnapshot {
        MemorySnapshot {
            total_memory: 1_000_000,
            free_memory: 250_000,
            memory_usage: 750_000,
            cached_memory: 0,
            buffers_memory: 0,
            fragmentation_index: 0.7512,
            pressure_score: 0.52584,
            swap_usage_percent: 0,
            major_faults: 1,
            minor_faults: 99,
            fault_rate: 123.456,
            elapsed_seconds: 1.0,
            tracked_usage: 0,
            peak_usage: 0,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.7512), 0.75);
        assert_eq!(round2(0.525), 0.53);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_stats_report_json_fields() {
        let value = serde_json::to_value(StatsReport::from(&snapshot())).unwrap();
        assert_eq!(value["fragmentation_index"], 0.75);
        assert_eq!(value["pressure_score"], 0.53);
        assert_eq!(value["fault_rate"], 123.46);
        assert_eq!(value["memory_usage"], 750_000);
        assert_eq!(value["free_memory"], 250_000);
        assert_eq!(value.as_object().unwrap().len(), 9);
    }

    #[test]
    fn test_page_table_view_hex_and_absent() {
        let entry = PageTableEntry {
            virtual_addr: 0x7f00_0000_1000,
            physical_addr: None,
            page_size: 4096,
            is_present: false,
            is_writable: true,
            is_executable: false,
            is_cached: true,
            is_dirty: false,
            is_swapped: true,
            is_file_page: false,
            level: LEAF_LEVEL,
        };
        let value = serde_json::to_value(PageTableReport::new(&[entry])).unwrap();
        let row = &value["page_table"][0];
        assert_eq!(row["virtual_addr"], "0x7f0000001000");
        assert_eq!(row["physical_addr"], "0x0");
        assert_eq!(row["level"], 4);
        assert_eq!(row["is_present"], false);
    }

    #[test]
    fn test_hierarchy_view() {
        let region = MemoryRegion {
            start_addr: 0x7f00_0000_0000,
            end_addr: 0x7f00_0000_1000,
            permissions: Permissions::from_bits(6),
            shared: false,
            page_size: 4096,
            kind: RegionKind::Data,
            mapped_file: String::new(),
        };
        let value = serde_json::to_value(HierarchyReport::new(&[region])).unwrap();
        let row = &value["memory_regions"][0];
        assert_eq!(row["type"], "data");
        assert_eq!(row["start_addr"], "0x7f0000000000");
        assert_eq!(row["end_addr"], "0x7f0000001000");
        assert_eq!(row["size"], 4096);
        assert_eq!(row["permissions"], "rw-");
        assert_eq!(row["mapped_file"], "");
    }
}
