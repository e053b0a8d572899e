//! Core entity definitions shared by the classifier, walker, analytics
//! engine and allocation ledger.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::num::NonZeroUsize;

/// Page-table level reported for sampled entries. Only the leaf level is
/// visible through pagemap, so every entry carries this value.
pub const LEAF_LEVEL: u8 = 4;

/// Classification tag of a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Heap,
    Stack,
    Code,
    Shared,
    Data,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Heap => "heap",
            RegionKind::Stack => "stack",
            RegionKind::Code => "code",
            RegionKind::Shared => "shared",
            RegionKind::Data => "data",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission bitmask: read=4, write=2, execute=1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u8);

impl Permissions {
    pub const READ: u8 = 4;
    pub const WRITE: u8 = 2;
    pub const EXECUTE: u8 = 1;

    /// Builds the bitmask from a maps permission string such as `r-xp`.
    /// Only the first three characters are considered.
    pub fn from_perms_str(perms: &str) -> Self {
        let mut bits = 0;
        for c in perms.chars().take(3) {
            match c {
                'r' => bits |= Self::READ,
                'w' => bits |= Self::WRITE,
                'x' => bits |= Self::EXECUTE,
                _ => {}
            }
        }
        Permissions(bits)
    }

    pub fn from_bits(bits: u8) -> Self {
        Permissions(bits & 0b111)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn readable(&self) -> bool {
        self.0 & Self::READ != 0
    }

    pub fn writable(&self) -> bool {
        self.0 & Self::WRITE != 0
    }

    pub fn executable(&self) -> bool {
        self.0 & Self::EXECUTE != 0
    }

    /// Three-character `rwx` rendering with `-` for absent bits.
    pub fn to_rwx(&self) -> String {
        let mut s = String::with_capacity(3);
        s.push(if self.readable() { 'r' } else { '-' });
        s.push(if self.writable() { 'w' } else { '-' });
        s.push(if self.executable() { 'x' } else { '-' });
        s
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rwx())
    }
}

/// One contiguous virtual address range from the process memory map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start_addr: u64,
    pub end_addr: u64,
    pub permissions: Permissions,
    /// Mapping is `s` (shared) rather than `p` (private).
    pub shared: bool,
    pub page_size: u64,
    pub kind: RegionKind,
    /// Backing file path; empty for anonymous mappings.
    pub mapped_file: String,
}

impl MemoryRegion {
    pub fn size(&self) -> u64 {
        self.end_addr - self.start_addr
    }

    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.size().div_ceil(self.page_size)
    }
}

/// One sampled virtual page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub virtual_addr: u64,
    /// Physical address of the frame; `None` whenever the page is not present.
    pub physical_addr: Option<u64>,
    pub page_size: u64,
    pub is_present: bool,
    pub is_writable: bool,
    pub is_executable: bool,
    pub is_cached: bool,
    pub is_dirty: bool,
    pub is_swapped: bool,
    pub is_file_page: bool,
    pub level: u8,
}

/// Opaque, non-null identity of a tracked allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(NonZeroUsize);

impl Address {
    pub fn new(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Address)
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Originating call site of a tracked allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AllocationSite {
    pub file: String,
    pub line: u32,
}

impl AllocationSite {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for AllocationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One outstanding tracked allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    pub address: Address,
    pub size: usize,
    pub site: AllocationSite,
    /// Monotonic allocation order within one ledger.
    pub sequence: u64,
    pub allocated_at: DateTime<Utc>,
}

/// Derived memory metrics at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub total_memory: u64,
    /// MemAvailable in bytes.
    pub free_memory: u64,
    /// total - available, in bytes.
    pub memory_usage: u64,
    pub cached_memory: u64,
    pub buffers_memory: u64,
    pub fragmentation_index: f64,
    pub pressure_score: f64,
    pub swap_usage_percent: u32,
    pub major_faults: u64,
    pub minor_faults: u64,
    pub fault_rate: f64,
    pub elapsed_seconds: f64,
    /// Bytes currently held by the allocation ledger.
    pub tracked_usage: u64,
    pub peak_usage: u64,
    pub captured_at: DateTime<Utc>,
}
