//! Herakles VM Dashboard Library
//!
//! Introspection of a running process's virtual memory on Linux. The library
//! reads OS-exposed memory state (`/proc/meminfo`, `/proc/<pid>/maps`,
//! `/proc/<pid>/pagemap`, `sysinfo(2)`, `getrusage(2)`), turns it into typed
//! entities and derives analytics from it.
//!
//! # Features
//!
//! - **Memory analytics**: fragmentation index, weighted memory pressure,
//!   swap usage and a windowed page-fault rate
//! - **Region hierarchy**: every mapping classified as heap, stack, code,
//!   shared or data
//! - **Page-table sampling**: virtual-to-physical mappings with per-page flags
//! - **Allocation ledger**: tracked allocations with site-based leak
//!   attribution and current/peak usage
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_vm_dashboard::{track_alloc, Inspector};
//!
//! let inspector = Inspector::for_self();
//!
//! let addr = track_alloc!(inspector.ledger(), 4096).unwrap();
//! let stats = inspector.stats();
//! println!("pressure: {}", stats.pressure_score);
//!
//! let report = inspector.leak_report(file!());
//! println!("{} outstanding allocations", report.leak_count);
//!
//! inspector.ledger().free(addr);
//! ```

pub mod analytics;
pub mod error;
pub mod ledger;
pub mod model;
pub mod process;
pub mod report;
pub mod snapshot;
pub mod system;
pub mod usage;

// Re-export main types for convenience
pub use analytics::AnalyticsEngine;
pub use error::{InspectError, Result};
pub use ledger::{AllocationLedger, LeakReport};
pub use model::{
    Address, AllocationRecord, AllocationSite, MemoryRegion, MemorySnapshot, PageTableEntry,
    Permissions, RegionKind,
};
pub use process::{PageTableWalker, ProcessPaths};
pub use report::{HierarchyReport, PageTableReport, StatsReport};
pub use snapshot::{DashboardSnapshot, Inspector};
pub use system::{CounterSource, ProcCounters};
pub use usage::{UsageSnapshot, UsageTracker};
