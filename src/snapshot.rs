//! Inspection context and the combined dashboard snapshot.
//!
//! [`Inspector`] owns everything one inspection session needs: the process
//! paths, the page-table walker, the allocation ledger and the analytics
//! engine (which share one usage tracker). Each method produces a fresh,
//! owned result; nothing is cached between calls.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::analytics::AnalyticsEngine;
use crate::error::Result;
use crate::ledger::{AllocationLedger, LeakReport};
use crate::model::{MemoryRegion, MemorySnapshot, PageTableEntry};
use crate::process::classifier::{analyze_hierarchy, summarize, RegionSummary};
use crate::process::maps::read_maps;
use crate::process::{PageTableWalker, ProcessPaths};
use crate::report::{
    HierarchyReport, MapsReport, PageTableEntryView, PageTableReport, RegionView, StatsReport,
    SystemReport,
};
use crate::system::{read_meminfo_table, CounterSource, ProcCounters, PAGE_SIZE};
use crate::usage::UsageTracker;

/// Counts over one page-table sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageTableSummary {
    pub sampled: usize,
    pub present: usize,
    pub swapped: usize,
    pub file_backed: usize,
    pub dirty: usize,
}

impl PageTableSummary {
    pub fn from_entries(entries: &[PageTableEntry]) -> Self {
        entries.iter().fold(
            PageTableSummary {
                sampled: entries.len(),
                ..Default::default()
            },
            |mut acc, e| {
                acc.present += e.is_present as usize;
                acc.swapped += e.is_swapped as usize;
                acc.file_backed += e.is_file_page as usize;
                acc.dirty += e.is_dirty as usize;
                acc
            },
        )
    }
}

/// Every view of one inspection pass. Composition only.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub captured_at: DateTime<Utc>,
    pub stats: StatsReport,
    pub memory: MemorySnapshot,
    pub page_table: Vec<PageTableEntryView>,
    pub page_table_summary: PageTableSummary,
    pub memory_regions: Vec<RegionView>,
    pub region_summary: Vec<RegionSummary>,
    pub leaks: LeakReport,
}

/// Inspection context for one process.
pub struct Inspector<S: CounterSource = ProcCounters> {
    paths: ProcessPaths,
    walker: PageTableWalker,
    ledger: Arc<AllocationLedger>,
    analytics: AnalyticsEngine<S>,
}

impl Inspector<ProcCounters> {
    /// Inspector over the given /proc tree, reading meminfo from the same root.
    /// Fault counters follow the inspected process: `getrusage` for `self`,
    /// `<root>/<pid>/stat` otherwise.
    pub fn new(paths: ProcessPaths, walker: PageTableWalker) -> Self {
        let mut source = ProcCounters::new(paths.root());
        if paths.pid().is_some() {
            source = source.with_stat_faults(paths.stat());
        }
        Self::with_source(paths, walker, source)
    }

    /// Inspector for the calling process with default settings.
    pub fn for_self() -> Self {
        Self::new(ProcessPaths::default(), PageTableWalker::new(*PAGE_SIZE))
    }
}

impl<S: CounterSource> Inspector<S> {
    pub fn with_source(paths: ProcessPaths, walker: PageTableWalker, source: S) -> Self {
        let usage = Arc::new(UsageTracker::new());
        let ledger = Arc::new(AllocationLedger::new(Arc::clone(&usage)));
        let analytics = AnalyticsEngine::new(source, usage);
        Self {
            paths,
            walker,
            ledger,
            analytics,
        }
    }

    pub fn paths(&self) -> &ProcessPaths {
        &self.paths
    }

    pub fn walker(&self) -> &PageTableWalker {
        &self.walker
    }

    pub fn ledger(&self) -> &Arc<AllocationLedger> {
        &self.ledger
    }

    pub fn analytics(&self) -> &AnalyticsEngine<S> {
        &self.analytics
    }

    /// Samples system counters and advances the fault-rate window.
    pub fn sample(&self) -> MemorySnapshot {
        self.analytics.sample()
    }

    pub fn stats(&self) -> StatsReport {
        StatsReport::from(&self.sample())
    }

    pub fn regions(&self) -> Vec<MemoryRegion> {
        analyze_hierarchy(&self.paths.maps(), self.walker.page_size)
    }

    pub fn hierarchy(&self) -> HierarchyReport {
        HierarchyReport::new(&self.regions())
    }

    pub fn page_entries(&self) -> Vec<PageTableEntry> {
        self.walker
            .walk_process(&self.paths.maps(), &self.paths.pagemap())
    }

    pub fn page_table(&self) -> PageTableReport {
        PageTableReport::new(&self.page_entries())
    }

    /// Raw memory map; empty when the source cannot be read.
    pub fn maps(&self) -> MapsReport {
        match read_maps(&self.paths.maps()) {
            Ok(entries) => MapsReport::new(&entries),
            Err(e) => {
                warn!("Memory map unavailable: {}", e);
                MapsReport::new(&[])
            }
        }
    }

    /// Full meminfo table.
    pub fn system(&self) -> Result<SystemReport> {
        Ok(SystemReport {
            meminfo: read_meminfo_table(&self.paths.meminfo())?,
        })
    }

    /// Outstanding tracked allocations from `file`.
    pub fn leak_report(&self, file: &str) -> LeakReport {
        self.ledger.report_by_file(file)
    }

    /// Runs every analysis once and bundles the results.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let memory = self.sample();
        let entries = self.page_entries();
        let regions = self.regions();
        debug!(
            "Dashboard snapshot: {} page samples, {} regions",
            entries.len(),
            regions.len()
        );

        DashboardSnapshot {
            captured_at: memory.captured_at,
            stats: StatsReport::from(&memory),
            page_table_summary: PageTableSummary::from_entries(&entries),
            page_table: entries.iter().map(PageTableEntryView::from).collect(),
            region_summary: summarize(&regions),
            memory_regions: regions.iter().map(RegionView::from).collect(),
            leaks: self.ledger.report_all(),
            memory,
        }
    }
}
