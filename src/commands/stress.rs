//! Stress command implementation.
//!
//! Two workloads, both going through the allocation ledger:
//! - random: rayon workers make tracked allocations of random size and free
//!   most of them right away, leaving the rest outstanding;
//! - chunked: one fixed-size chunk every interval until the cap is reached,
//!   sampling statistics after each step, then everything is released.

use anyhow::{Context, Result};
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use herakles_vm_dashboard::{track_alloc, AllocationLedger, Inspector, StatsReport};

use super::build_inspector;
use crate::config::{Config, StressConfig};

/// Per-worker counts, summed across workers.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WorkerTally {
    pub allocations: usize,
    pub frees: usize,
    pub failures: usize,
    pub bytes_allocated: u64,
}

impl WorkerTally {
    fn merge(self, other: Self) -> Self {
        Self {
            allocations: self.allocations + other.allocations,
            frees: self.frees + other.frees,
            failures: self.failures + other.failures,
            bytes_allocated: self.bytes_allocated + other.bytes_allocated,
        }
    }
}

#[derive(Debug, Serialize)]
struct RandomStressReport {
    mode: &'static str,
    workers: usize,
    duration_ms: u128,
    tally: WorkerTally,
    outstanding_count: usize,
    outstanding_bytes: u64,
    tracked_usage: u64,
    peak_usage: u64,
    stats: StatsReport,
}

#[derive(Debug, Serialize)]
struct ChunkStep {
    step: usize,
    allocated_mb: usize,
    stats: StatsReport,
}

#[derive(Debug, Serialize)]
struct ChunkedStressReport {
    mode: &'static str,
    chunk_mb: usize,
    cap_mb: usize,
    steps: Vec<ChunkStep>,
    peak_usage: u64,
    released: bool,
}

/// One worker's share of the random workload.
pub fn run_worker(ledger: &AllocationLedger, cfg: &StressConfig) -> WorkerTally {
    let mut rng = rand::thread_rng();
    let mut tally = WorkerTally::default();

    for _ in 0..cfg.allocations_per_worker {
        let size = rng.gen_range(cfg.min_size_bytes..=cfg.max_size_bytes);
        let Some(addr) = track_alloc!(ledger, size) else {
            tally.failures += 1;
            continue;
        };
        tally.allocations += 1;
        tally.bytes_allocated += size as u64;

        // Touch the buffer so its pages are actually faulted in
        ledger.with_buffer_mut(addr, |buf| buf.iter_mut().step_by(4096).for_each(|b| *b = 0xA5));

        if rng.gen_bool(cfg.free_ratio) {
            ledger.free(addr);
            tally.frees += 1;
        }
    }

    tally
}

/// Runs the random workload on `cfg.workers` threads.
pub fn run_random(ledger: &AllocationLedger, cfg: &StressConfig) -> Result<WorkerTally> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.workers)
        .build()
        .context("Failed to build stress worker pool")?;

    Ok(pool.install(|| {
        (0..cfg.workers)
            .into_par_iter()
            .map(|worker| {
                let tally = run_worker(ledger, cfg);
                debug!("Worker {} finished: {:?}", worker, tally);
                tally
            })
            .reduce(WorkerTally::default, WorkerTally::merge)
    }))
}

pub fn command_stress(
    chunked: bool,
    workers: Option<usize>,
    allocations: Option<usize>,
    chunk_mb: Option<usize>,
    cap_mb: Option<usize>,
    config: &Config,
) -> Result<()> {
    let mut cfg = config.stress.clone();
    if let Some(n) = workers {
        cfg.workers = n.max(1);
    }
    if let Some(n) = allocations {
        cfg.allocations_per_worker = n;
    }
    if let Some(n) = chunk_mb {
        cfg.chunk_mb = n.max(1);
    }
    if let Some(n) = cap_mb {
        cfg.cap_mb = n;
    }

    let inspector = build_inspector(config);
    let output = if chunked {
        let report = run_chunked(&inspector, &cfg);
        render(&report, config.pretty())?
    } else {
        let started = Instant::now();
        let ledger = inspector.ledger();
        let tally = run_random(ledger, &cfg)?;
        let snapshot = inspector.sample();
        info!(
            "Random stress finished: {} allocations, {} frees, {} failures",
            tally.allocations, tally.frees, tally.failures
        );

        let report = RandomStressReport {
            mode: "random",
            workers: cfg.workers,
            duration_ms: started.elapsed().as_millis(),
            tally,
            outstanding_count: ledger.live_count(),
            outstanding_bytes: ledger.live_bytes(),
            tracked_usage: snapshot.tracked_usage,
            peak_usage: snapshot.peak_usage,
            stats: StatsReport::from(&snapshot),
        };
        render(&report, config.pretty())?
    };

    println!("{output}");
    Ok(())
}

fn run_chunked(inspector: &Inspector, cfg: &StressConfig) -> ChunkedStressReport {
    let ledger = inspector.ledger();
    let chunk_bytes = cfg.chunk_mb.saturating_mul(1024 * 1024);
    let max_chunks = cfg.cap_mb / cfg.chunk_mb.max(1);
    let mut chunks = Vec::with_capacity(max_chunks);
    let mut steps = Vec::with_capacity(max_chunks);

    for step in 1..=max_chunks {
        match track_alloc!(ledger, chunk_bytes) {
            Some(addr) => chunks.push(addr),
            None => {
                warn!("Memory allocation limit reached after {} chunks", chunks.len());
                break;
            }
        }
        let allocated_mb = chunks.len() * cfg.chunk_mb;
        info!("Allocated: {}MB", allocated_mb);
        steps.push(ChunkStep {
            step,
            allocated_mb,
            stats: inspector.stats(),
        });

        if step < max_chunks {
            thread::sleep(Duration::from_millis(cfg.interval_ms));
        }
    }

    let peak_usage = ledger.usage().peak();
    for addr in chunks {
        ledger.free(addr);
    }

    ChunkedStressReport {
        mode: "chunked",
        chunk_mb: cfg.chunk_mb,
        cap_mb: cfg.cap_mb,
        steps,
        peak_usage,
        released: ledger.live_count() == 0,
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.context("Failed to serialize stress report")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(free_ratio: f64) -> StressConfig {
        StressConfig {
            workers: 4,
            allocations_per_worker: 50,
            min_size_bytes: 1,
            max_size_bytes: 256,
            free_ratio,
            ..StressConfig::default()
        }
    }

    #[test]
    fn test_random_workload_keeps_ledger_consistent() {
        let ledger = AllocationLedger::default();
        let tally = run_random(&ledger, &small_config(0.5)).unwrap();

        assert_eq!(tally.allocations + tally.failures, 200);
        assert_eq!(ledger.live_count(), tally.allocations - tally.frees);
        assert_eq!(ledger.live_bytes(), ledger.usage().current());
        assert!(ledger.usage().peak() >= ledger.usage().current());
    }

    #[test]
    fn test_free_ratio_one_leaves_nothing() {
        let ledger = AllocationLedger::default();
        let tally = run_random(&ledger, &small_config(1.0)).unwrap();
        assert_eq!(tally.frees, tally.allocations);
        assert_eq!(ledger.live_count(), 0);
        assert_eq!(ledger.usage().current(), 0);
    }

    #[test]
    fn test_free_ratio_zero_keeps_everything() {
        let ledger = AllocationLedger::default();
        let tally = run_random(&ledger, &small_config(0.0)).unwrap();
        assert_eq!(tally.frees, 0);
        assert_eq!(ledger.live_bytes(), tally.bytes_allocated);
        // All records come from the worker's allocation site
        let site_file = ledger.records()[0].site.file.clone();
        assert_eq!(ledger.report_by_file(&site_file).leak_count, tally.allocations);
    }
}
