//! Derived memory analytics.
//!
//! The engine turns raw counters into fragmentation, pressure, swap usage and
//! a windowed page-fault rate. The fault counters and the monotonic timestamp
//! of the previous sample are kept inside the engine, so each `sample()`
//! reports activity since the one before it.
//!
//! Formulas:
//! - `fragmentation_index = 1 - available / total`
//! - `swap_used_fraction = 1 - swap_free / swap_total` (0 without swap)
//! - `pressure_score = 0.7 * fragmentation_index + 0.3 * swap_used_fraction`
//! - `fault_rate = (major_delta + minor_delta) / elapsed_seconds`
//!
//! Non-finite intermediate values become 0 and fractions are clamped to
//! [0, 1].

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, warn};

use crate::model::MemorySnapshot;
use crate::system::{CounterSource, FaultCounters, MemInfo, ProcCounters, SwapInfo};
use crate::usage::{UsageSnapshot, UsageTracker};

/// Weight of the available-memory term in the pressure score.
pub const AVAILABLE_WEIGHT: f64 = 0.7;
/// Weight of the swap term in the pressure score.
pub const SWAP_WEIGHT: f64 = 0.3;

/// Maps NaN/inf to 0 and clamps into [0, 1].
fn unit_interval(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn fragmentation_index(total: u64, available: u64) -> f64 {
    unit_interval(1.0 - available as f64 / total as f64)
}

/// Fraction of swap in use; 0 when the system has no swap.
pub fn swap_used_fraction(swap: Option<SwapInfo>) -> f64 {
    match swap {
        Some(s) if s.total_bytes > 0 => {
            unit_interval(1.0 - s.free_bytes as f64 / s.total_bytes as f64)
        }
        _ => 0.0,
    }
}

pub fn pressure_score(fragmentation: f64, swap_fraction: f64) -> f64 {
    unit_interval(AVAILABLE_WEIGHT * fragmentation + SWAP_WEIGHT * swap_fraction)
}

/// Faults per second over the window; 0 for an empty window.
pub fn fault_rate(faults: u64, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds <= 0.0 {
        return 0.0;
    }
    let rate = faults as f64 / elapsed_seconds;
    if rate.is_finite() {
        rate.max(0.0)
    } else {
        0.0
    }
}

/// Raw inputs of one sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleInputs {
    pub meminfo: MemInfo,
    pub swap: Option<SwapInfo>,
    /// Faults since the previous sample.
    pub fault_delta: FaultCounters,
    pub elapsed_seconds: f64,
    pub usage: UsageSnapshot,
}

/// Computes a snapshot from raw inputs. Pure.
pub fn derive_snapshot(inputs: &SampleInputs, captured_at: DateTime<Utc>) -> MemorySnapshot {
    let mem = &inputs.meminfo;
    let fragmentation = fragmentation_index(mem.total_bytes, mem.available_bytes);
    let swap_fraction = swap_used_fraction(inputs.swap);
    let faults = inputs
        .fault_delta
        .major
        .saturating_add(inputs.fault_delta.minor);

    MemorySnapshot {
        total_memory: mem.total_bytes,
        free_memory: mem.available_bytes,
        memory_usage: mem.total_bytes.saturating_sub(mem.available_bytes),
        cached_memory: mem.cached_bytes,
        buffers_memory: mem.buffers_bytes,
        fragmentation_index: fragmentation,
        pressure_score: pressure_score(fragmentation, swap_fraction),
        swap_usage_percent: (swap_fraction * 100.0).trunc() as u32,
        major_faults: inputs.fault_delta.major,
        minor_faults: inputs.fault_delta.minor,
        fault_rate: fault_rate(faults, inputs.elapsed_seconds),
        elapsed_seconds: inputs.elapsed_seconds,
        tracked_usage: inputs.usage.current,
        peak_usage: inputs.usage.peak,
        captured_at,
    }
}

struct SamplerState {
    last_instant: Instant,
    last_faults: FaultCounters,
}

/// Samples counters and derives [`MemorySnapshot`]s.
pub struct AnalyticsEngine<S: CounterSource = ProcCounters> {
    source: S,
    state: Mutex<SamplerState>,
    usage: Arc<UsageTracker>,
}

impl<S: CounterSource> AnalyticsEngine<S> {
    /// Creates an engine; the first sampling window starts now.
    pub fn new(source: S, usage: Arc<UsageTracker>) -> Self {
        let last_faults = source.faults().unwrap_or_default();
        Self {
            source,
            state: Mutex::new(SamplerState {
                last_instant: Instant::now(),
                last_faults,
            }),
            usage,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    fn lock_state(&self) -> MutexGuard<'_, SamplerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Swap from the OS call, falling back to the meminfo swap lines.
    fn read_swap(&self, meminfo: &MemInfo) -> Option<SwapInfo> {
        self.source.swap().or(match (meminfo.swap_total_bytes, meminfo.swap_free_bytes) {
            (Some(total_bytes), Some(free_bytes)) => Some(SwapInfo {
                total_bytes,
                free_bytes,
            }),
            _ => None,
        })
    }

    /// Takes a sample and advances the fault-rate window.
    pub fn sample(&self) -> MemorySnapshot {
        let (fault_delta, elapsed_seconds) = {
            let mut state = self.lock_state();
            let now = Instant::now();
            let current = self.source.faults().unwrap_or(state.last_faults);
            let delta = FaultCounters {
                major: current.major.saturating_sub(state.last_faults.major),
                minor: current.minor.saturating_sub(state.last_faults.minor),
            };
            let elapsed = now.duration_since(state.last_instant).as_secs_f64();
            state.last_faults = current;
            state.last_instant = now;
            (delta, elapsed)
        };

        let meminfo = match self.source.meminfo() {
            Ok(m) => m,
            Err(e) => {
                warn!("System memory counters unavailable: {}", e);
                MemInfo::default()
            }
        };
        let swap = self.read_swap(&meminfo);

        let inputs = SampleInputs {
            meminfo,
            swap,
            fault_delta,
            elapsed_seconds,
            usage: self.usage.snapshot(),
        };
        let snapshot = derive_snapshot(&inputs, Utc::now());
        debug!(
            "Sampled memory: fragmentation={:.3} pressure={:.3} fault_rate={:.1}/s",
            snapshot.fragmentation_index, snapshot.pressure_score, snapshot.fault_rate
        );
        snapshot
    }
}

impl AnalyticsEngine<ProcCounters> {
    /// Engine over the live system.
    pub fn for_system(usage: Arc<UsageTracker>) -> Self {
        Self::new(ProcCounters::default(), usage)
    }
}
