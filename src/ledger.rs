//! Allocation ledger for site-based leak attribution.
//!
//! Every tracked allocation is backed by a zero-filled buffer owned by the
//! ledger and keyed by the buffer's address. Freeing removes the record and
//! releases the buffer. A leak report lists the records of a site that are
//! still live: this is "not yet freed", not "unreachable", so long-lived
//! allocations from the same site show up alongside true leaks.

use ahash::AHashMap as HashMap;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::model::{Address, AllocationRecord, AllocationSite};
use crate::usage::UsageTracker;

/// Allocates through a ledger, tagging the record with the caller's
/// `file!()` and `line!()`.
///
/// ```
/// use herakles_vm_dashboard::{track_alloc, AllocationLedger};
///
/// let ledger = AllocationLedger::default();
/// let addr = track_alloc!(ledger, 64).unwrap();
/// assert_eq!(ledger.live_bytes(), 64);
/// ledger.free(addr);
/// ```
#[macro_export]
macro_rules! track_alloc {
    ($ledger:expr, $size:expr) => {
        $ledger.allocate($size, $crate::model::AllocationSite::new(file!(), line!()))
    };
}

/// A live record plus the memory it stands for.
struct TrackedBlock {
    record: AllocationRecord,
    // Owned so that releasing the record releases the memory.
    buffer: Box<[u8]>,
}

#[derive(Default)]
struct LedgerState {
    records: HashMap<usize, TrackedBlock>,
    next_sequence: u64,
}

/// Outstanding allocations matching a site or file filter.
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
    pub filter: String,
    pub leak_count: usize,
    pub total_leaked: u64,
    pub leaks: Vec<AllocationRecord>,
}

impl LeakReport {
    fn from_records(filter: String, mut leaks: Vec<AllocationRecord>) -> Self {
        leaks.sort_by_key(|r| r.sequence);
        let total_leaked = leaks.iter().map(|r| r.size as u64).sum();
        Self {
            filter,
            leak_count: leaks.len(),
            total_leaked,
            leaks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leaks.is_empty()
    }
}

/// Thread-safe allocation ledger keyed by address.
pub struct AllocationLedger {
    state: Mutex<LedgerState>,
    usage: Arc<UsageTracker>,
}

impl Default for AllocationLedger {
    fn default() -> Self {
        Self::new(Arc::new(UsageTracker::new()))
    }
}

impl AllocationLedger {
    /// Creates a ledger that reports into the given usage counters.
    pub fn new(usage: Arc<UsageTracker>) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            usage,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    /// Allocates `size` zeroed bytes and records them under `site`.
    ///
    /// Returns `None` if the allocator cannot satisfy the request; nothing is
    /// recorded in that case. Zero-sized requests are backed by one byte so
    /// that every live record has a distinct address.
    pub fn allocate(&self, size: usize, site: AllocationSite) -> Option<Address> {
        let buffer = match reserve_zeroed(size.max(1)) {
            Some(b) => b,
            None => {
                warn!("Tracked allocation of {} bytes at {} failed", size, site);
                return None;
            }
        };
        let address = Address::new(buffer.as_ptr() as usize)?;

        {
            let mut state = self.lock_state();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            let record = AllocationRecord {
                address,
                size,
                site,
                sequence,
                allocated_at: Utc::now(),
            };
            if state
                .records
                .insert(address.get(), TrackedBlock { record, buffer })
                .is_some()
            {
                warn!("Ledger already held a record for {}", address);
            }
        }

        // Ledger lock is released before touching the usage counters.
        self.usage.add(size as u64);
        debug!("Tracked {} bytes at {}", size, address);
        Some(address)
    }

    /// Releases a tracked allocation. Returns whether a record was removed.
    pub fn free(&self, address: Address) -> bool {
        let removed = self.lock_state().records.remove(&address.get());
        match removed {
            Some(block) => {
                self.usage.sub(block.record.size as u64);
                debug!(
                    "Freed {} bytes at {} (allocated at {})",
                    block.record.size, address, block.record.site
                );
                drop(block.buffer);
                true
            }
            None => {
                debug!("Free of untracked address {}", address);
                false
            }
        }
    }

    /// Like [`free`](Self::free) but accepts a raw address; `0` is a no-op.
    pub fn free_raw(&self, address: usize) -> bool {
        match Address::new(address) {
            Some(addr) => self.free(addr),
            None => false,
        }
    }

    /// Live records whose site equals `site` exactly.
    pub fn report_by_site(&self, site: &AllocationSite) -> LeakReport {
        let leaks = self.collect(|r| &r.site == site);
        LeakReport::from_records(site.to_string(), leaks)
    }

    /// Live records allocated anywhere in `file`.
    pub fn report_by_file(&self, file: &str) -> LeakReport {
        let leaks = self.collect(|r| r.site.file == file);
        LeakReport::from_records(file.to_string(), leaks)
    }

    /// Every live record, regardless of site.
    pub fn report_all(&self) -> LeakReport {
        LeakReport::from_records("*".to_string(), self.collect(|_| true))
    }

    fn collect<F>(&self, mut pred: F) -> Vec<AllocationRecord>
    where
        F: FnMut(&AllocationRecord) -> bool,
    {
        self.lock_state()
            .records
            .values()
            .filter(|b| pred(&b.record))
            .map(|b| b.record.clone())
            .collect()
    }

    /// All live records in allocation order.
    pub fn records(&self) -> Vec<AllocationRecord> {
        let mut records = self.collect(|_| true);
        records.sort_by_key(|r| r.sequence);
        records
    }

    pub fn record(&self, address: Address) -> Option<AllocationRecord> {
        self.lock_state()
            .records
            .get(&address.get())
            .map(|b| b.record.clone())
    }

    pub fn live_count(&self) -> usize {
        self.lock_state().records.len()
    }

    /// Sum of the sizes of all live records.
    pub fn live_bytes(&self) -> u64 {
        self.lock_state()
            .records
            .values()
            .map(|b| b.record.size as u64)
            .sum()
    }

    /// Runs `f` over the tracked buffer at `address`. The ledger lock is held
    /// for the duration of `f`.
    pub fn with_buffer_mut<R>(&self, address: Address, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut state = self.lock_state();
        let block = state.records.get_mut(&address.get())?;
        let len = block.record.size;
        Some(f(&mut block.buffer[..len]))
    }
}

/// Reserves `len` bytes without aborting on allocator failure.
fn reserve_zeroed(len: usize) -> Option<Box<[u8]>> {
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0);
    Some(buf.into_boxed_slice())
}
