//! System-wide memory counters from the /proc filesystem and libc.
//!
//! This module reads the raw inputs of the analytics engine: `/proc/meminfo`,
//! swap totals from `sysinfo(2)` and page-fault counters, taken from
//! `getrusage(2)` for the calling process or from `/proc/<pid>/stat` for any
//! other. Parsing is separated from I/O so it can be tested on fixed text.

use nix::sys::resource::{getrusage, UsageWho};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{InspectError, Result};

/// Get the system page size (usually 4096).
fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        // Returns -1 on error - handled by the > 0 check
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as u64;
            }
        }
    }
    4096
}

/// System page size in bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Memory counters from /proc/meminfo, converted to bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub cached_bytes: u64,
    pub buffers_bytes: u64,
    pub swap_total_bytes: Option<u64>,
    pub swap_free_bytes: Option<u64>,
}

/// Swap totals in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// Cumulative page-fault counters of one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultCounters {
    pub major: u64,
    pub minor: u64,
}

/// One `<label>: <value> [kB]` line of /proc/meminfo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemInfoField {
    pub name: String,
    /// Value in bytes for `kB` lines, raw count otherwise (e.g. HugePages_Total).
    pub value: u64,
    pub unit: &'static str,
}

/// Parses kilobyte values such as `"   1234 kB"`.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// Kilobytes to bytes; `None` when the value does not fit in a u64.
fn kb_to_bytes(kb: u64) -> Option<u64> {
    kb.checked_mul(1024)
}

/// Parses the content of /proc/meminfo.
///
/// Missing labels read as zero. Kernels without `MemAvailable` (< 3.14)
/// get an estimate of MemFree + Buffers + Cached.
pub fn parse_meminfo(content: &str) -> MemInfo {
    let mut info = MemInfo::default();
    let mut have_available = false;

    for line in content.lines() {
        let bytes = |v: &str| {
            let b = parse_kb_value(v).and_then(kb_to_bytes);
            if b.is_none() {
                debug!("Skipping malformed meminfo line: {}", line);
            }
            b
        };
        if let Some(v) = line.strip_prefix("MemTotal:") {
            info.total_bytes = bytes(v).unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("MemFree:") {
            info.free_bytes = bytes(v).unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("MemAvailable:") {
            if let Some(b) = bytes(v) {
                info.available_bytes = b;
                have_available = true;
            }
        } else if let Some(v) = line.strip_prefix("Cached:") {
            info.cached_bytes = bytes(v).unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("Buffers:") {
            info.buffers_bytes = bytes(v).unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("SwapTotal:") {
            info.swap_total_bytes = bytes(v);
        } else if let Some(v) = line.strip_prefix("SwapFree:") {
            info.swap_free_bytes = bytes(v);
        }
    }

    if !have_available {
        debug!("MemAvailable missing, estimating from MemFree + Buffers + Cached");
        info.available_bytes = info
            .free_bytes
            .saturating_add(info.buffers_bytes)
            .saturating_add(info.cached_bytes)
            .min(info.total_bytes);
    }

    info
}

/// Reads and parses a meminfo file.
pub fn read_meminfo(path: &Path) -> Result<MemInfo> {
    let content = fs::read_to_string(path).map_err(|e| InspectError::unavailable(path, e))?;
    Ok(parse_meminfo(&content))
}

/// Parses every line of /proc/meminfo in file order.
/// Lines without a numeric value, or whose byte value overflows, are skipped.
pub fn parse_meminfo_table(content: &str) -> Vec<MemInfoField> {
    content
        .lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let mut parts = rest.split_whitespace();
            let value: u64 = parts.next()?.parse().ok()?;
            match parts.next() {
                Some("kB") => Some(MemInfoField {
                    name: name.trim().to_string(),
                    value: kb_to_bytes(value)?,
                    unit: "bytes",
                }),
                _ => Some(MemInfoField {
                    name: name.trim().to_string(),
                    value,
                    unit: "count",
                }),
            }
        })
        .collect()
}

pub fn read_meminfo_table(path: &Path) -> Result<Vec<MemInfoField>> {
    let content = fs::read_to_string(path).map_err(|e| InspectError::unavailable(path, e))?;
    Ok(parse_meminfo_table(&content))
}

/// Reads swap totals via sysinfo(2).
pub fn read_swap_info() -> Option<SwapInfo> {
    // SAFETY: libc::sysinfo is a plain C struct; zeroed memory is a valid
    // initial value and sysinfo only writes into it.
    unsafe {
        let mut si: libc::sysinfo = std::mem::zeroed();
        if libc::sysinfo(&mut si) != 0 {
            debug!("sysinfo(2) failed: {}", std::io::Error::last_os_error());
            return None;
        }
        let unit = u64::from(si.mem_unit.max(1));
        Some(SwapInfo {
            total_bytes: (si.totalswap as u64).saturating_mul(unit),
            free_bytes: (si.freeswap as u64).saturating_mul(unit),
        })
    }
}

/// Reads major/minor page-fault counters of the current process.
pub fn read_fault_counters() -> Option<FaultCounters> {
    match getrusage(UsageWho::RUSAGE_SELF) {
        Ok(usage) => Some(FaultCounters {
            major: usage.major_page_faults().max(0) as u64,
            minor: usage.minor_page_faults().max(0) as u64,
        }),
        Err(e) => {
            debug!("getrusage failed: {}", e);
            None
        }
    }
}

/// Parses minflt (field 10) and majflt (field 12) from /proc/<pid>/stat.
///
/// Fields are counted after the last `)` so a command name containing
/// spaces or parentheses does not shift them.
pub fn parse_stat_faults(content: &str) -> Result<FaultCounters> {
    let after_comm = content
        .rfind(')')
        .map(|i| &content[i + 1..])
        .ok_or_else(|| InspectError::malformed(content, "missing command name"))?;

    // Index 0 is field 3 (state)
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    let field = |n: usize, reason: &'static str| -> Result<u64> {
        fields
            .get(n - 3)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| InspectError::malformed(content, reason))
    };

    Ok(FaultCounters {
        minor: field(10, "invalid minflt field")?,
        major: field(12, "invalid majflt field")?,
    })
}

/// Reads fault counters of another process from its stat file.
pub fn read_stat_faults(stat_path: &Path) -> Result<FaultCounters> {
    let content =
        fs::read_to_string(stat_path).map_err(|e| InspectError::unavailable(stat_path, e))?;
    parse_stat_faults(&content)
}

/// Source of raw counters for the analytics engine.
pub trait CounterSource: Send + Sync {
    fn meminfo(&self) -> Result<MemInfo>;

    /// Swap totals; `None` when the OS call is unavailable.
    fn swap(&self) -> Option<SwapInfo>;

    /// Cumulative fault counters; `None` when unavailable.
    fn faults(&self) -> Option<FaultCounters>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FaultSource {
    OwnUsage,
    ProcStat(PathBuf),
}

/// Counters read from a /proc tree.
///
/// Faults come from `getrusage` unless a stat file is set with
/// [`ProcCounters::with_stat_faults`]. Swap comes from `sysinfo(2)` only when
/// the root is the live `/proc`; any other root is read through its own
/// meminfo swap lines.
#[derive(Debug, Clone)]
pub struct ProcCounters {
    meminfo_path: PathBuf,
    faults: FaultSource,
    host_swap: bool,
}

impl ProcCounters {
    pub fn new(proc_root: impl AsRef<Path>) -> Self {
        let root = proc_root.as_ref();
        Self {
            meminfo_path: root.join("meminfo"),
            faults: FaultSource::OwnUsage,
            host_swap: root == Path::new("/proc"),
        }
    }

    /// Reads fault counters from a `/proc/<pid>/stat` file instead.
    pub fn with_stat_faults(mut self, stat_path: impl Into<PathBuf>) -> Self {
        self.faults = FaultSource::ProcStat(stat_path.into());
        self
    }

    pub fn meminfo_path(&self) -> &Path {
        &self.meminfo_path
    }

    /// Stat file the fault counters come from, if not the calling process.
    pub fn stat_path(&self) -> Option<&Path> {
        match &self.faults {
            FaultSource::OwnUsage => None,
            FaultSource::ProcStat(path) => Some(path),
        }
    }

    pub fn uses_host_swap(&self) -> bool {
        self.host_swap
    }
}

impl Default for ProcCounters {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl CounterSource for ProcCounters {
    fn meminfo(&self) -> Result<MemInfo> {
        read_meminfo(&self.meminfo_path)
    }

    fn swap(&self) -> Option<SwapInfo> {
        if self.host_swap {
            read_swap_info()
        } else {
            None
        }
    }

    fn faults(&self) -> Option<FaultCounters> {
        match &self.faults {
            FaultSource::OwnUsage => read_fault_counters(),
            FaultSource::ProcStat(path) => match read_stat_faults(path) {
                Ok(f) => Some(f),
                Err(e) => {
                    debug!("Fault counters unavailable: {}", e);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16303992 kB\n\
                           MemFree:         1234567 kB\n\
                           MemAvailable:    8151996 kB\n\
                           Buffers:          204800 kB\n\
                           Cached:          4096000 kB\n\
                           SwapCached:            0 kB\n\
                           SwapTotal:       2097148 kB\n\
                           SwapFree:        1048574 kB\n\
                           HugePages_Total:       0\n\
                           Hugepagesize:       2048 kB\n";

    // -------------------------------------------------------------------------
    // Tests for parse_kb_value
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_kb_value() {
        assert_eq!(parse_kb_value("       1234 kB"), Some(1234));
        assert_eq!(parse_kb_value("0 kB"), Some(0));
        assert_eq!(parse_kb_value("  42  "), Some(42));
        assert_eq!(parse_kb_value(""), None);
        assert_eq!(parse_kb_value("kB"), None);
        assert_eq!(parse_kb_value("-1 kB"), None);
    }

    // -------------------------------------------------------------------------
    // Tests for parse_meminfo
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_meminfo_converts_to_bytes() {
        let info = parse_meminfo(MEMINFO);
        assert_eq!(info.total_bytes, 16303992 * 1024);
        assert_eq!(info.free_bytes, 1234567 * 1024);
        assert_eq!(info.available_bytes, 8151996 * 1024);
        assert_eq!(info.buffers_bytes, 204800 * 1024);
        assert_eq!(info.cached_bytes, 4096000 * 1024);
        assert_eq!(info.swap_total_bytes, Some(2097148 * 1024));
        assert_eq!(info.swap_free_bytes, Some(1048574 * 1024));
    }

    #[test]
    fn test_parse_meminfo_ignores_swap_cached_prefix() {
        // "SwapCached:" must not be mistaken for "Cached:"
        let info = parse_meminfo("Cached: 10 kB\nSwapCached: 99 kB\n");
        assert_eq!(info.cached_bytes, 10 * 1024);
    }

    #[test]
    fn test_parse_meminfo_estimates_missing_available() {
        let info = parse_meminfo(
            "MemTotal: 1000 kB\nMemFree: 100 kB\nBuffers: 50 kB\nCached: 200 kB\n",
        );
        assert_eq!(info.available_bytes, 350 * 1024);
    }

    #[test]
    fn test_parse_meminfo_empty_reads_zero() {
        assert_eq!(parse_meminfo(""), MemInfo::default());
    }

    #[test]
    fn test_parse_meminfo_table() {
        let table = parse_meminfo_table(MEMINFO);
        assert_eq!(table.len(), 10);
        assert_eq!(table[0].name, "MemTotal");
        assert_eq!(table[0].value, 16303992 * 1024);
        assert_eq!(table[0].unit, "bytes");
        let huge = table.iter().find(|f| f.name == "HugePages_Total").unwrap();
        assert_eq!(huge.value, 0);
        assert_eq!(huge.unit, "count");
    }

    #[test]
    fn test_read_meminfo_missing_file() {
        let err = read_meminfo(Path::new("/nonexistent/meminfo")).unwrap_err();
        assert!(matches!(err, InspectError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_fault_counters_readable() {
        assert!(read_fault_counters().is_some());
    }

    #[test]
    fn test_parse_meminfo_overflowing_value_is_skipped() {
        let info = parse_meminfo(
            "MemTotal: 18446744073709551615 kB\nMemFree: 100 kB\nSwapTotal: 18446744073709551615 kB\n",
        );
        assert_eq!(info.total_bytes, 0);
        assert_eq!(info.free_bytes, 100 * 1024);
        assert_eq!(info.swap_total_bytes, None);
    }

    #[test]
    fn test_parse_meminfo_table_skips_overflowing_value() {
        let table = parse_meminfo_table("MemTotal: 18446744073709551615 kB\nMemFree: 100 kB\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].name, "MemFree");
        assert_eq!(table[0].value, 100 * 1024);
    }

    // -------------------------------------------------------------------------
    // Tests for parse_stat_faults
    // -------------------------------------------------------------------------

    const STAT: &str = "1234 (test_process) S 1 1234 1234 0 -1 4194304 100 7 3 0 1000 500 0 0 20 0 1 0 12345 12345678 1234";

    #[test]
    fn test_parse_stat_faults() {
        let faults = parse_stat_faults(STAT).unwrap();
        assert_eq!(faults, FaultCounters { major: 3, minor: 100 });
    }

    #[test]
    fn test_parse_stat_faults_comm_with_spaces_and_parens() {
        let stat = "42 (my (odd) proc) R 1 42 42 0 -1 0 55 0 9 0 1 1";
        let faults = parse_stat_faults(stat).unwrap();
        assert_eq!(faults, FaultCounters { major: 9, minor: 55 });
    }

    #[test]
    fn test_parse_stat_faults_malformed() {
        assert!(matches!(
            parse_stat_faults("1234 test S 1"),
            Err(InspectError::MalformedRecord { .. })
        ));
        assert!(matches!(
            parse_stat_faults("1234 (short) S 1 2 3"),
            Err(InspectError::MalformedRecord { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Tests for ProcCounters
    // -------------------------------------------------------------------------

    #[test]
    fn test_proc_counters_read_pid_stat() {
        let dir = tempfile::tempdir().unwrap();
        let stat_path = dir.path().join("stat");
        std::fs::write(&stat_path, STAT).unwrap();

        let counters = ProcCounters::new(dir.path()).with_stat_faults(&stat_path);
        assert_eq!(counters.stat_path(), Some(stat_path.as_path()));
        assert_eq!(counters.faults(), Some(FaultCounters { major: 3, minor: 100 }));

        std::fs::remove_file(&stat_path).unwrap();
        assert_eq!(counters.faults(), None);
    }

    #[test]
    fn test_proc_counters_swap_source_follows_root() {
        assert!(ProcCounters::default().uses_host_swap());

        let dir = tempfile::tempdir().unwrap();
        let fake = ProcCounters::new(dir.path());
        assert!(!fake.uses_host_swap());
        assert_eq!(fake.swap(), None);
        assert_eq!(fake.stat_path(), None);
    }
}
