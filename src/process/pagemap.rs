//! Sampling walker over `/proc/<pid>/pagemap`.
//!
//! pagemap holds one 64-bit little-endian record per virtual page, at byte
//! offset `(vaddr / page_size) * 8`:
//!
//! | bits  | meaning                         |
//! |-------|---------------------------------|
//! | 63    | page present in RAM             |
//! | 62    | page swapped                    |
//! | 61    | file-page or shared-anon        |
//! | 55    | soft-dirty                      |
//! | 0-54  | page frame number (PFN)         |
//!
//! Without CAP_SYS_ADMIN the kernel reports a PFN of zero.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{InspectError, Result};
use crate::model::{PageTableEntry, LEAF_LEVEL};
use crate::process::maps::{parse_maps, read_maps_text};

/// Size of one pagemap record in bytes.
pub const PAGEMAP_ENTRY_SIZE: usize = 8;

pub const DEFAULT_STRIDE_PAGES: u64 = 10;
pub const DEFAULT_CAPACITY: usize = 1000;

const PRESENT_BIT: u32 = 63;
const SWAPPED_BIT: u32 = 62;
const FILE_PAGE_BIT: u32 = 61;
const SOFT_DIRTY_BIT: u32 = 55;
const PFN_MASK: u64 = (1 << 55) - 1;

/// One decoded pagemap record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagemapRecord(u64);

impl PagemapRecord {
    /// Decodes the first 8 bytes of `bytes` as a little-endian record.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; PAGEMAP_ENTRY_SIZE] = bytes
            .get(..PAGEMAP_ENTRY_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(InspectError::TruncatedRecord {
                expected: PAGEMAP_ENTRY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(PagemapRecord(u64::from_le_bytes(raw)))
    }

    pub fn from_raw(raw: u64) -> Self {
        PagemapRecord(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    fn bit(&self, n: u32) -> bool {
        (self.0 >> n) & 1 == 1
    }

    pub fn is_present(&self) -> bool {
        self.bit(PRESENT_BIT)
    }

    pub fn is_swapped(&self) -> bool {
        self.bit(SWAPPED_BIT)
    }

    pub fn is_file_page(&self) -> bool {
        self.bit(FILE_PAGE_BIT)
    }

    pub fn is_soft_dirty(&self) -> bool {
        self.bit(SOFT_DIRTY_BIT)
    }

    pub fn pfn(&self) -> u64 {
        self.0 & PFN_MASK
    }
}

/// Samples page-table entries for every mapped region.
#[derive(Debug, Clone, Copy)]
pub struct PageTableWalker {
    pub page_size: u64,
    /// Distance between samples, in pages.
    pub stride_pages: u64,
    /// Maximum number of entries returned by one walk.
    pub capacity: usize,
}

impl PageTableWalker {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size,
            stride_pages: DEFAULT_STRIDE_PAGES,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_stride(mut self, stride_pages: u64) -> Self {
        self.stride_pages = stride_pages;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Reads the record for `vaddr`.
    pub fn read_record<R: Read + Seek>(&self, pagemap: &mut R, vaddr: u64) -> Result<PagemapRecord> {
        let page = vaddr.checked_div(self.page_size).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "page size is zero")
        })?;
        let offset = page.saturating_mul(PAGEMAP_ENTRY_SIZE as u64);
        pagemap.seek(SeekFrom::Start(offset))?;

        let mut buf = [0u8; PAGEMAP_ENTRY_SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            match pagemap.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        PagemapRecord::decode(&buf[..filled])
    }

    /// Walks the regions of `maps_content`, sampling every `stride_pages`-th
    /// page. Samples that cannot be read are skipped; the walk stops once
    /// `capacity` entries have been collected.
    pub fn walk<R: Read + Seek>(&self, maps_content: &str, mut pagemap: R) -> Vec<PageTableEntry> {
        if self.page_size == 0 || self.capacity == 0 {
            return Vec::new();
        }
        let step = self.stride_pages.max(1).saturating_mul(self.page_size);
        let mut entries = Vec::with_capacity(self.capacity.min(256));

        'regions: for region in parse_maps(maps_content) {
            let perms = region.permissions();
            let mut addr = region.start;
            while addr < region.end {
                if entries.len() >= self.capacity {
                    debug!("Page table sample capacity {} reached", self.capacity);
                    break 'regions;
                }

                match self.read_record(&mut pagemap, addr) {
                    Ok(record) => {
                        let present = record.is_present();
                        entries.push(PageTableEntry {
                            virtual_addr: addr,
                            physical_addr: present
                                .then(|| record.pfn().saturating_mul(self.page_size)),
                            page_size: self.page_size,
                            is_present: present,
                            is_writable: perms.writable(),
                            is_executable: perms.executable(),
                            is_cached: true,
                            is_dirty: record.is_soft_dirty(),
                            is_swapped: record.is_swapped(),
                            is_file_page: record.is_file_page(),
                            level: LEAF_LEVEL,
                        });
                    }
                    Err(e) => debug!("Skipping page {:#x}: {}", addr, e),
                }

                addr = match addr.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
        }

        entries
    }

    /// Walks a live process. If either source cannot be opened the result
    /// is empty.
    pub fn walk_process(&self, maps_path: &Path, pagemap_path: &Path) -> Vec<PageTableEntry> {
        let maps = match read_maps_text(maps_path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Page table unavailable: {}", e);
                return Vec::new();
            }
        };
        let pagemap = match File::open(pagemap_path) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    "Page table unavailable: {}",
                    InspectError::unavailable(pagemap_path, e)
                );
                return Vec::new();
            }
        };
        self.walk(&maps, pagemap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const PAGE: u64 = 4096;

    /// Builds an in-memory pagemap covering pages `0..pages`.
    fn pagemap_with(pages: usize, records: &[(u64, u64)]) -> Cursor<Vec<u8>> {
        let mut bytes = vec![0u8; pages * PAGEMAP_ENTRY_SIZE];
        for &(page, raw) in records {
            let off = page as usize * PAGEMAP_ENTRY_SIZE;
            bytes[off..off + PAGEMAP_ENTRY_SIZE].copy_from_slice(&raw.to_le_bytes());
        }
        Cursor::new(bytes)
    }

    // -------------------------------------------------------------------------
    // Tests for PagemapRecord::decode
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_present_record() {
        let raw: u64 = (1 << 63) | 0x1234;
        let rec = PagemapRecord::decode(&raw.to_le_bytes()).unwrap();
        assert!(rec.is_present());
        assert!(!rec.is_swapped());
        assert_eq!(rec.pfn(), 0x1234);
    }

    #[test]
    fn test_decode_flag_bits() {
        let raw: u64 = (1 << 62) | (1 << 61) | (1 << 55);
        let rec = PagemapRecord::from_raw(raw);
        assert!(!rec.is_present());
        assert!(rec.is_swapped());
        assert!(rec.is_file_page());
        assert!(rec.is_soft_dirty());
        // Flag bits never leak into the PFN
        assert_eq!(rec.pfn(), 0);
    }

    #[test]
    fn test_decode_truncated() {
        let err = PagemapRecord::decode(&[0u8; 5]).unwrap_err();
        assert!(matches!(
            err,
            InspectError::TruncatedRecord {
                expected: 8,
                actual: 5
            }
        ));
    }

    // -------------------------------------------------------------------------
    // Tests for PageTableWalker::walk
    // -------------------------------------------------------------------------

    #[test]
    fn test_walk_single_present_page() {
        let maps = "1000-2000 rw-p 00000000 00:00 0\n";
        let pagemap = pagemap_with(2, &[(1, (1 << 63) | 0x1234)]);

        let entries = PageTableWalker::new(PAGE).walk(maps, pagemap);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.virtual_addr, 0x1000);
        assert_eq!(e.physical_addr, Some(0x1234 * PAGE));
        assert!(e.is_present);
        assert!(e.is_writable);
        assert!(!e.is_executable);
        assert!(e.is_cached);
        assert_eq!(e.level, 4);
    }

    #[test]
    fn test_walk_absent_page_has_no_physical_addr() {
        let maps = "1000-2000 r-xp 00000000 08:01 7 /bin/app\n";
        // PFN bits set but present bit clear
        let pagemap = pagemap_with(2, &[(1, 0x1234)]);

        let entries = PageTableWalker::new(PAGE).walk(maps, pagemap);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_present);
        assert_eq!(entries[0].physical_addr, None);
        assert!(entries[0].is_executable);
    }

    #[test]
    fn test_walk_samples_every_stride() {
        // 25 pages starting at page 0x10 -> samples at +0, +10, +20
        let maps = "10000-29000 rw-p 00000000 00:00 0\n";
        let pagemap = pagemap_with(0x29, &[]);

        let entries = PageTableWalker::new(PAGE).walk(maps, pagemap);
        let addrs: Vec<u64> = entries.iter().map(|e| e.virtual_addr).collect();
        assert_eq!(addrs, vec![0x10000, 0x1a000, 0x24000]);
    }

    #[test]
    fn test_walk_stops_at_capacity() {
        let maps = "0-100000 rw-p 00000000 00:00 0\n";
        let pagemap = pagemap_with(0x100, &[]);

        let walker = PageTableWalker::new(PAGE).with_stride(1).with_capacity(5);
        assert_eq!(walker.walk(maps, pagemap).len(), 5);
    }

    #[test]
    fn test_walk_default_capacity_is_1000() {
        // 10240 pages at the default stride of 10 would give 1024 samples
        let maps = "0-2800000 rw-p 00000000 00:00 0\n";
        let pagemap = pagemap_with(0x2800, &[]);

        let entries = PageTableWalker::new(PAGE).walk(maps, pagemap);
        assert_eq!(DEFAULT_CAPACITY, 1000);
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[999].virtual_addr, 999 * 10 * PAGE);
    }

    #[test]
    fn test_walk_skips_unreadable_samples() {
        // Second region lies beyond the end of the pagemap data
        let maps = "1000-2000 rw-p 00000000 00:00 0\n\
                    100000-101000 rw-p 00000000 00:00 0\n";
        let pagemap = pagemap_with(2, &[(1, 1 << 63)]);

        let entries = PageTableWalker::new(PAGE).walk(maps, pagemap);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].virtual_addr, 0x1000);
    }

    #[test]
    fn test_walk_zero_capacity_is_empty() {
        let maps = "1000-2000 rw-p 00000000 00:00 0\n";
        let walker = PageTableWalker::new(PAGE).with_capacity(0);
        assert!(walker.walk(maps, pagemap_with(2, &[])).is_empty());
    }

    #[test]
    fn test_walk_process_missing_sources() {
        let walker = PageTableWalker::new(PAGE);
        assert!(walker
            .walk_process(Path::new("/nonexistent/maps"), Path::new("/nonexistent/pagemap"))
            .is_empty());
    }
}
