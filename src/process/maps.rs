//! Parser for `/proc/<pid>/maps`.
//!
//! Line format: `<start_hex>-<end_hex> <perms> <offset> <dev> <inode> [<path>]`.
//! Only the address range and the permission string are required; the path
//! is everything after the inode and may contain spaces.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{InspectError, Result};
use crate::model::Permissions;

/// Smallest Linux page size; every mapping boundary is a multiple of it.
const MIN_PAGE_SIZE: u64 = 4096;

/// One raw line of the memory map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapsEntry {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    pub dev: String,
    pub inode: u64,
    pub pathname: String,
}

impl MapsEntry {
    pub fn permissions(&self) -> Permissions {
        Permissions::from_perms_str(&self.perms)
    }

    /// Fourth permission character is `s` for shared mappings.
    pub fn is_shared(&self) -> bool {
        self.perms.chars().nth(3) == Some('s')
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

/// Splits off the next whitespace-delimited field.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(i) => Some((&s[..i], &s[i..])),
        None => Some((s, "")),
    }
}

/// Parses one maps line. Bounds must be page-aligned and `end` above `start`.
pub fn parse_maps_line(line: &str) -> Result<MapsEntry> {
    let (range, rest) = next_field(line).ok_or_else(|| InspectError::malformed(line, "empty line"))?;
    let (start_s, end_s) = range
        .split_once('-')
        .ok_or_else(|| InspectError::malformed(line, "missing address separator"))?;
    let start = u64::from_str_radix(start_s, 16)
        .map_err(|_| InspectError::malformed(line, "invalid start address"))?;
    let end = u64::from_str_radix(end_s, 16)
        .map_err(|_| InspectError::malformed(line, "invalid end address"))?;
    if end <= start {
        return Err(InspectError::malformed(line, "end address not above start"));
    }
    if start % MIN_PAGE_SIZE != 0 || end % MIN_PAGE_SIZE != 0 {
        return Err(InspectError::malformed(line, "address range not page-aligned"));
    }

    let (perms, rest) =
        next_field(rest).ok_or_else(|| InspectError::malformed(line, "missing permissions"))?;

    let (offset, rest) = next_field(rest).unwrap_or(("0", ""));
    let (dev, rest) = next_field(rest).unwrap_or(("00:00", ""));
    let (inode, rest) = next_field(rest).unwrap_or(("0", ""));

    Ok(MapsEntry {
        start,
        end,
        perms: perms.to_string(),
        offset: u64::from_str_radix(offset, 16).unwrap_or(0),
        dev: dev.to_string(),
        inode: inode.parse().unwrap_or(0),
        pathname: rest.trim().to_string(),
    })
}

/// Parses a whole map, skipping malformed lines.
pub fn parse_maps(content: &str) -> Vec<MapsEntry> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match parse_maps_line(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping maps line: {}", e);
                None
            }
        })
        .collect()
}

/// Reads the raw text of a maps file.
pub fn read_maps_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| InspectError::unavailable(path, e))
}

pub fn read_maps(path: &Path) -> Result<Vec<MapsEntry>> {
    Ok(parse_maps(&read_maps_text(path)?))
}
