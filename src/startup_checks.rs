//! Runtime requirement validation for herakles-vm-dashboard.
//!
//! This module validates that the dashboard can read the /proc sources it
//! needs for the inspected process.

use nix::unistd::geteuid;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{error, info, warn};

use herakles_vm_dashboard::ProcessPaths;

/// Validate all runtime requirements
pub fn validate_requirements(paths: &ProcessPaths) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_meminfo(&paths.meminfo())?;
    check_readable(&paths.maps())?;
    check_pagemap(&paths.pagemap())?;

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Physical frame numbers are only visible with CAP_SYS_ADMIN.
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - pagemap frame numbers will read as zero");
        warn!("   Recommendation: Run as root to see physical addresses");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

fn check_meminfo(path: &Path) -> Result<(), ValidationError> {
    match fs::read_to_string(path) {
        Ok(content) if content.contains("MemTotal:") => {
            info!("✅ {} readable", path.display());
            Ok(())
        }
        Ok(_) => {
            error!("❌ {} has no MemTotal line", path.display());
            Err(ValidationError::UnexpectedFormat(path.display().to_string()))
        }
        Err(e) => {
            error!("❌ Cannot read {}: {}", path.display(), e);
            Err(ValidationError::SourceUnreadable(path.display().to_string(), e.to_string()))
        }
    }
}

fn check_readable(path: &Path) -> Result<(), ValidationError> {
    match fs::metadata(path) {
        Ok(_) => {
            info!("✅ {} accessible", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot read {} - insufficient permissions", path.display());
            error!("   Run as the owner of the inspected process or as root");
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            error!("❌ Cannot access {}: {}", path.display(), e);
            Err(ValidationError::SourceUnreadable(path.display().to_string(), e.to_string()))
        }
    }
}

/// Opens pagemap and reads the first record.
fn check_pagemap(path: &Path) -> Result<(), ValidationError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot open {} - insufficient permissions", path.display());
            return Err(ValidationError::InsufficientPermissions(e.to_string()));
        }
        Err(e) => {
            error!("❌ Cannot open {}: {}", path.display(), e);
            return Err(ValidationError::SourceUnreadable(
                path.display().to_string(),
                e.to_string(),
            ));
        }
    };

    let mut record = [0u8; 8];
    match file.read(&mut record) {
        Ok(_) => {
            info!("✅ {} readable", path.display());
            Ok(())
        }
        Err(e) => {
            // Reading page 0 of a live process is normal; only open failures are fatal
            warn!("⚠️  First pagemap record unreadable: {}", e);
            Ok(())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Cannot read {0}: {1}")]
    SourceUnreadable(String, String),

    #[error("Unexpected format in {0}")]
    UnexpectedFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fake_proc_tree() {
        let dir = tempfile::tempdir().unwrap();
        let pid_dir = dir.path().join("12");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(dir.path().join("meminfo"), "MemTotal: 1024 kB\n").unwrap();
        fs::write(pid_dir.join("maps"), "1000-2000 r--p 0 00:00 0\n").unwrap();
        fs::write(pid_dir.join("pagemap"), [0u8; 8]).unwrap();

        let paths = ProcessPaths::new(dir.path(), Some(12));
        assert!(validate_requirements(&paths).is_ok());
    }

    #[test]
    fn test_validate_missing_process() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("meminfo"), "MemTotal: 1024 kB\n").unwrap();

        let paths = ProcessPaths::new(dir.path(), Some(12));
        assert!(matches!(
            validate_requirements(&paths),
            Err(ValidationError::SourceUnreadable(..))
        ));
    }

    #[test]
    fn test_validate_bad_meminfo() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("meminfo"), "garbage\n").unwrap();

        let paths = ProcessPaths::new(dir.path(), None);
        assert!(matches!(
            validate_requirements(&paths),
            Err(ValidationError::UnexpectedFormat(_))
        ));
    }
}
