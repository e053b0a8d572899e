//! Check command implementation.
//!
//! Validates runtime requirements and configuration, then exercises each
//! data source once.

use herakles_vm_dashboard::model::LEAF_LEVEL;
use herakles_vm_dashboard::system::PAGE_SIZE;

use super::build_inspector;
use crate::config::{validate_effective_config, Config};
use crate::startup_checks::validate_requirements;

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles VM Dashboard - System Check");
    println!("=======================================");
    println!(
        "   Build: {} (git {})",
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    );

    let mut all_ok = true;
    let inspector = build_inspector(config);
    let paths = inspector.paths();

    // Check /proc sources
    println!("\n📁 Checking /proc sources for {}...", paths.process_dir().display());
    match validate_requirements(paths) {
        Ok(_) => println!("   ✅ meminfo, maps and pagemap accessible"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    // Check analytics
    println!("\n💾 Checking memory analytics...");
    let stats = inspector.stats();
    if stats.total_memory > 0 {
        println!(
            "   ✅ Total {}MB, available {}MB, pressure {:.2}",
            stats.total_memory / 1024 / 1024,
            stats.free_memory / 1024 / 1024,
            stats.pressure_score
        );
    } else {
        println!("   ❌ No system memory counters");
        all_ok = false;
    }

    // Check region hierarchy and page table
    println!("\n🗺️  Checking memory map and page table...");
    let regions = inspector.regions();
    if regions.is_empty() {
        println!("   ❌ No memory regions readable");
        all_ok = false;
    } else {
        println!("   ✅ {} memory regions classified", regions.len());
    }

    let entries = inspector.page_entries();
    let present = entries.iter().filter(|e| e.is_present).count();
    let with_frame = entries
        .iter()
        .filter(|e| e.physical_addr.is_some_and(|p| p != 0))
        .count();
    println!(
        "   ✅ {} pages sampled ({} present, page size {}, level {})",
        entries.len(),
        present,
        *PAGE_SIZE,
        LEAF_LEVEL
    );
    if present > 0 && with_frame == 0 {
        println!("   ⚠️  Physical frame numbers hidden - run as root to see them");
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
