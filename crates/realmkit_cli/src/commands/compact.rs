//! Compact command implementation.

use super::open_store;
use std::path::Path;

/// Log sizes around a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
    /// Bytes before compaction.
    pub bytes_before: u64,
    /// Bytes after compaction.
    pub bytes_after: u64,
}

impl CompactStats {
    /// Bytes reclaimed; zero if the snapshot is larger than the log was.
    #[must_use]
    pub fn saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting {}", path.display());
    let stats = compact(path)?;

    println!("  Size before: {} bytes", stats.bytes_before);
    println!("  Size after:  {} bytes", stats.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        stats.saved(),
        if stats.bytes_before > 0 {
            (stats.saved() as f64 / stats.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}

fn compact(path: &Path) -> Result<CompactStats, Box<dyn std::error::Error>> {
    let (_registry, realm) = open_store(path)?;
    let bytes_before = realm.log_size()?.unwrap_or(0);
    realm.compact()?;
    let bytes_after = realm.log_size()?.unwrap_or(0);
    Ok(CompactStats {
        bytes_before,
        bytes_after,
    })
}
