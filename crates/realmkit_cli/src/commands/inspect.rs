//! Inspect command implementation.

use super::dump_log;
use super::open_store;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Commit log size in bytes.
    pub log_size: u64,
    /// Number of records in the commit log.
    pub log_record_count: usize,
    /// Bytes of a torn final record found before opening.
    pub torn_bytes: u64,
    /// Sequence number of the last commit.
    pub sequence: u64,
    /// Per-class record counts, in class name order.
    pub classes: Vec<ClassStats>,
}

/// Statistics for a single class.
#[derive(Debug, Serialize)]
pub struct ClassStats {
    /// Class name.
    pub name: String,
    /// Number of records.
    pub count: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    // Scan first: opening the store truncates a torn tail.
    let scan = dump_log::scan(path, None)?;

    let (_registry, realm) = open_store(path)?;
    let mut classes = Vec::new();
    for name in realm.class_names()? {
        let count = realm.count(&name)?;
        classes.push(ClassStats { name, count });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        log_size: realm.log_size()?.unwrap_or(0),
        log_record_count: scan.records.len(),
        torn_bytes: scan.torn_bytes,
        sequence: realm.committed_sequence().as_u64(),
        classes,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("realmkit Store Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Commit log:");
    println!("  Size:     {}", format_size(result.log_size));
    println!("  Records:  {}", result.log_record_count);
    println!("  Sequence: {}", result.sequence);
    if result.torn_bytes > 0 {
        println!("  Torn tail discarded: {} bytes", result.torn_bytes);
    }
    println!();
    println!("Classes:");
    if result.classes.is_empty() {
        println!("  (none)");
    }
    for class in &result.classes {
        println!("  {:24} {} records", class.name, class.count);
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::seed;
    use tempfile::tempdir;

    #[test]
    fn reports_classes_and_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.realm");
        seed(&path);

        let result = inspect(&path).unwrap();
        assert_eq!(result.sequence, 4);
        assert_eq!(result.log_record_count, 4);
        assert_eq!(result.torn_bytes, 0);
        let counts: Vec<(&str, usize)> = result
            .classes
            .iter()
            .map(|c| (c.name.as_str(), c.count))
            .collect();
        assert_eq!(counts, [("Dog", 1), ("Person", 3)]);
        assert_eq!(result.log_size, std::fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
