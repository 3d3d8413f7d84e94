//! Dump-log command implementation.

use realmkit_core::log::{check_torn_tail, decode_frame, Frame, LogRecord};
use realmkit_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// Commit log record representation for output.
#[derive(Debug, Serialize)]
pub struct LogRecordInfo {
    /// Offset in the log file.
    pub offset: u64,
    /// Record kind.
    pub kind: String,
    /// Sequence number the record ends at.
    pub sequence: u64,
    /// Framed length in bytes.
    pub length: usize,
    /// Number of changes (commit records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<usize>,
    /// Number of records (snapshot records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
}

/// Result of walking the commit log without modifying it.
#[derive(Debug, Serialize)]
pub struct LogScan {
    /// Decoded records, up to the requested limit.
    pub records: Vec<LogRecordInfo>,
    /// Bytes of an incomplete final record, discarded on the next open.
    pub torn_bytes: u64,
}

/// Runs the dump-log command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let scan = scan(path, limit)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&scan)?);
        }
        _ => {
            print_text_output(&scan);
        }
    }
    Ok(())
}

/// Reads the commit log at `path` without running recovery.
///
/// # Errors
///
/// Fails if the file is missing, unreadable or holds a damaged record.
pub fn scan(path: &Path, limit: Option<usize>) -> Result<LogScan, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let data = FileBackend::open(path)?.read_from(0)?;
    let max_records = limit.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() && records.len() < max_records {
        match decode_frame(&data[pos..], pos as u64)? {
            Frame::Record(record, length) => {
                records.push(describe(&record, pos as u64, length));
                pos += length;
            }
            Frame::Torn => {
                check_torn_tail(&data, pos)?;
                return Ok(LogScan {
                    records,
                    torn_bytes: (data.len() - pos) as u64,
                })
            }
        }
    }
    Ok(LogScan {
        records,
        torn_bytes: 0,
    })
}

fn describe(record: &LogRecord, offset: u64, length: usize) -> LogRecordInfo {
    let (kind, changes, records) = match record {
        LogRecord::Commit(entry) => ("COMMIT", Some(entry.changes.len()), None),
        LogRecord::Snapshot(entry) => ("SNAPSHOT", None, Some(entry.records.len())),
    };
    LogRecordInfo {
        offset,
        kind: kind.to_string(),
        sequence: record.sequence().as_u64(),
        length,
        changes,
        records,
    }
}

fn print_text_output(scan: &LogScan) {
    println!("Commit Log Records ({} listed)", scan.records.len());
    println!("==================");
    println!();

    for record in &scan.records {
        print!("[{:08}] {:9} seq={}", record.offset, record.kind, record.sequence);
        if let Some(changes) = record.changes {
            print!(" changes={changes}");
        }
        if let Some(records) = record.records {
            print!(" records={records}");
        }
        println!(" len={}", record.length);
    }

    if scan.torn_bytes > 0 {
        println!();
        println!("Torn tail: {} bytes", scan.torn_bytes);
    }
}
