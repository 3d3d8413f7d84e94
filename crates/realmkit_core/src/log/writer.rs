//! Commit log writer and recovery.

use super::record::{
    check_torn_tail, decode_frame, encode_frame, frame, CommitEntry, Frame, LogRecord, RecordKind,
    SnapshotEntry,
};
use crate::error::CoreResult;
use parking_lot::Mutex;
use realmkit_storage::StorageBackend;

/// Outcome of replaying a log.
#[derive(Debug, Default)]
pub struct Recovery {
    /// Complete records, in log order.
    pub records: Vec<LogRecord>,
    /// Length of the log after dropping a torn tail.
    pub valid_len: u64,
    /// Bytes dropped from the end of the log.
    pub torn_bytes: u64,
}

/// Append-only log of committed transactions.
pub struct CommitLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl CommitLog {
    /// Creates a log over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends a record, returning the offset it was written at.
    ///
    /// If the write fails, the log is cut back to its previous length so a
    /// partial frame never precedes later records.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or I/O fails.
    pub fn append(&self, record: &LogRecord) -> CoreResult<u64> {
        self.append_frame(&encode_frame(record)?)
    }

    /// Appends a commit record without wrapping it in a [`LogRecord`].
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or I/O fails.
    pub fn append_commit(&self, entry: &CommitEntry) -> CoreResult<u64> {
        self.append_frame(&frame(RecordKind::Commit, entry)?)
    }

    fn append_frame(&self, data: &[u8]) -> CoreResult<u64> {
        let mut backend = self.backend.lock();
        let before = backend.size()?;

        let written = backend.append(data).and_then(|offset| {
            if self.sync_on_commit {
                backend.sync()?;
            }
            Ok(offset)
        });
        match written {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Err(undo) = backend.truncate(before) {
                    tracing::warn!(error = %undo, "failed to roll back partial log append");
                }
                Err(err.into())
            }
        }
    }

    /// Replays every complete record, truncating a torn tail.
    ///
    /// An incomplete record is only treated as torn when no intact record
    /// follows it; otherwise the log is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if a record is damaged, or a storage error.
    pub fn recover(&self) -> CoreResult<Recovery> {
        let mut backend = self.backend.lock();
        let data = backend.read_from(0)?;

        let mut records = Vec::new();
        let mut pos = 0usize;
        while pos < data.len() {
            match decode_frame(&data[pos..], pos as u64)? {
                Frame::Record(record, len) => {
                    records.push(record);
                    pos += len;
                }
                Frame::Torn => {
                    check_torn_tail(&data, pos)?;
                    break;
                }
            }
        }

        let torn_bytes = (data.len() - pos) as u64;
        if torn_bytes > 0 {
            tracing::warn!(
                offset = pos,
                bytes = torn_bytes,
                "discarding torn record at end of commit log"
            );
            backend.truncate(pos as u64)?;
            backend.sync()?;
        }

        Ok(Recovery {
            records,
            valid_len: pos as u64,
            torn_bytes,
        })
    }

    /// Replaces the whole log with a single snapshot record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the replacement fails. On failure
    /// the previous log is left in place.
    pub fn compact(&self, snapshot: &SnapshotEntry) -> CoreResult<u64> {
        let data = frame(RecordKind::Snapshot, snapshot)?;
        let mut backend = self.backend.lock();
        backend.replace(&data)?;
        Ok(data.len() as u64)
    }

    /// Forces buffered data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }
}
