//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-oriented byte store.
///
/// # Invariants
///
/// - `append` returns the offset where the data begins
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `replace` swaps the whole contents in one step; readers never observe
///   a mix of old and new bytes
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range extends past
    /// the current size.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to durable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Drops everything after `new_size`.
    ///
    /// Used to cut a torn record off the end of a log during recovery.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Replaces the entire contents with `data`.
    ///
    /// Used by log compaction.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads everything from `offset` to the end.
    fn read_from(&self, offset: u64) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size.saturating_sub(offset)).unwrap_or(usize::MAX);
        self.read_at(offset, len)
    }
}
