//! Commit log for file-backed realms.
//!
//! Every committed transaction is appended as one framed record before it
//! becomes visible. Opening a realm replays the log from the start.
//!
//! ## Record Format
//!
//! ```text
//! | magic "RKLG" (4) | version (2) | kind (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Integers are little endian. The payload is CBOR. The CRC covers every
//! byte before it.
//!
//! ## Recovery Policy
//!
//! - A short header or short payload at the end of the log is a write that
//!   never finished. It is truncated away and recovery succeeds.
//! - A bad magic, unsupported version, unknown kind, CRC mismatch or
//!   undecodable payload fails the open with `Corruption`.
//!
//! ## Compaction
//!
//! [`CommitLog::compact`] replaces the whole log with a single snapshot
//! record holding the current contents.

mod record;
mod writer;

pub use record::{
    check_torn_tail, decode_frame, encode_frame, CommitEntry, Frame, LogRecord, RecordKind,
    SnapshotEntry, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION, MAX_RECORD_SIZE,
};
pub use writer::{CommitLog, Recovery};
