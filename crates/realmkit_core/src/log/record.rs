//! Commit log record types and framing.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::store::Change;
use crate::types::SequenceNumber;
use serde::{Deserialize, Serialize};

/// Magic bytes opening every record.
pub const LOG_MAGIC: [u8; 4] = *b"RKLG";

/// Current record format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + kind (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Largest payload a record may carry. A header announcing more is damaged.
pub const MAX_RECORD_SIZE: usize = 256 * 1024 * 1024;

/// Record kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// One committed transaction.
    Commit = 1,
    /// Full store contents, written by compaction.
    Snapshot = 2,
}

impl RecordKind {
    /// Returns the byte stored in the header.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parses a header byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Commit),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// Payload of a commit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    /// Sequence number assigned to the commit.
    pub sequence: SequenceNumber,
    /// Changes in application order.
    pub changes: Vec<Change>,
}

/// Payload of a snapshot record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Sequence number of the last commit folded into the snapshot.
    pub sequence: SequenceNumber,
    /// First unallocated row id.
    pub next_row: u64,
    /// Every record, in row order.
    pub records: Vec<Record>,
}

/// A decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A committed transaction.
    Commit(CommitEntry),
    /// A compacted snapshot.
    Snapshot(SnapshotEntry),
}

impl LogRecord {
    /// Returns the kind of this record.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Commit(_) => RecordKind::Commit,
            Self::Snapshot(_) => RecordKind::Snapshot,
        }
    }

    /// Returns the sequence number the record ends at.
    #[must_use]
    pub const fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Commit(entry) => entry.sequence,
            Self::Snapshot(entry) => entry.sequence,
        }
    }

    fn decode_payload(kind: RecordKind, payload: &[u8]) -> Result<Self, String> {
        match kind {
            RecordKind::Commit => ciborium::from_reader(payload)
                .map(Self::Commit)
                .map_err(|e| e.to_string()),
            RecordKind::Snapshot => ciborium::from_reader(payload)
                .map(Self::Snapshot)
                .map_err(|e| e.to_string()),
        }
    }
}

/// Frames a record: header, CBOR payload, CRC.
///
/// # Errors
///
/// Returns `Codec` if encoding fails and `InvalidOperation` if the payload
/// exceeds [`MAX_RECORD_SIZE`].
pub fn encode_frame(record: &LogRecord) -> CoreResult<Vec<u8>> {
    match record {
        LogRecord::Commit(entry) => frame(RecordKind::Commit, entry),
        LogRecord::Snapshot(entry) => frame(RecordKind::Snapshot, entry),
    }
}

pub(crate) fn frame<T: Serialize>(kind: RecordKind, body: &T) -> CoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(body, &mut payload).map_err(CoreError::codec)?;
    if payload.len() > MAX_RECORD_SIZE {
        return Err(CoreError::invalid_operation(format!(
            "commit log record too large: {} bytes exceeds maximum of {MAX_RECORD_SIZE}",
            payload.len()
        )));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_operation("commit log record too large"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.push(kind.as_byte());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data);
    data.extend_from_slice(&hasher.finalize().to_le_bytes());
    Ok(data)
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete record and its framed length.
    Record(LogRecord, usize),
    /// The bytes end before the record does.
    Torn,
}

/// Decodes the frame starting at `data[0]`.
///
/// `offset` is the frame's position in the log, used in error messages.
///
/// # Errors
///
/// Returns `Corruption` for bad magic, version, kind, length, checksum or
/// payload.
pub fn decode_frame(data: &[u8], offset: u64) -> CoreResult<Frame> {
    if data.len() < HEADER_SIZE {
        return Ok(Frame::Torn);
    }
    if data[0..4] != LOG_MAGIC {
        return Err(CoreError::corruption(offset, "bad record magic"));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != LOG_VERSION {
        return Err(CoreError::corruption(
            offset,
            format!("unsupported record version {version}"),
        ));
    }
    let Some(kind) = RecordKind::from_byte(data[6]) else {
        return Err(CoreError::corruption(
            offset,
            format!("unknown record kind {}", data[6]),
        ));
    };
    let len = u32::from_le_bytes([data[7], data[8], data[9], data[10]]) as usize;
    if len > MAX_RECORD_SIZE {
        return Err(CoreError::corruption(
            offset,
            format!("record length {len} exceeds maximum of {MAX_RECORD_SIZE}"),
        ));
    }
    let total = HEADER_SIZE + len + CRC_SIZE;
    if data.len() < total {
        return Ok(Frame::Torn);
    }

    let body_end = HEADER_SIZE + len;
    let stored = u32::from_le_bytes([
        data[body_end],
        data[body_end + 1],
        data[body_end + 2],
        data[body_end + 3],
    ]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data[..body_end]);
    let computed = hasher.finalize();
    if stored != computed {
        return Err(CoreError::corruption(
            offset,
            format!("checksum mismatch: expected {stored:08x}, got {computed:08x}"),
        ));
    }

    let record = LogRecord::decode_payload(kind, &data[HEADER_SIZE..body_end])
        .map_err(|message| CoreError::corruption(offset, message))?;
    Ok(Frame::Record(record, total))
}

/// Checks that the incomplete frame at `pos` really is the end of the log.
///
/// A damaged length field also decodes as [`Frame::Torn`]. If an intact
/// record still starts somewhere after `pos`, the bytes in between are
/// committed data and must not be discarded.
///
/// # Errors
///
/// Returns `Corruption` at `pos` if an intact record follows it.
pub fn check_torn_tail(data: &[u8], pos: usize) -> CoreResult<()> {
    let start = pos + 1;
    if start >= data.len() {
        return Ok(());
    }
    let next = data[start..]
        .windows(LOG_MAGIC.len())
        .enumerate()
        .filter(|(_, window)| *window == LOG_MAGIC)
        .map(|(i, _)| start + i)
        .find(|&at| matches!(decode_frame(&data[at..], at as u64), Ok(Frame::Record(..))));
    match next {
        Some(at) => Err(CoreError::corruption(
            pos as u64,
            format!("incomplete record is followed by an intact record at offset {at}"),
        )),
        None => Ok(()),
    }
}
