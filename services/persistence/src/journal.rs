//! Append-only audit journal with checksums
//!
//! Every order creation, status transition, execution and interruption is
//! recorded as one framed entry. Replay reads entries back in order and
//! stops at the first corrupt or truncated frame, so a crash mid-write
//! loses at most the last entry.
//!
//! # Binary Format (per entry)
//! ```text
//! [body_len:  u32]
//! [sequence:  u64]
//! [timestamp: i64]
//! [payload_len: u32][payload: bincode bytes]
//! [checksum: u32]  // CRC32C over sequence+timestamp+payload
//! ```

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::event::StatusEvent;
use types::ids::OrderId;
use types::order::{ExecutionDetail, Order};

// Minimum body: 8 (seq) + 8 (ts) + 4 (payload_len) + 0 + 4 (crc)
const MIN_BODY_LEN: usize = 24;
// Reject absurd frame sizes rather than allocating from corrupt data
const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt frame at sequence {sequence}: {reason}")]
    CorruptFrame { sequence: u64, reason: String },
}

/// What the journal records about the life of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditRecord {
    /// Order accepted at intake
    OrderCreated { order: Order },
    /// One status transition, as published to subscribers
    StatusChanged { event: StatusEvent },
    /// Final fill detail for a completed order
    ExecutionRecorded {
        order_id: OrderId,
        detail: ExecutionDetail,
    },
    /// Order was in flight when the scheduler shut down; eligible for
    /// re-enqueue on restart
    Interrupted { order_id: OrderId, reason: String },
}

/// A single framed journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Monotonic sequence number within one journal file
    pub sequence: u64,
    /// Unix nanos when the entry was written
    pub timestamp: i64,
    /// Bincode-serialized [`AuditRecord`]
    pub payload: Vec<u8>,
    /// CRC32C over (sequence ++ timestamp ++ payload)
    pub checksum: u32,
}

impl AuditEntry {
    /// Create a new entry, computing the checksum automatically.
    pub fn new(sequence: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, &payload);
        Self {
            sequence,
            timestamp,
            payload,
            checksum,
        }
    }

    /// CRC32C over the concatenation of (sequence, timestamp, payload).
    pub fn compute_checksum(sequence: u64, timestamp: i64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    /// Validate the stored checksum against the recomputed value.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.payload)
    }

    /// Decode the payload back into a typed record.
    pub fn record(&self) -> Result<AuditRecord, JournalError> {
        bincode::deserialize(&self.payload).map_err(|e| JournalError::Serialization(e.to_string()))
    }

    /// Serialize the entry to the binary frame format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        let body_len: u32 = 8 + 8 + 4 + payload_len + 4;

        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize one frame from `data`.
    ///
    /// Returns `(entry, bytes_consumed)` on success. Corrupted or truncated
    /// data yields an error, never a panic.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        if data.len() < 4 {
            return Err(JournalError::Serialization(
                "not enough data for length prefix".into(),
            ));
        }

        let body_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body_len) {
            return Err(JournalError::Serialization(format!(
                "implausible body length: {}",
                body_len
            )));
        }

        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Serialization(format!(
                "incomplete frame: need {} bytes, have {}",
                total,
                data.len()
            )));
        }

        let body = &data[4..total];
        let sequence = u64::from_le_bytes(body[0..8].try_into().unwrap());
        let timestamp = i64::from_le_bytes(body[8..16].try_into().unwrap());
        let payload_len = u32::from_le_bytes(body[16..20].try_into().unwrap()) as usize;

        if 20 + payload_len + 4 != body.len() {
            return Err(JournalError::CorruptFrame {
                sequence,
                reason: format!(
                    "payload length {} inconsistent with body {}",
                    payload_len,
                    body.len()
                ),
            });
        }

        let payload = body[20..20 + payload_len].to_vec();
        let checksum = u32::from_le_bytes(body[20 + payload_len..].try_into().unwrap());

        let entry = Self {
            sequence,
            timestamp,
            payload,
            checksum,
        };
        if !entry.verify_checksum() {
            return Err(JournalError::CorruptFrame {
                sequence,
                reason: "checksum mismatch".into(),
            });
        }

        Ok((entry, total))
    }
}

/// Append-only audit journal over a single file.
pub struct AuditJournal {
    writer: BufWriter<File>,
    path: PathBuf,
    next_sequence: u64,
}

impl AuditJournal {
    /// Open (or create) the journal at `path`, replaying existing entries
    /// to find the next sequence number.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let next_sequence = match Self::replay(&path) {
            Ok(entries) => entries.last().map(|(e, _)| e.sequence + 1).unwrap_or(0),
            Err(JournalError::Io(ref e)) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            next_sequence,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next sequence number that will be assigned.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Append one record; returns the sequence number assigned to it.
    pub fn append(&mut self, record: &AuditRecord, timestamp: i64) -> Result<u64, JournalError> {
        let payload =
            bincode::serialize(record).map_err(|e| JournalError::Serialization(e.to_string()))?;
        let entry = AuditEntry::new(self.next_sequence, timestamp, payload);

        self.writer.write_all(&entry.to_bytes())?;
        self.writer.flush()?;

        let seq = self.next_sequence;
        self.next_sequence += 1;
        Ok(seq)
    }

    /// Flush and fsync (used before shutdown).
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Read all entries back, in order, together with their decoded
    /// records. Stops silently at the first corrupt or truncated frame.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<(AuditEntry, AuditRecord)>, JournalError> {
        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            match AuditEntry::from_bytes(&data[pos..]) {
                Ok((entry, consumed)) => {
                    let record = match entry.record() {
                        Ok(r) => r,
                        Err(_) => break,
                    };
                    entries.push((entry, record));
                    pos += consumed;
                }
                // Tail corruption or partial write: keep what we have
                Err(_) => break,
            }
        }
        Ok(entries)
    }
}
