//! The append-only, offset-indexed log for one partition.
//!
//! A [`Log`] is the single mutable shared resource per partition. Appends
//! are serialized behind a short-lived write lock; readers (including
//! tailing streams) proceed concurrently and always observe a consistent,
//! monotonically growing prefix.
//!
//! Appends publish a committed-length watermark through a
//! [`tokio::sync::watch`] channel. A [`Tail`] blocked waiting for new data
//! is woken exactly when an append publishes a new offset, rather than
//! busy-polling. The watermark is published only after the record is
//! visible in the record arena, so a woken reader always finds the record
//! it was promised.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::types::Offset;

struct Shared {
    /// Append-only record arena. Never truncated, never reordered.
    records: RwLock<Vec<Record>>,
    /// Published count of committed records. Readers never chase an index
    /// at or beyond the last value they observed here without re-reading.
    committed: watch::Sender<u32>,
}

/// An append-only, offset-indexed sequence of records.
///
/// Cloning a `Log` is cheap and yields another handle onto the same
/// underlying records; a partition hands clones to its leader stream server
/// or replica fetcher while retaining ownership itself.
#[derive(Clone)]
pub struct Log {
    shared: Arc<Shared>,
}

impl Log {
    /// Create an empty log.
    pub fn new() -> Self {
        let (committed, _) = watch::channel(0);
        Log {
            shared: Arc::new(Shared {
                records: RwLock::new(Vec::new()),
                committed,
            }),
        }
    }

    /// Append a payload as a new record, returning its assigned offset.
    ///
    /// The record is visible immediately to every reader, including
    /// in-progress tailing streams.
    ///
    /// # Errors
    /// Returns [`Error::PayloadTooLarge`] if the payload exceeds the
    /// 255-byte framing limit.
    pub fn append(&self, payload: impl Into<Bytes>) -> Result<Offset> {
        let record = Record::new(payload)?;
        Ok(self.append_record(record))
    }

    /// Append an already-validated record, returning its assigned offset.
    pub fn append_record(&self, record: Record) -> Offset {
        let mut records = self.shared.records.write();
        records.push(record);
        let next = records.len() as u32;
        // Published while the arena lock is held: the watermark never
        // regresses under concurrent appends, and a woken tail always
        // finds the record it was promised.
        self.shared.committed.send_replace(next);
        Offset::new(next - 1)
    }

    /// Read the record at an offset.
    ///
    /// # Errors
    /// Returns [`Error::OffsetNotFound`] if the offset is at or beyond
    /// [`next_offset`](Self::next_offset).
    pub fn read(&self, offset: Offset) -> Result<Record> {
        let records = self.shared.records.read();
        records
            .get(offset.value() as usize)
            .cloned()
            .ok_or(Error::OffsetNotFound {
                offset,
                next: Offset::new(records.len() as u32),
            })
    }

    /// The offset that will be assigned to the next append.
    ///
    /// Equal to the number of records currently committed; a fresh replica
    /// requests this offset to receive only new data.
    pub fn next_offset(&self) -> Offset {
        Offset::new(*self.shared.committed.borrow())
    }

    /// Number of committed records.
    pub fn len(&self) -> u32 {
        *self.shared.committed.borrow()
    }

    /// True if no record has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open an infinite, in-order cursor over every record at `from` and
    /// beyond, including records appended after the call.
    ///
    /// An offset beyond the current next offset is not an error: the tail
    /// simply yields nothing until the log catches up.
    pub fn tail(&self, from: Offset) -> Tail {
        Tail {
            rx: self.shared.committed.subscribe(),
            log: self.clone(),
            next: from.value(),
        }
    }

    fn get(&self, index: u32) -> Option<Record> {
        self.shared.records.read().get(index as usize).cloned()
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

/// An infinite cursor over a [`Log`], produced by [`Log::tail`].
///
/// Yields every record from the starting offset onward in ascending offset
/// order with no gaps, suspending while it waits for appends. A tail is not
/// restartable; open a new one to stream from a different offset.
pub struct Tail {
    rx: watch::Receiver<u32>,
    log: Log,
    next: u32,
}

impl Tail {
    /// The offset of the record the next call to
    /// [`next_record`](Self::next_record) will yield.
    pub fn next_offset(&self) -> Offset {
        Offset::new(self.next)
    }

    /// Yield the next record, waiting for an append if the log has not
    /// reached the cursor yet.
    pub async fn next_record(&mut self) -> Record {
        loop {
            if *self.rx.borrow_and_update() > self.next {
                if let Some(record) = self.log.get(self.next) {
                    self.next += 1;
                    return record;
                }
            }
            // The sender lives inside `self.log`, so this cannot fail while
            // the tail exists.
            let _ = self.rx.changed().await;
        }
    }
}
