//! Records: the atomic unit of log data.
//!
//! A record is an immutable byte payload of at most 255 bytes. On the wire
//! it is framed as a single unsigned length byte followed by exactly that
//! many payload bytes. The framing is shared by the replication stream and
//! the client protocol.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::MAX_RECORD_PAYLOAD;
use crate::error::{Error, Result};

/// An immutable, length-prefixed byte payload.
///
/// Records are created on client writes or on receipt from a leader stream
/// and never change once appended to a log. The payload is a [`Bytes`], so
/// cloning a record is cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    payload: Bytes,
}

impl Record {
    /// Create a record from a payload.
    ///
    /// # Errors
    /// Returns [`Error::PayloadTooLarge`] if the payload exceeds the
    /// 255-byte framing limit.
    pub fn new(payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_RECORD_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_RECORD_PAYLOAD,
            });
        }
        Ok(Record { payload })
    }

    /// Create a record from a payload already bounded by the wire framing.
    ///
    /// The replica fetcher reads at most 255 payload bytes per frame, so the
    /// size check is already satisfied.
    pub(crate) fn from_wire(payload: Bytes) -> Self {
        debug_assert!(payload.len() <= MAX_RECORD_PAYLOAD);
        Record { payload }
    }

    /// The record payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Size of the wire encoding: one length byte plus the payload.
    pub fn wire_len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Write the wire encoding into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        // new() and from_wire() bound the payload to a single length byte.
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
    }

    /// The wire encoding as an owned buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one record from the front of a byte slice.
    ///
    /// Returns the record and the number of bytes consumed.
    ///
    /// # Errors
    /// Returns [`Error::MalformedFrame`] if fewer than `1 + length` bytes
    /// are available.
    pub fn decode(input: &[u8]) -> Result<(Record, usize)> {
        let (&len, rest) = input
            .split_first()
            .ok_or_else(|| Error::MalformedFrame("missing length byte".to_string()))?;
        let len = len as usize;
        if rest.len() < len {
            return Err(Error::MalformedFrame(format!(
                "length byte {} but only {} payload bytes available",
                len,
                rest.len()
            )));
        }
        let record = Record {
            payload: Bytes::copy_from_slice(&rest[..len]),
        };
        Ok((record, 1 + len))
    }
}
