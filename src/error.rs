//! Crate level errors.
//!
//! Two kinds of failure move through the broker:
//!
//! - **Validation errors** ([`Error::PayloadTooLarge`], [`Error::OffsetNotFound`])
//!   are local and synchronous, returned to the immediate caller.
//! - **Transport failures** ([`Error::Io`], [`Error::MalformedFrame`]) are
//!   absorbed where they occur: the replica fetcher resolves them with
//!   backoff-and-retry, and a replica disconnecting from a leader stream is
//!   a normal, logged event. Neither ever interrupts another partition or
//!   the log's integrity.

use std::{io, result};

use thiserror::Error as ThisError;

use crate::types::{Offset, PartitionId};

pub type Result<T> = result::Result<T, Error>;

/// Errors reported by the broker.
#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    /// A record payload exceeds the single-length-byte framing limit.
    #[error("payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Maximum allowed payload size.
        limit: usize,
    },

    /// A direct read of an offset at or beyond the log's next offset.
    #[error("offset {offset} not found (next offset {next})")]
    OffsetNotFound {
        /// The requested offset.
        offset: Offset,
        /// The log's next offset at the time of the read.
        next: Offset,
    },

    /// A frame could not be decoded from the bytes available.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An error in the network.
    #[error("IO error: {0:?}")]
    Io(io::ErrorKind),

    /// A partition with this id already exists on the broker.
    #[error("partition {0} already exists")]
    PartitionExists(PartitionId),

    /// No partition with this id exists on the broker.
    #[error("partition {0} not found")]
    PartitionNotFound(PartitionId),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err: Error = io_err.into();
        assert_eq!(err, Error::Io(io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn test_display() {
        let err = Error::PayloadTooLarge {
            size: 300,
            limit: 255,
        };
        assert_eq!(err.to_string(), "payload too large: 300 bytes (limit 255)");

        let err = Error::OffsetNotFound {
            offset: Offset::new(5),
            next: Offset::new(3),
        };
        assert_eq!(err.to_string(), "offset 5 not found (next offset 3)");
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            Error::PartitionExists(PartitionId::new(1)),
            Error::PartitionExists(PartitionId::new(1))
        );
        assert_ne!(
            Error::PartitionExists(PartitionId::new(1)),
            Error::PartitionNotFound(PartitionId::new(1))
        );
    }
}
