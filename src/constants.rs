//! Centralized protocol and configuration constants.
//!
//! This module consolidates the magic numbers used throughout the broker.
//! Having them in one place makes it easier to:
//!
//! - Understand the protocol constraints
//! - Update values consistently
//! - Document the rationale for each constant

// =============================================================================
// Replication Wire Protocol
// =============================================================================

/// Maximum payload size of a single record.
///
/// Records are framed on the wire as a single unsigned length byte followed
/// by that many payload bytes, so no record payload can exceed 255 bytes.
pub const MAX_RECORD_PAYLOAD: usize = 255;

/// Size of the offset request a replica sends when it opens a stream.
///
/// Exactly one big-endian unsigned 32-bit integer: the offset of the first
/// record the replica wants.
pub const OFFSET_REQUEST_SIZE: usize = 4;

// =============================================================================
// Client Protocol
// =============================================================================

/// Size of a client message header.
///
/// Message type (4 bytes, big-endian u32) followed by the payload size
/// (4 bytes, big-endian u32).
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Maximum payload size of a client message.
///
/// Bounds the allocation a single request can force on the server. Large
/// enough for a partition id plus a maximum-size record frame.
pub const MAX_MESSAGE_PAYLOAD: usize = 512;

// =============================================================================
// Replica Fetcher
// =============================================================================

/// Default minimum reconnect backoff for the replica fetcher (milliseconds).
///
/// First delay after a failed connect or an unproductive session. Short
/// enough that a briefly restarting leader is picked up quickly.
pub const DEFAULT_FETCH_MIN_BACKOFF_MS: u64 = 100;

/// Default maximum reconnect backoff for the replica fetcher (milliseconds).
///
/// Cap on the exponential backoff while the leader stays unreachable. The
/// fetcher retries forever; this only bounds how hard it hammers a dead
/// address.
pub const DEFAULT_FETCH_MAX_BACKOFF_MS: u64 = 10_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_payload_fits_length_byte() {
        // The wire length prefix is a single unsigned byte.
        assert_eq!(MAX_RECORD_PAYLOAD, u8::MAX as usize);
    }

    #[test]
    fn message_payload_holds_max_record_frame() {
        // partition id (4) + length byte (1) + max payload
        assert!(MAX_MESSAGE_PAYLOAD >= 4 + 1 + MAX_RECORD_PAYLOAD);
    }

    #[test]
    fn backoff_bounds_are_ordered() {
        assert!(DEFAULT_FETCH_MIN_BACKOFF_MS < DEFAULT_FETCH_MAX_BACKOFF_MS);
    }
}
