//! Type-safe wrappers for protocol primitives.
//!
//! These newtypes prevent mixing up integer values that share an underlying
//! representation but carry different semantic meanings, such as record
//! offsets and partition identifiers.

use std::fmt;

/// A record offset within a partition's log.
///
/// Offsets are unsigned 32-bit integers, zero-based, densely assigned at
/// append time and never reused. A log's *next offset* is both the number
/// of records it currently holds and the offset a fresh replica requests to
/// receive only new data. On the wire an offset is encoded big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Offset(pub u32);

impl Offset {
    /// Create a new offset from a raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Offset(value)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The offset immediately after this one.
    #[inline]
    pub const fn next(self) -> Self {
        Offset(self.0 + 1)
    }

    /// Big-endian wire encoding, as sent in a stream request.
    #[inline]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode an offset from its big-endian wire encoding.
    #[inline]
    pub const fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Offset(u32::from_be_bytes(bytes))
    }
}

impl From<u32> for Offset {
    fn from(value: u32) -> Self {
        Offset(value)
    }
}

impl From<Offset> for u32 {
    fn from(offset: Offset) -> Self {
        offset.0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A partition identifier within a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// Create a new partition id from a raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        PartitionId(value)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for PartitionId {
    fn from(value: u32) -> Self {
        PartitionId(value)
    }
}

impl From<PartitionId> for u32 {
    fn from(id: PartitionId) -> Self {
        id.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_new_and_value() {
        let offset = Offset::new(42);
        assert_eq!(offset.value(), 42);
    }

    #[test]
    fn test_offset_next() {
        assert_eq!(Offset::new(0).next(), Offset::new(1));
        assert_eq!(Offset::new(99).next().value(), 100);
    }

    #[test]
    fn test_offset_wire_roundtrip() {
        let offset = Offset::new(0x0102_0304);
        assert_eq!(offset.to_be_bytes(), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(Offset::from_be_bytes([0x01, 0x02, 0x03, 0x04]), offset);
    }

    #[test]
    fn test_offset_ordering() {
        assert!(Offset::new(1) < Offset::new(2));
        assert_eq!(Offset::new(3), Offset::new(3));
    }

    #[test]
    fn test_offset_display() {
        assert_eq!(format!("{}", Offset::new(789)), "789");
    }

    #[test]
    fn test_partition_id_conversions() {
        let id: PartitionId = 7u32.into();
        assert_eq!(id.value(), 7);
        let raw: u32 = id.into();
        assert_eq!(raw, 7);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Offset::default().value(), 0);
        assert_eq!(PartitionId::default().value(), 0);
    }
}
