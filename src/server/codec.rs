//! Wire codec for the client protocol.
//!
//! Every client message is an 8-byte header (message type and payload size,
//! both big-endian u32) followed by the payload. Payloads are parsed with
//! `nom`; responses are encoded with `bytes`.

use bytes::{BufMut, Bytes, BytesMut};
use nom::combinator::all_consuming;
use nom::number::complete::be_u32;
use nom::sequence::tuple;

use crate::constants::{MAX_MESSAGE_PAYLOAD, MESSAGE_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::types::{Offset, PartitionId};

type NomError<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

/// Client message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    /// Append a record to a partition. No response.
    ProduceRequest = 0,
    /// Read the record at an offset. Answered by [`ConsumeResponse`].
    ConsumeRequest = 1,
    /// Response to a consume request.
    ConsumeResponse = 2,
    /// Query a partition's next offset. Answered by [`StatResponse`].
    StatRequest = 3,
    /// Response to a stat request.
    StatResponse = 4,
}

impl MessageType {
    fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(MessageType::ProduceRequest),
            1 => Some(MessageType::ConsumeRequest),
            2 => Some(MessageType::ConsumeResponse),
            3 => Some(MessageType::StatRequest),
            4 => Some(MessageType::StatResponse),
            _ => None,
        }
    }
}

/// A decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// The message type.
    pub message_type: MessageType,
    /// Size of the payload that follows the header.
    pub payload_size: u32,
}

/// Decode a message header from exactly [`MESSAGE_HEADER_SIZE`] bytes.
///
/// # Errors
/// Returns [`Error::MalformedFrame`] on a truncated header, an unknown
/// message type, or a payload size over [`MAX_MESSAGE_PAYLOAD`].
pub fn parse_header(input: &[u8]) -> Result<MessageHeader> {
    let (_, (raw_type, payload_size)) = tuple((be_u32, be_u32))(input)
        .map_err(|_: NomError| Error::MalformedFrame("truncated message header".to_string()))?;

    let message_type = MessageType::from_u32(raw_type)
        .ok_or_else(|| Error::MalformedFrame(format!("unknown message type {raw_type}")))?;

    if payload_size as usize > MAX_MESSAGE_PAYLOAD {
        return Err(Error::MalformedFrame(format!(
            "payload size {payload_size} exceeds limit {MAX_MESSAGE_PAYLOAD}"
        )));
    }

    Ok(MessageHeader {
        message_type,
        payload_size,
    })
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Append `record` to `partition`.
    Produce {
        /// Target partition.
        partition: PartitionId,
        /// The record to append.
        record: Record,
    },
    /// Read the record at `offset` of `partition`.
    Consume {
        /// Target partition.
        partition: PartitionId,
        /// The requested offset.
        offset: Offset,
    },
    /// Query `partition`'s next offset.
    Stat {
        /// Target partition.
        partition: PartitionId,
    },
}

/// Decode a request payload for the given message type.
///
/// # Errors
/// Returns [`Error::MalformedFrame`] for response message types, truncated
/// payloads or trailing garbage.
pub fn parse_request(message_type: MessageType, payload: &[u8]) -> Result<Request> {
    match message_type {
        MessageType::ProduceRequest => {
            let (rest, partition) = be_u32(payload).map_err(|_: NomError| {
                Error::MalformedFrame("produce request missing partition id".to_string())
            })?;
            let (record, consumed) = Record::decode(rest)?;
            if consumed != rest.len() {
                return Err(Error::MalformedFrame(
                    "trailing bytes after produce record".to_string(),
                ));
            }
            Ok(Request::Produce {
                partition: PartitionId::new(partition),
                record,
            })
        }
        MessageType::ConsumeRequest => {
            let (_, (partition, offset)) = all_consuming(tuple((be_u32, be_u32)))(payload)
                .map_err(|_: NomError| {
                    Error::MalformedFrame("invalid consume request".to_string())
                })?;
            Ok(Request::Consume {
                partition: PartitionId::new(partition),
                offset: Offset::new(offset),
            })
        }
        MessageType::StatRequest => {
            let (_, partition) = all_consuming(be_u32)(payload).map_err(|_: NomError| {
                Error::MalformedFrame("invalid stat request".to_string())
            })?;
            Ok(Request::Stat {
                partition: PartitionId::new(partition),
            })
        }
        MessageType::ConsumeResponse | MessageType::StatResponse => Err(Error::MalformedFrame(
            format!("unexpected response type {message_type:?} from client"),
        )),
    }
}

fn encode_message(message_type: MessageType, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(MESSAGE_HEADER_SIZE + payload.len());
    buf.put_u32(message_type as u32);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Encode a produce request frame (client side).
pub fn encode_produce(partition: PartitionId, record: &Record) -> Bytes {
    let mut payload = BytesMut::with_capacity(4 + record.wire_len());
    payload.put_u32(partition.value());
    record.encode(&mut payload);
    encode_message(MessageType::ProduceRequest, &payload)
}

/// Encode a consume request frame (client side).
pub fn encode_consume(partition: PartitionId, offset: Offset) -> Bytes {
    let mut payload = BytesMut::with_capacity(8);
    payload.put_u32(partition.value());
    payload.put_u32(offset.value());
    encode_message(MessageType::ConsumeRequest, &payload)
}

/// Encode a stat request frame (client side).
pub fn encode_stat(partition: PartitionId) -> Bytes {
    let mut payload = BytesMut::with_capacity(4);
    payload.put_u32(partition.value());
    encode_message(MessageType::StatRequest, &payload)
}

/// Response to a consume request.
///
/// A missing offset is answered with an empty record rather than an error
/// frame, so consumers polling the head of a partition need no special
/// case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeResponse {
    /// The partition the record came from.
    pub partition: PartitionId,
    /// The requested record, empty if the offset was not present.
    pub record: Record,
}

impl ConsumeResponse {
    /// Encode as a full message frame.
    pub fn encode(&self) -> Bytes {
        let mut payload = BytesMut::with_capacity(4 + self.record.wire_len());
        payload.put_u32(self.partition.value());
        self.record.encode(&mut payload);
        encode_message(MessageType::ConsumeResponse, &payload)
    }

    /// Decode from a message payload.
    ///
    /// # Errors
    /// Returns [`Error::MalformedFrame`] on a truncated payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let (rest, partition) = be_u32(payload).map_err(|_: NomError| {
            Error::MalformedFrame("consume response missing partition id".to_string())
        })?;
        let (record, consumed) = Record::decode(rest)?;
        if consumed != rest.len() {
            return Err(Error::MalformedFrame(
                "trailing bytes after consume response record".to_string(),
            ));
        }
        Ok(ConsumeResponse {
            partition: PartitionId::new(partition),
            record,
        })
    }
}

/// Response to a stat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatResponse {
    /// The queried partition.
    pub partition: PartitionId,
    /// The partition log's next offset.
    pub next_offset: Offset,
}

impl StatResponse {
    /// Encode as a full message frame.
    pub fn encode(&self) -> Bytes {
        let mut payload = BytesMut::with_capacity(8);
        payload.put_u32(self.partition.value());
        payload.put_u32(self.next_offset.value());
        encode_message(MessageType::StatResponse, &payload)
    }

    /// Decode from a message payload.
    ///
    /// # Errors
    /// Returns [`Error::MalformedFrame`] on a truncated payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let (_, (partition, next_offset)) = all_consuming(tuple((be_u32, be_u32)))(payload)
            .map_err(|_: NomError| {
                Error::MalformedFrame("invalid stat response".to_string())
            })?;
        Ok(StatResponse {
            partition: PartitionId::new(partition),
            next_offset: Offset::new(next_offset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let header = parse_header(&[0, 0, 0, 1, 0, 0, 0, 8]).unwrap();
        assert_eq!(header.message_type, MessageType::ConsumeRequest);
        assert_eq!(header.payload_size, 8);
    }

    #[test]
    fn test_parse_header_truncated() {
        assert!(matches!(
            parse_header(&[0, 0, 0]).unwrap_err(),
            Error::MalformedFrame(_)
        ));
    }

    #[test]
    fn test_parse_header_unknown_type() {
        assert!(matches!(
            parse_header(&[0, 0, 0, 99, 0, 0, 0, 0]).unwrap_err(),
            Error::MalformedFrame(_)
        ));
    }

    #[test]
    fn test_parse_header_oversized_payload() {
        let mut input = vec![0, 0, 0, 0];
        input.extend_from_slice(&(MAX_MESSAGE_PAYLOAD as u32 + 1).to_be_bytes());
        assert!(matches!(
            parse_header(&input).unwrap_err(),
            Error::MalformedFrame(_)
        ));
    }

    #[test]
    fn test_produce_roundtrip() {
        let record = Record::new(&b"payload"[..]).unwrap();
        let frame = encode_produce(PartitionId::new(3), &record);

        let header = parse_header(&frame[..MESSAGE_HEADER_SIZE]).unwrap();
        assert_eq!(header.message_type, MessageType::ProduceRequest);

        let request = parse_request(header.message_type, &frame[MESSAGE_HEADER_SIZE..]).unwrap();
        assert_eq!(
            request,
            Request::Produce {
                partition: PartitionId::new(3),
                record,
            }
        );
    }

    #[test]
    fn test_produce_trailing_bytes_rejected() {
        let record = Record::new(&b"x"[..]).unwrap();
        let mut payload = vec![0, 0, 0, 1];
        payload.extend_from_slice(&record.to_bytes());
        payload.push(0xFF);
        assert!(parse_request(MessageType::ProduceRequest, &payload).is_err());
    }

    #[test]
    fn test_consume_roundtrip() {
        let frame = encode_consume(PartitionId::new(1), Offset::new(42));
        let header = parse_header(&frame[..MESSAGE_HEADER_SIZE]).unwrap();
        let request = parse_request(header.message_type, &frame[MESSAGE_HEADER_SIZE..]).unwrap();
        assert_eq!(
            request,
            Request::Consume {
                partition: PartitionId::new(1),
                offset: Offset::new(42),
            }
        );
    }

    #[test]
    fn test_stat_roundtrip() {
        let frame = encode_stat(PartitionId::new(5));
        let header = parse_header(&frame[..MESSAGE_HEADER_SIZE]).unwrap();
        let request = parse_request(header.message_type, &frame[MESSAGE_HEADER_SIZE..]).unwrap();
        assert_eq!(
            request,
            Request::Stat {
                partition: PartitionId::new(5),
            }
        );
    }

    #[test]
    fn test_response_types_rejected_as_requests() {
        assert!(parse_request(MessageType::ConsumeResponse, &[]).is_err());
        assert!(parse_request(MessageType::StatResponse, &[]).is_err());
    }

    #[test]
    fn test_consume_response_roundtrip() {
        let response = ConsumeResponse {
            partition: PartitionId::new(2),
            record: Record::new(&b"value"[..]).unwrap(),
        };
        let frame = response.encode();
        let header = parse_header(&frame[..MESSAGE_HEADER_SIZE]).unwrap();
        assert_eq!(header.message_type, MessageType::ConsumeResponse);
        assert_eq!(
            ConsumeResponse::decode(&frame[MESSAGE_HEADER_SIZE..]).unwrap(),
            response
        );
    }

    #[test]
    fn test_stat_response_roundtrip() {
        let response = StatResponse {
            partition: PartitionId::new(2),
            next_offset: Offset::new(17),
        };
        let frame = response.encode();
        let header = parse_header(&frame[..MESSAGE_HEADER_SIZE]).unwrap();
        assert_eq!(header.message_type, MessageType::StatResponse);
        assert_eq!(
            StatResponse::decode(&frame[MESSAGE_HEADER_SIZE..]).unwrap(),
            response
        );
    }
}
