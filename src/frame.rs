//! Packet codec (spec §4.1).
//!
//! Wire layout, all fields big-endian:
//!
//! ```text
//! +---------+----------+---------------+-----------------+
//! | channel |   seq    |   timestamp   |     payload      |
//! |  (1B)   |  (2B)    |     (4B)      |  (var, UTF-8)    |
//! +---------+----------+---------------+-----------------+
//! ```
//!
//! A frame is an ACK control frame iff `channel == CHANNEL_RELIABLE` and its
//! payload begins with the literal prefix `ACK:`. There is no dedicated
//! control channel -- ACKs ride the reliable channel's wire format and reuse
//! its `seq` field to carry the sequence number being acknowledged (spec §9:
//! this aliases a reliable data sequence on the wire, which is safe only
//! because ACKs are never tracked or fed into the reorder buffer).

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::HEADER_SIZE;

/// The traffic class bit of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    Reliable = 0,
    Unreliable = 1,
}

impl Channel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Channel::Reliable),
            1 => Some(Channel::Unreliable),
            _ => None,
        }
    }
}

/// One decoded UDP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: Channel,
    pub seq: u16,
    /// Sender wall-clock milliseconds, low 32 bits. Opaque to the receiver
    /// except for the latency estimate computed in the worker; never used
    /// to drive protocol decisions (spec §9).
    pub timestamp: u32,
    pub payload: String,
}

impl Frame {
    /// Build a data frame stamped with the current wall clock.
    pub fn data(channel: Channel, seq: u16, payload: impl Into<String>) -> Self {
        Self {
            channel,
            seq,
            timestamp: now_ms_low32(),
            payload: payload.into(),
        }
    }

    /// Build an ACK control frame for `seq` (spec §4.1 `make_ack`).
    pub fn make_ack(seq: u16) -> Self {
        Self {
            channel: Channel::Reliable,
            seq,
            timestamp: now_ms_low32(),
            payload: format!("ACK:{seq}"),
        }
    }

    /// True iff this frame is an ACK control frame.
    pub fn is_ack(&self) -> bool {
        self.channel == Channel::Reliable && self.payload.starts_with("ACK:")
    }

    /// Parse the acknowledged sequence number out of an ACK frame's payload.
    /// Returns `None` if this is not an ACK frame, or the body is malformed.
    pub fn ack_seq(&self) -> Option<u16> {
        if !self.is_ack() {
            return None;
        }
        self.payload.strip_prefix("ACK:")?.parse().ok()
    }

    /// Serialize this frame to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(self.channel.as_u8());
        buf.put_u16(self.seq);
        buf.put_u32(self.timestamp);
        buf.put_slice(self.payload.as_bytes());
        buf.freeze()
    }

    /// Parse a frame from a received datagram. Returns `None` if the
    /// datagram is shorter than [`HEADER_SIZE`], the channel byte is
    /// unrecognized, or the payload is not valid UTF-8 (spec §4.1, §7
    /// "Decode error").
    pub fn decode(mut data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        let channel = Channel::from_u8(data[0])?;
        data.advance(1);
        let seq = (&data[0..2]).get_u16();
        data.advance(2);
        let timestamp = (&data[0..4]).get_u32();
        data.advance(4);
        let payload = String::from_utf8(data.to_vec()).ok()?;
        Some(Self {
            channel,
            seq,
            timestamp,
            payload,
        })
    }
}

/// Low 32 bits of the current wall-clock millisecond count.
pub fn now_ms_low32() -> u32 {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    (ms & 0xFFFF_FFFF) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_reliable() {
        let frame = Frame::data(Channel::Reliable, 42, "hello");
        let bytes = frame.encode();
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn round_trip_unreliable() {
        let frame = Frame::data(Channel::Unreliable, 7, "pos:1,2");
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_rejects_short_datagram() {
        assert!(Frame::decode(&[0, 1, 2]).is_none());
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let mut bytes = vec![0u8, 0, 1, 0, 0, 0, 0];
        bytes.push(0xFF); // invalid UTF-8 continuation byte with no lead
        assert!(Frame::decode(&bytes).is_none());
    }

    #[test]
    fn decode_rejects_unknown_channel() {
        let bytes = vec![2u8, 0, 0, 0, 0, 0, 0];
        assert!(Frame::decode(&bytes).is_none());
    }

    #[test]
    fn make_ack_is_classified_as_ack() {
        let ack = Frame::make_ack(99);
        assert!(ack.is_ack());
        assert_eq!(ack.ack_seq(), Some(99));
        assert_eq!(ack.channel, Channel::Reliable);
        assert_eq!(ack.seq, 99);
    }

    #[test]
    fn plain_reliable_frame_is_not_ack() {
        let frame = Frame::data(Channel::Reliable, 1, "not an ack");
        assert!(!frame.is_ack());
        assert_eq!(frame.ack_seq(), None);
    }

    #[test]
    fn ack_seq_rejects_malformed_body() {
        let malformed = Frame {
            channel: Channel::Reliable,
            seq: 5,
            timestamp: 0,
            payload: "ACK:not-a-number".to_string(),
        };
        assert!(malformed.is_ack());
        assert_eq!(malformed.ack_seq(), None);
    }

    #[test]
    fn unreliable_payload_starting_with_ack_prefix_is_not_ack() {
        // Classification requires channel == reliable AND the ACK: prefix.
        let frame = Frame::data(Channel::Unreliable, 1, "ACK:5");
        assert!(!frame.is_ack());
    }
}
