use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed payload size carried by every packet and message.
pub const PAYLOAD_SIZE: usize = 20;

/// Payload of a pure ACK.
const ACK_FILLER: u8 = b'0';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("message of {len} bytes does not fit in a packet payload")]
    TooLong { len: usize },
}

/// Application-layer message, opaque to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub data: [u8; PAYLOAD_SIZE],
}

impl Message {
    /// Build a message from a shorter slice, zero-padding the tail.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() > PAYLOAD_SIZE {
            return Err(MessageError::TooLong { len: bytes.len() });
        }
        let mut data = [0u8; PAYLOAD_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { data })
    }

    /// A message made of one repeated byte, as the classic emulator generates them.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: [byte; PAYLOAD_SIZE],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A packet on the simulated link.
///
/// `None` in `seq_num` / `ack_num` marks a field that is not meaningful for this
/// packet: data packets carry no ACK number, pure ACKs carry no sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub seq_num: Option<u32>,
    pub ack_num: Option<u32>,
    /// Set by the sending entity; the channel may invalidate it by corrupting other fields.
    pub checksum: u32,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl Packet {
    /// Unsealed data packet (checksum not yet computed).
    pub fn data(seq: u32, payload: [u8; PAYLOAD_SIZE]) -> Self {
        Self {
            seq_num: Some(seq),
            ack_num: None,
            checksum: 0,
            payload,
        }
    }

    /// Unsealed pure ACK for `ack`.
    pub fn ack(ack: u32) -> Self {
        Self {
            seq_num: None,
            ack_num: Some(ack),
            checksum: 0,
            payload: [ACK_FILLER; PAYLOAD_SIZE],
        }
    }
}
