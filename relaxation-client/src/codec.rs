//! Fixed-width binary record exchanged with the coordinator.
//!
//! Every message is exactly [`MESSAGE_LEN`] bytes: a signed 32-bit `index`
//! followed by an IEEE-754 binary32 `temperature`. There is no length prefix,
//! delimiter, or byte-order tag, so both peers must agree on [`ByteOrder`]
//! out of band.

use clap::ValueEnum;
use thiserror::Error;

/// Width of one encoded [`Message`] on the wire.
pub const MESSAGE_LEN: usize = 8;

/// Index the coordinator sends to announce convergence.
pub const SENTINEL_INDEX: i32 = -1;

const INDEX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
    pub index: i32,
    pub temperature: f32,
}

impl Message {
    pub fn new(index: i32, temperature: f32) -> Self {
        Self { index, temperature }
    }

    /// True when the coordinator is telling us to stop.
    pub fn is_sentinel(&self) -> bool {
        self.index == SENTINEL_INDEX
    }
}

/// Numeric byte order used for both fields of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ByteOrder {
    /// Matches coordinators built for x86-64 and aarch64 hosts.
    #[default]
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed message: expected {expected} bytes, got {actual}", expected = MESSAGE_LEN)]
pub struct MalformedMessage {
    pub actual: usize,
}

/// Encoder/decoder for the record layout under a fixed byte order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    order: ByteOrder,
}

impl Codec {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn encode(&self, message: &Message) -> [u8; MESSAGE_LEN] {
        let (index, temperature) = match self.order {
            ByteOrder::Little => (
                message.index.to_le_bytes(),
                message.temperature.to_bits().to_le_bytes(),
            ),
            ByteOrder::Big => (
                message.index.to_be_bytes(),
                message.temperature.to_bits().to_be_bytes(),
            ),
        };

        let mut frame = [0u8; MESSAGE_LEN];
        frame[..INDEX_LEN].copy_from_slice(&index);
        frame[INDEX_LEN..].copy_from_slice(&temperature);
        frame
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Message, MalformedMessage> {
        let frame: &[u8; MESSAGE_LEN] = bytes.try_into().map_err(|_| MalformedMessage {
            actual: bytes.len(),
        })?;

        let mut index = [0u8; INDEX_LEN];
        let mut temperature = [0u8; MESSAGE_LEN - INDEX_LEN];
        index.copy_from_slice(&frame[..INDEX_LEN]);
        temperature.copy_from_slice(&frame[INDEX_LEN..]);

        let message = match self.order {
            ByteOrder::Little => Message {
                index: i32::from_le_bytes(index),
                temperature: f32::from_bits(u32::from_le_bytes(temperature)),
            },
            ByteOrder::Big => Message {
                index: i32::from_be_bytes(index),
                temperature: f32::from_bits(u32::from_be_bytes(temperature)),
            },
        };
        Ok(message)
    }
}
