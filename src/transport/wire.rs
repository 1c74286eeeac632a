//! Center-point wire format.
//!
//! Every fused box becomes exactly 8 bytes: the normalized center x then
//! center y, each an IEEE-754 binary32 in little-endian byte order. There
//! is no header, length prefix or delimiter; a consumer reads the stream in
//! 8-byte strides and must never be handed a partial message.

use crate::fusion::FusedBox;

pub const MESSAGE_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamMessage {
    pub x: f32,
    pub y: f32,
}

impl StreamMessage {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Center of the fused box, in the box's normalized coordinates.
    pub fn from_fused(fused: &FusedBox) -> Self {
        let (x, y) = fused.center();
        Self { x, y }
    }

    pub fn encode(&self) -> [u8; MESSAGE_LEN] {
        let mut out = [0u8; MESSAGE_LEN];
        out[..4].copy_from_slice(&self.x.to_le_bytes());
        out[4..].copy_from_slice(&self.y.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8; MESSAGE_LEN]) -> Self {
        let x = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let y = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self { x, y }
    }
}

/// Consumer-side decoding of a byte stream. Returns the complete messages
/// and the number of trailing bytes that do not yet form one.
pub fn decode_stream(bytes: &[u8]) -> (Vec<StreamMessage>, usize) {
    let mut chunks = bytes.chunks_exact(MESSAGE_LEN);
    let messages = chunks
        .by_ref()
        .map(|chunk| {
            let mut buf = [0u8; MESSAGE_LEN];
            buf.copy_from_slice(chunk);
            StreamMessage::decode(&buf)
        })
        .collect();
    (messages, chunks.remainder().len())
}
