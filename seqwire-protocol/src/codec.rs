//! Encoder and decoder for seqwire frames.

use crate::error::ProtocolError;
use crate::frame::Frame;
use bytes::{Bytes, BytesMut};

/// Encodes outbound payloads into frames, assigning sequence numbers.
///
/// The first frame on a connection is numbered 0, the next 1, and so on.
/// The counter belongs to exactly one connection and is never reset; a new
/// connection gets a new encoder.
#[derive(Debug, Default)]
pub struct Encoder {
    next_sequence: u32,
}

impl Encoder {
    pub fn new() -> Self {
        Self { next_sequence: 0 }
    }

    /// Sequence number the next encoded frame will carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Encodes a payload into a frame, consuming one sequence number.
    ///
    /// The counter advances only when a frame is actually constructed; a
    /// rejected payload (oversized) does not burn a sequence number.
    pub fn encode(&mut self, payload: Bytes) -> Result<BytesMut, ProtocolError> {
        let frame = Frame::new(self.next_sequence, payload);
        let encoded = frame.encode()?;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Ok(encoded)
    }
}

/// Decodes an inbound byte stream into frames.
///
/// Callers feed raw reads through [`extend`](Decoder::extend) and drain
/// complete frames with [`decode_frame`](Decoder::decode_frame); `Ok(None)`
/// means more bytes are needed.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
