//! # seqwire-protocol
//!
//! Wire protocol implementation for the seqwire packet transport.
//!
//! This crate provides:
//! - Binary framing with a length/sequence header and CRC-32 trailer
//! - Incremental decoding of byte streams into frames
//! - Sequence number assignment for outbound frames
//! - The reserved protocol-violation sentinel and protocol error types

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{Decoder, Encoder};
pub use error::ProtocolError;
pub use frame::{Frame, FRAME_OVERHEAD, PROTOCOL_VIOLATION_CODE};

/// Maximum total frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
