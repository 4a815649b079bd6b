//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame length: {0} bytes")]
    InvalidLength(u32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },
}
