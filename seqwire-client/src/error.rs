//! Transport error types.

use seqwire_protocol::ProtocolError;
use thiserror::Error;

/// Transport errors.
///
/// Any of these leaves the transport closed. The transport never retries
/// internally; a caller that wants to continue must build a new transport
/// over a fresh connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the stream, or the transport was already closed
    /// before the operation began.
    #[error("broken connection")]
    BrokenConnection,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single read attempt exceeded the configured deadline.
    #[error("receive timeout")]
    Timeout,

    /// A received frame's CRC-32 trailer does not match its bytes. The
    /// stream can no longer be trusted to be frame-aligned.
    #[error("checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The peer rejected the connection with the reserved violation code.
    #[error("peer reported a protocol violation")]
    ProtocolViolation,

    /// Any other framing fault, such as an implausible declared length.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::CrcMismatch { expected, actual } => {
                TransportError::ChecksumMismatch { expected, actual }
            }
            other => TransportError::Protocol(other),
        }
    }
}

impl TransportError {
    /// Returns whether a fresh connection is worth attempting after this
    /// error. Retry policy itself belongs to the session layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::Timeout | TransportError::BrokenConnection
        )
    }
}
