//! The packet transport: framed send/receive over one connected stream.

use crate::error::TransportError;
use crate::io::read_exact_timeout;
use bytes::Bytes;
use seqwire_protocol::{Encoder, Frame, FRAME_OVERHEAD};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

/// Default deadline for each individual read attempt (one minute).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Deadline applied to each individual read attempt.
    pub read_timeout: Duration,
}

impl TransportConfig {
    pub fn new() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A packet transport over one connected byte stream.
///
/// The transport owns the stream exclusively and exchanges discrete,
/// integrity-checked frames with the peer. It has two states, open and
/// closed: every operation requires the open state, and any I/O fault,
/// timeout, integrity fault, or explicit [`close`](Transport::close) moves
/// it to closed for good. A fresh transport over a new connection is the
/// only way to continue after that.
///
/// `send` and `receive` are each serialized internally but may run
/// concurrently with one another; the stream is full-duplex.
pub struct Transport<S> {
    config: TransportConfig,
    /// Write half plus the outbound sequence counter, guarded together so
    /// a frame's sequence assignment and its bytes can never interleave
    /// with another send.
    send_half: Mutex<SendHalf<S>>,
    recv_half: Mutex<RecvHalf<S>>,
    open: AtomicBool,
}

struct SendHalf<S> {
    writer: WriteHalf<S>,
    encoder: Encoder,
}

struct RecvHalf<S> {
    reader: ReadHalf<S>,
    /// Set while a frame's bytes are being consumed off the wire. A receive
    /// that finds it set was preceded by a cancelled receive, and the
    /// stream offset can no longer be trusted.
    mid_frame: bool,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Creates a transport over an already-connected stream.
    pub fn new(stream: S, config: TransportConfig) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            config,
            send_half: Mutex::new(SendHalf {
                writer,
                encoder: Encoder::new(),
            }),
            recv_half: Mutex::new(RecvHalf {
                reader,
                mid_frame: false,
            }),
            open: AtomicBool::new(true),
        }
    }

    /// Returns whether the transport is still open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Frames and writes one payload.
    ///
    /// The payload is assigned the next sequence number on this connection.
    /// The counter advances once the frame is constructed, before the write
    /// completes; a failed write closes the transport, so the consumed
    /// number never produces a gap the peer can observe.
    pub async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::BrokenConnection);
        }

        let mut half = self.send_half.lock().await;
        let seq = half.encoder.next_sequence();
        let encoded = half.encoder.encode(payload)?;

        tracing::trace!(seq, len = encoded.len(), "sending frame");

        if let Err(err) = half.writer.write_all(&encoded).await {
            self.close_on_error("send write failed");
            return Err(TransportError::Io(err));
        }
        if let Err(err) = half.writer.flush().await {
            self.close_on_error("send flush failed");
            return Err(TransportError::Io(err));
        }

        Ok(())
    }

    /// Reads and validates one frame, returning its body.
    ///
    /// A body equal to the reserved violation code surfaces as
    /// [`TransportError::ProtocolViolation`]. Any failure closes the
    /// transport. Cancelling an in-flight `receive` is safe: the next call
    /// detects the partially consumed frame and reports the connection as
    /// broken instead of resuming at a torn offset.
    pub async fn receive(&self) -> Result<Bytes, TransportError> {
        if !self.is_open() {
            return Err(TransportError::BrokenConnection);
        }

        let mut half = self.recv_half.lock().await;
        if half.mid_frame {
            self.close_on_error("previous receive was cancelled mid-frame");
            return Err(TransportError::BrokenConnection);
        }
        half.mid_frame = true;

        let frame = match self.read_frame(&mut half).await {
            Ok(frame) => frame,
            Err(err) => {
                self.close_on_error("receive failed");
                return Err(err);
            }
        };
        half.mid_frame = false;

        if frame.is_protocol_violation() {
            tracing::warn!(seq = frame.sequence, "peer reported a protocol violation");
            self.open.store(false, Ordering::SeqCst);
            return Err(TransportError::ProtocolViolation);
        }

        tracing::trace!(seq = frame.sequence, len = frame.payload.len(), "received frame");
        Ok(frame.payload)
    }

    /// Reads one frame as its four wire segments: length, sequence, body,
    /// CRC trailer.
    async fn read_frame(&self, half: &mut RecvHalf<S>) -> Result<Frame, TransportError> {
        let timeout = self.config.read_timeout;

        let head = read_exact_timeout(&mut half.reader, 4, timeout).await?;
        let length_bytes: [u8; 4] = head[0..4].try_into().unwrap();
        let total_len = u32::from_le_bytes(length_bytes);
        Frame::check_total_length(total_len)?;

        let head = read_exact_timeout(&mut half.reader, 4, timeout).await?;
        let sequence_bytes: [u8; 4] = head[0..4].try_into().unwrap();

        let body_len = total_len as usize - FRAME_OVERHEAD;
        let body = read_exact_timeout(&mut half.reader, body_len, timeout)
            .await?
            .freeze();

        let trailer = read_exact_timeout(&mut half.reader, 4, timeout).await?;
        let received_crc = u32::from_le_bytes(trailer[0..4].try_into().unwrap());

        Ok(Frame::from_segments(
            length_bytes,
            sequence_bytes,
            body,
            received_crc,
        )?)
    }

    /// Closes the transport and shuts the write half down.
    ///
    /// Idempotent. Subsequent and in-flight operations observe the closed
    /// state and fail with [`TransportError::BrokenConnection`]; a receive
    /// blocked on the wire is bounded by the per-read deadline, so nothing
    /// hangs silently.
    pub async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::debug!("closing transport");
        }
        let mut half = self.send_half.lock().await;
        let _ = half.writer.shutdown().await;
    }

    fn close_on_error(&self, reason: &str) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::debug!(reason, "transport closed");
        }
    }
}
