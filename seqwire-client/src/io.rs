//! Bounded reads with per-attempt deadlines.

use crate::error::TransportError;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reads exactly `count` bytes from `reader`, accumulating partial reads.
///
/// Each individual read attempt is raced against `timeout`; an attempt that
/// does not complete in time fails with [`TransportError::Timeout`]. A
/// zero-length read before `count` is satisfied means the peer closed the
/// stream mid-read and fails with [`TransportError::BrokenConnection`].
///
/// On success the returned buffer holds exactly `count` bytes in receipt
/// order. On any failure the stream may have been partially consumed and
/// must not be reused for framed reads.
pub async fn read_exact_timeout<R>(
    reader: &mut R,
    count: usize,
    timeout: Duration,
) -> Result<BytesMut, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(count);
    let mut received = 0;

    while received < count {
        let n = tokio::time::timeout(timeout, reader.read(&mut buf[received..]))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(TransportError::Io)?;

        if n == 0 {
            return Err(TransportError::BrokenConnection);
        }
        received += n;
    }

    Ok(buf)
}
