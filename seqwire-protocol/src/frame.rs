//! Binary frame format for the seqwire packet transport.
//!
//! Frame layout (12 bytes of envelope around the body, all integers
//! little-endian):
//!
//! ```text
//! +--------------+----------+-------------------+--------+
//! | total_length | sequence | body              | crc32  |
//! |   4 bytes    | 4 bytes  | length - 12 bytes | 4 bytes|
//! +--------------+----------+-------------------+--------+
//! ```
//!
//! `total_length` counts the entire frame including itself and the CRC
//! trailer, so a frame with an empty body has length 12. Peers emit bodies
//! in 4-byte units, which keeps the length divisible by 4 on the wire.
//!
//! The checksum is a standard CRC-32 (IEEE 802.3 polynomial) computed over
//! the encoded length bytes, sequence bytes, and body, in transmission
//! order. It covers the exact bytes on the wire, not the numeric values.

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Number of envelope bytes around the body (4 length + 4 sequence + 4 CRC).
pub const FRAME_OVERHEAD: usize = 12;

/// Reserved body value a peer sends to reject the connection at the
/// protocol level, interpreted as an unsigned 32-bit little-endian integer.
/// A 4-byte body equal to this code is never application payload.
pub const PROTOCOL_VIOLATION_CODE: u32 = 0xFFFF_FE6C;

/// A parsed transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender-assigned sequence number within the connection.
    pub sequence: u32,
    /// Opaque frame body.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given sequence number and body.
    pub fn new(sequence: u32, payload: Bytes) -> Self {
        Self { sequence, payload }
    }

    /// Returns whether the body is the reserved protocol-violation code.
    pub fn is_protocol_violation(&self) -> bool {
        self.payload.len() == 4
            && u32::from_le_bytes(self.payload[..4].try_into().unwrap()) == PROTOCOL_VIOLATION_CODE
    }

    /// Validates a declared total length before any body bytes are read.
    ///
    /// A length below the 12-byte envelope would imply a negative-size body;
    /// a length above [`MAX_FRAME_SIZE`] is treated as framing
    /// desynchronization rather than attempted.
    pub fn check_total_length(total_length: u32) -> Result<(), ProtocolError> {
        if (total_length as usize) < FRAME_OVERHEAD {
            return Err(ProtocolError::InvalidLength(total_length));
        }
        if total_length as usize > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: total_length as usize,
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(())
    }

    /// Encodes the frame into one contiguous buffer.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let total_len = self.payload.len() + FRAME_OVERHEAD;
        if total_len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: total_len,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(total_len);

        // Length (4 bytes)
        buf.put_u32_le(total_len as u32);

        // Sequence (4 bytes)
        buf.put_u32_le(self.sequence);

        // Body
        buf.put_slice(&self.payload);

        // CRC-32 over the bytes emitted so far: length, sequence, body
        let crc = crc32fast::hash(&buf);
        buf.put_u32_le(crc);

        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < 4 {
            return Ok(None);
        }

        let length_bytes: [u8; 4] = buf[0..4].try_into().unwrap();
        let total_len = u32::from_le_bytes(length_bytes);
        Self::check_total_length(total_len)?;

        let total_len = total_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        // Consume the length field
        buf.advance(4);

        let sequence_bytes: [u8; 4] = buf[0..4].try_into().unwrap();
        buf.advance(4);

        let body = buf.split_to(total_len - FRAME_OVERHEAD).freeze();

        let received_crc = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        buf.advance(4);

        Ok(Some(Self::from_segments(
            length_bytes,
            sequence_bytes,
            body,
            received_crc,
        )?))
    }

    /// Assembles and validates a frame received as its four wire segments.
    ///
    /// `received_crc` is compared against a CRC-32 recomputed over the raw
    /// length, sequence, and body bytes in transmission order.
    pub fn from_segments(
        length_bytes: [u8; 4],
        sequence_bytes: [u8; 4],
        body: Bytes,
        received_crc: u32,
    ) -> Result<Self, ProtocolError> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&length_bytes);
        hasher.update(&sequence_bytes);
        hasher.update(&body);
        let actual = hasher.finalize();

        if actual != received_crc {
            return Err(ProtocolError::CrcMismatch {
                expected: received_crc,
                actual,
            });
        }

        Ok(Self {
            sequence: u32::from_le_bytes(sequence_bytes),
            payload: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_crc32_is_ieee() {
        // The standard check value for the IEEE 802.3 polynomial. Peers
        // compute the same table, so this pins wire compatibility.
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_frame_roundtrip() {
        let payload = Bytes::from_static(b"opaque rpc payload bytes");
        let frame = Frame::new(7, payload.clone());

        let mut buf = frame.encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.sequence, 7);
        assert_eq!(decoded.payload, payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_body() {
        let frame = Frame::new(0, Bytes::new());

        let encoded = frame.encode().unwrap();
        assert_eq!(encoded.len(), FRAME_OVERHEAD);
        // total_length = 12, little-endian
        assert_eq!(&encoded[0..4], &[12, 0, 0, 0]);

        let mut buf = encoded;
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_wire_layout() {
        let frame = Frame::new(0x0102_0304, Bytes::from_static(b"abcd"));
        let encoded = frame.encode().unwrap();

        assert_eq!(encoded.len(), 16);
        // total_length = 16, little-endian
        assert_eq!(&encoded[0..4], &[16, 0, 0, 0]);
        // sequence, little-endian
        assert_eq!(&encoded[4..8], &[0x04, 0x03, 0x02, 0x01]);
        // body
        assert_eq!(&encoded[8..12], b"abcd");
        // trailer matches a CRC over everything before it
        let crc = u32::from_le_bytes(encoded[12..16].try_into().unwrap());
        assert_eq!(crc, crc32fast::hash(&encoded[0..12]));
    }

    #[test]
    fn test_single_bit_flips_never_decode() {
        let frame = Frame::new(3, Bytes::from_static(b"sensitive"));
        let encoded = frame.encode().unwrap();

        for bit in 0..encoded.len() * 8 {
            let mut corrupted = encoded.clone();
            corrupted[bit / 8] ^= 1 << (bit % 8);

            let result = Frame::decode(&mut corrupted);
            match result {
                // A flip in the length field may leave the decoder waiting
                // for more bytes or reject the length outright; it must
                // never produce the original frame.
                Ok(Some(decoded)) => panic!(
                    "bit {} flipped but frame decoded: seq={} len={}",
                    bit,
                    decoded.sequence,
                    decoded.payload.len()
                ),
                Ok(None) => assert!(bit < 32, "only length corruption can stall the decoder"),
                Err(_) => {}
            }
        }

        // The unflipped frame still decodes
        let mut buf = encoded;
        assert!(Frame::decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn test_flips_outside_length_are_crc_mismatch() {
        let frame = Frame::new(9, Bytes::from_static(b"payload!"));
        let encoded = frame.encode().unwrap();

        // Every bit of the sequence, body, and trailer regions
        for bit in 32..encoded.len() * 8 {
            let mut corrupted = encoded.clone();
            corrupted[bit / 8] ^= 1 << (bit % 8);

            let result = Frame::decode(&mut corrupted);
            assert!(
                matches!(result, Err(ProtocolError::CrcMismatch { .. })),
                "bit {} should fail the checksum",
                bit
            );
        }
    }

    #[test]
    fn test_sentinel_detection() {
        let sentinel = Bytes::from_static(&[0x6C, 0xFE, 0xFF, 0xFF]);
        let frame = Frame::new(0, sentinel);
        assert!(frame.is_protocol_violation());

        // The sentinel frame is otherwise well-formed on the wire
        let mut buf = frame.encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(decoded.is_protocol_violation());
    }

    #[test]
    fn test_sentinel_requires_exact_match() {
        // Wrong value
        assert!(!Frame::new(0, Bytes::from_static(&[0x6C, 0xFE, 0xFF, 0x7F])).is_protocol_violation());
        // Right prefix, wrong length
        assert!(!Frame::new(0, Bytes::from_static(&[0x6C, 0xFE, 0xFF, 0xFF, 0x00]))
            .is_protocol_violation());
        // Too short
        assert!(!Frame::new(0, Bytes::from_static(&[0x6C, 0xFE, 0xFF])).is_protocol_violation());
        assert!(!Frame::new(0, Bytes::new()).is_protocol_violation());
    }

    #[test]
    fn test_invalid_length_rejected() {
        // Declared total of 4 bytes would imply a negative-size body
        let mut buf = BytesMut::from(&[4u8, 0, 0, 0, 0, 0, 0, 0][..]);
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::InvalidLength(4))));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let declared = (MAX_FRAME_SIZE as u32) + 1;
        let mut buf = BytesMut::new();
        buf.put_u32_le(declared);
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_encode_too_large() {
        let huge = vec![0u8; MAX_FRAME_SIZE - FRAME_OVERHEAD + 1];
        let frame = Frame::new(0, Bytes::from(huge));
        let result = frame.encode();
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_incomplete_frame() {
        let frame = Frame::new(1, Bytes::from_static(b"partial"));
        let encoded = frame.encode().unwrap();

        // Less than the length field
        let mut buf = BytesMut::from(&encoded[..3]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());

        // Length known, body still outstanding
        let mut buf = BytesMut::from(&encoded[..encoded.len() - 1]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::new(0, Bytes::from_static(b"first")).encode().unwrap());
        buf.extend_from_slice(&Frame::new(1, Bytes::from_static(b"second")).encode().unwrap());

        let f1 = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!((f1.sequence, f1.payload.as_ref()), (0, b"first".as_ref()));

        let f2 = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!((f2.sequence, f2.payload.as_ref()), (1, b"second".as_ref()));

        assert!(buf.is_empty());
    }

    #[test]
    fn test_from_segments() {
        let encoded = Frame::new(5, Bytes::from_static(b"body")).encode().unwrap();

        let length_bytes: [u8; 4] = encoded[0..4].try_into().unwrap();
        let sequence_bytes: [u8; 4] = encoded[4..8].try_into().unwrap();
        let body = Bytes::copy_from_slice(&encoded[8..12]);
        let crc = u32::from_le_bytes(encoded[12..16].try_into().unwrap());

        let frame = Frame::from_segments(length_bytes, sequence_bytes, body.clone(), crc).unwrap();
        assert_eq!(frame.sequence, 5);
        assert_eq!(frame.payload, body);

        let result = Frame::from_segments(length_bytes, sequence_bytes, body, crc ^ 1);
        assert!(matches!(result, Err(ProtocolError::CrcMismatch { .. })));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(seq in any::<u32>(), body in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let frame = Frame::new(seq, Bytes::from(body.clone()));
            let mut buf = frame.encode().unwrap();
            let decoded = Frame::decode(&mut buf).unwrap().unwrap();

            prop_assert_eq!(decoded.sequence, seq);
            prop_assert_eq!(decoded.payload.as_ref(), body.as_slice());
            prop_assert!(buf.is_empty());
        }
    }
}
