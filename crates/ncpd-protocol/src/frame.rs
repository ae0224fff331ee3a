//! Frame encoding/decoding utilities.
//!
//! Both directions of the serial channel use the same framing: a start
//! byte, a 2-byte length (little-endian), the payload, and one XOR
//! checksum byte computed over the payload.
//!
//! ```text
//! +------+--------+--------+-------------------+-------+
//! | 0x7E | len_lo | len_hi | payload[0..len]   | cksum |
//! +------+--------+--------+-------------------+-------+
//! ```

use bytes::{Buf, BytesMut};

use crate::constants::{FRAME_SOF, MAX_FRAME_SIZE};
use crate::error::ProtocolError;

/// A codec for reading and writing framed messages.
///
/// Decoding is incremental: push received bytes in, then call
/// [`FrameCodec::decode`] until it yields `Ok(None)`. Corrupt frames
/// (oversized length, checksum mismatch) are reported as errors and the
/// decoder resynchronizes on the next start byte, so one bad frame never
/// poisons the stream.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        FrameCodec {
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete frame payload from the buffer.
    ///
    /// Returns `Ok(Some(payload))` if a complete, valid frame is
    /// available, `Ok(None)` if more data is needed, or `Err` if the
    /// frame at the head of the buffer is corrupt (the corrupt header is
    /// consumed; keep calling to resynchronize).
    pub fn decode(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        // Scan for the start byte, discarding any preceding garbage
        let mut discarded = 0usize;
        while !self.buffer.is_empty() && self.buffer[0] != FRAME_SOF {
            self.buffer.advance(1);
            discarded += 1;
        }
        if discarded > 0 {
            log::trace!("discarded {} bytes before start of frame", discarded);
        }

        // Need at least start byte + 2 bytes length
        if self.buffer.len() < 3 {
            return Ok(None);
        }

        let len = u16::from_le_bytes([self.buffer[1], self.buffer[2]]) as usize;
        if len > MAX_FRAME_SIZE {
            // Bogus header; drop the start byte and resync.
            self.buffer.advance(1);
            return Err(ProtocolError::FrameTooLong {
                max: MAX_FRAME_SIZE,
                actual: len,
            });
        }

        // Wait for the complete frame: header + payload + checksum byte
        if self.buffer.len() < 3 + len + 1 {
            return Ok(None);
        }

        let expected = self.buffer[3 + len];
        let actual = checksum(&self.buffer[3..3 + len]);
        if expected != actual {
            self.buffer.advance(1);
            return Err(ProtocolError::BadChecksum { expected, actual });
        }

        self.buffer.advance(3); // Skip start byte and length
        let payload = self.buffer.split_to(len).to_vec();
        self.buffer.advance(1); // Skip checksum

        Ok(Some(payload))
    }

    /// Encode a payload with start byte, length prefix, and checksum.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let mut buf = Vec::with_capacity(4 + payload.len());
        buf.push(FRAME_SOF);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(payload);
        buf.push(checksum(payload));
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// XOR checksum over the payload bytes.
fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_codec_encode_decode() {
        let mut codec = FrameCodec::new();

        let payload = b"Hello, World!";
        let encoded = FrameCodec::encode(payload);

        // Start byte + length (2 bytes) + payload + checksum
        assert_eq!(encoded.len(), 4 + payload.len());
        assert_eq!(encoded[0], FRAME_SOF);
        assert_eq!(encoded[1], payload.len() as u8);
        assert_eq!(encoded[2], 0); // High byte of length

        codec.push(&encoded);
        let decoded = codec.decode().expect("valid frame").expect("complete");
        assert_eq!(&decoded, payload);
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_frame_codec_partial() {
        let mut codec = FrameCodec::new();

        let encoded = FrameCodec::encode(b"Test data");

        // Feed the header plus one payload byte; not enough yet.
        codec.push(&encoded[..4]);
        assert!(codec.decode().expect("no error").is_none());

        codec.push(&encoded[4..]);
        let decoded = codec.decode().expect("valid frame").expect("complete");
        assert_eq!(&decoded, b"Test data");
    }

    #[test]
    fn test_frame_codec_multiple() {
        let mut codec = FrameCodec::new();

        codec.push(&FrameCodec::encode(b"First"));
        codec.push(&FrameCodec::encode(b"Second"));

        let decoded1 = codec.decode().expect("valid frame").expect("complete");
        assert_eq!(&decoded1, b"First");

        let decoded2 = codec.decode().expect("valid frame").expect("complete");
        assert_eq!(&decoded2, b"Second");

        assert!(codec.decode().expect("no error").is_none());
    }

    #[test]
    fn test_frame_codec_skips_garbage() {
        let mut codec = FrameCodec::new();

        codec.push(&[0x00, 0xFF, 0x42]);
        codec.push(&FrameCodec::encode(b"clean"));

        let decoded = codec.decode().expect("valid frame").expect("complete");
        assert_eq!(&decoded, b"clean");
    }

    #[test]
    fn test_frame_codec_bad_checksum_resyncs() {
        let mut codec = FrameCodec::new();

        let mut corrupt = FrameCodec::encode(b"corrupt me");
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        codec.push(&corrupt);
        codec.push(&FrameCodec::encode(b"good"));

        let err = codec.decode().expect_err("checksum must fail");
        assert!(matches!(err, ProtocolError::BadChecksum { .. }));

        // The decoder recovers on the next valid frame.
        let decoded = codec.decode().expect("valid frame").expect("complete");
        assert_eq!(&decoded, b"good");
    }

    #[test]
    fn test_frame_codec_oversized_length_resyncs() {
        let mut codec = FrameCodec::new();

        codec.push(&[FRAME_SOF, 0xFF, 0xFF]);
        codec.push(&FrameCodec::encode(b"after"));

        let err = codec.decode().expect_err("length must fail");
        assert!(matches!(err, ProtocolError::FrameTooLong { .. }));

        let decoded = codec.decode().expect("valid frame").expect("complete");
        assert_eq!(&decoded, b"after");
    }

    #[test]
    fn test_frame_codec_empty_payload() {
        let mut codec = FrameCodec::new();

        codec.push(&FrameCodec::encode(b""));
        let decoded = codec.decode().expect("valid frame").expect("complete");
        assert!(decoded.is_empty());
    }
}
