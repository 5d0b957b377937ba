// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sentinel Framing Codec.
//!
//! Every message on the wire is `<JSON bytes><SENTINEL>`. There is no
//! length prefix: the decoder scans the stream for the sentinel, yields
//! the bytes before it as one message and keeps whatever follows for the
//! next call, independent of how TCP segmented the stream.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::engine_core::constants::{framing, limits};
use crate::engine_core::errors::TransportError;

#[derive(Debug, Clone)]
pub struct FrameCodec {
    sentinel: Bytes,
    max_message_size: usize,
    // Bytes of the buffer already scanned without finding the sentinel
    scanned: usize,
}

impl FrameCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sentinel(framing::SENTINEL)
    }

    /// Build a codec using a custom end-of-message marker.
    ///
    /// # Panics
    /// If `sentinel` is empty.
    #[must_use]
    pub fn with_sentinel(sentinel: &[u8]) -> Self {
        assert!(!sentinel.is_empty(), "frame sentinel must not be empty");
        Self {
            sentinel: Bytes::copy_from_slice(sentinel),
            max_message_size: limits::MAX_MESSAGE_SIZE_BYTES,
            scanned: 0,
        }
    }

    #[must_use]
    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    pub fn sentinel(&self) -> &[u8] {
        &self.sentinel
    }

    fn find_sentinel(&self, src: &[u8]) -> Option<usize> {
        let needle = &self.sentinel[..];
        // A sentinel may straddle the previous scan boundary
        let start = self.scanned.min(src.len()).saturating_sub(needle.len() - 1);
        src[start..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|pos| start + pos)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Append the sentinel to an encoded JSON body.
pub fn frame(body: &[u8], sentinel: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(body.len() + sentinel.len());
    buf.put_slice(body);
    buf.put_slice(sentinel);
    buf.freeze()
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        trace!("Decoder attempting to read from {} bytes buffer", src.len());

        match self.find_sentinel(src) {
            Some(end) => {
                if end > self.max_message_size {
                    return Err(TransportError::FrameTooLarge {
                        len: end,
                        limit: self.max_message_size,
                    });
                }
                let mut message = src.split_to(end + self.sentinel.len());
                message.truncate(end);
                self.scanned = 0;
                trace!("Decoded message of {} bytes", message.len());
                Ok(Some(message))
            }
            None => {
                if src.len() > self.max_message_size {
                    return Err(TransportError::FrameTooLarge {
                        len: src.len(),
                        limit: self.max_message_size,
                    });
                }
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if src.iter().all(u8::is_ascii_whitespace) {
            src.clear();
            self.scanned = 0;
            return Ok(None);
        }
        debug!("Stream ended inside a message ({} bytes buffered)", src.len());
        Err(TransportError::TruncatedFrame(src.len()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if body.len() > self.max_message_size {
            return Err(TransportError::FrameTooLarge {
                len: body.len(),
                limit: self.max_message_size,
            });
        }
        dst.reserve(body.len() + self.sentinel.len());
        dst.put_slice(&body);
        dst.put_slice(&self.sentinel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n"[..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&msg[..], b"{\"a\":1}");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_waits_for_sentinel_and_keeps_trailing_bytes() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"1}\n{\"b\"");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&msg[..], b"{\"a\":1}");
        assert_eq!(&buf[..], b"{\"b\"");

        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b":2}\n");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&msg[..], b"{\"b\":2}");
    }

    #[test]
    fn test_multi_byte_sentinel_split_across_reads() {
        let mut codec = FrameCodec::with_sentinel(b"\r\n\r\n");
        let mut buf = BytesMut::from(&b"[1,2]\r\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\r\n");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&msg[..], b"[1,2]");
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut codec = FrameCodec::new().max_message_size(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { len: 10, limit: 8 }));
    }

    #[test]
    fn test_decode_eof() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"  \r"[..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&b"{\"cut\""[..]);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(TransportError::TruncatedFrame(6))
        ));
    }

    #[test]
    fn test_encode_appends_sentinel() {
        let mut codec = FrameCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from_static(b"{}"), &mut dst).unwrap();
        assert_eq!(&dst[..], b"{}\n");
        assert_eq!(&frame(b"[]", b"\0")[..], b"[]\0");
    }
}
