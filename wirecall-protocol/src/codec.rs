//! Stream-level frame accumulation.
//!
//! Frames travel on the stream as `<frame bytes><separator byte>`. The
//! decoder buffers incoming chunks, splits them on the separator, and
//! enforces the maximum frame size. An oversized frame fails with
//! [`ProtocolError::MessageTooLarge`] and is discarded up to its separator;
//! the frames after it decode normally.

use crate::error::ProtocolError;
use crate::message::{Request, Response};
use crate::{DEFAULT_MAX_MESSAGE_SIZE, MESSAGE_SEPARATOR};
use bytes::{Buf, Bytes, BytesMut};

/// Appends the stream separator to an encoded frame.
pub fn terminated(mut frame: Vec<u8>) -> Vec<u8> {
    frame.push(MESSAGE_SEPARATOR);
    frame
}

/// Incremental decoder splitting a byte stream into frames.
pub struct FrameDecoder {
    buffer: BytesMut,
    max_message_size: usize,
    /// An oversized frame is being skipped; bytes are dropped until its
    /// separator arrives.
    discarding: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_message_size,
            discarding: false,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to split the next complete frame off the buffer.
    ///
    /// Returns `Ok(Some(frame))` for a complete frame (separator stripped),
    /// `Ok(None)` if more data is needed, or `Err` if the current frame
    /// exceeds the size limit. After a size error the decoder has dropped
    /// the offending frame's bytes and subsequent frames remain decodable.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.discarding {
            match find_separator(&self.buffer) {
                Some(pos) => {
                    self.buffer.advance(pos + 1);
                    self.discarding = false;
                }
                None => {
                    self.buffer.clear();
                    return Ok(None);
                }
            }
        }

        match find_separator(&self.buffer) {
            Some(pos) => {
                if pos > self.max_message_size {
                    let size = pos;
                    self.buffer.advance(pos + 1);
                    return Err(ProtocolError::MessageTooLarge {
                        size,
                        max: self.max_message_size,
                    });
                }
                let frame = self.buffer.split_to(pos).freeze();
                self.buffer.advance(1);
                Ok(Some(frame))
            }
            None => {
                if self.buffer.len() > self.max_message_size {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(ProtocolError::MessageTooLarge {
                        size,
                        max: self.max_message_size,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Attempts to decode the next request from the buffer.
    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        match self.next_frame()? {
            Some(frame) => Ok(Some(Request::decode(&frame)?)),
            None => Ok(None),
        }
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        match self.next_frame()? {
            Some(frame) => Ok(Some(Response::decode(&frame)?)),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer and any discard state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_separator(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == MESSAGE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_frame(method: &str, trace: &str) -> Vec<u8> {
        format!("{method}{{}}{{\"trace_id\":\"{trace}\"}}").into_bytes()
    }

    #[test]
    fn test_decode_single_request() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&terminated(request_frame("ping", "t1")));

        let request = decoder.decode_request().unwrap().unwrap();
        assert_eq!(request.method_name, "ping");
        assert_eq!(request.trace_id, "t1");
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_then_complete() {
        let frame = terminated(request_frame("ping", "t1"));
        let mut decoder = FrameDecoder::new();

        decoder.extend(&frame[..6]);
        assert!(decoder.decode_request().unwrap().is_none());

        decoder.extend(&frame[6..]);
        let request = decoder.decode_request().unwrap().unwrap();
        assert_eq!(request.method_name, "ping");
    }

    #[test]
    fn test_multiple_frames_one_chunk() {
        let mut data = terminated(request_frame("first", "t1"));
        data.extend(terminated(request_frame("second", "t2")));

        let mut decoder = FrameDecoder::new();
        decoder.extend(&data);

        assert_eq!(
            decoder.decode_request().unwrap().unwrap().method_name,
            "first"
        );
        assert_eq!(
            decoder.decode_request().unwrap().unwrap().method_name,
            "second"
        );
        assert!(decoder.decode_request().unwrap().is_none());
    }

    #[test]
    fn test_oversized_frame_then_recovery() {
        let mut decoder = FrameDecoder::with_max_message_size(64);

        let big_payload = format!("{{\"blob\":\"{}\"}}", "x".repeat(100));
        let mut data = terminated(format!("big{big_payload}{{\"trace_id\":\"t1\"}}").into_bytes());
        data.extend(terminated(request_frame("ping", "t2")));
        decoder.extend(&data);

        let result = decoder.decode_request();
        assert!(matches!(
            result,
            Err(ProtocolError::MessageTooLarge { max: 64, .. })
        ));

        // The connection stays usable: the following frame decodes cleanly.
        let request = decoder.decode_request().unwrap().unwrap();
        assert_eq!(request.method_name, "ping");
    }

    #[test]
    fn test_oversized_frame_across_chunks() {
        let mut decoder = FrameDecoder::with_max_message_size(16);

        // Feed an unterminated oversized frame in pieces.
        decoder.extend(&[b'a'; 20]);
        assert!(matches!(
            decoder.next_frame(),
            Err(ProtocolError::MessageTooLarge { size: 20, max: 16 })
        ));

        // The tail of the oversized frame keeps being dropped.
        decoder.extend(&[b'b'; 10]);
        assert!(decoder.next_frame().unwrap().is_none());

        // Its separator ends discard mode; the next frame goes through.
        decoder.extend(&[MESSAGE_SEPARATOR]);
        decoder.extend(&terminated(request_frame("ping", "t1")));
        let request = decoder.decode_request().unwrap().unwrap();
        assert_eq!(request.method_name, "ping");
    }

    #[test]
    fn test_decode_response_stream() {
        let request = Request::new("ping").with_trace_id("t1");
        let response = Response::ok(&request);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&terminated(response.encode().unwrap()));

        let decoded = decoder.decode_response().unwrap().unwrap();
        assert!(decoded.success);
        assert_eq!(decoded.trace_id, "t1");
    }

    #[test]
    fn test_clear_resets_discard_state() {
        let mut decoder = FrameDecoder::with_max_message_size(64);
        decoder.extend(&[b'a'; 100]);
        assert!(decoder.next_frame().is_err());

        decoder.clear();
        decoder.extend(&terminated(request_frame("ok", "t1")));
        assert_eq!(decoder.decode_request().unwrap().unwrap().method_name, "ok");
    }
}
