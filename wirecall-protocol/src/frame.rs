//! Delimiter-scanned frame grammar.
//!
//! Frame layout (request):
//!
//! ```text
//! +-------------+----------------+----------------+
//! | method_name | payload JSON   | headers JSON   |
//! | no '{'      | {...}          | {...}          |
//! +-------------+----------------+----------------+
//! ```
//!
//! A response inserts `:` and a literal `ok`/`err` status token between the
//! method name and the payload. The first `{` starts the payload object, the
//! next `{` starts the headers object; those two embedded starts are the only
//! in-frame delimiters. The frame terminator byte ([`crate::MESSAGE_SEPARATOR`])
//! is appended by the stream writer, never part of the frame itself.

use crate::error::ProtocolError;
use crate::MESSAGE_SEPARATOR;

/// A scanned request frame, borrowing its segments from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame<'a> {
    pub method_name: &'a str,
    /// Payload JSON text, starting at the first `{`.
    pub payload: &'a str,
    /// Headers JSON text, starting at the second `{`.
    pub headers: &'a str,
}

/// A scanned response frame, borrowing its segments from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame<'a> {
    pub method_name: &'a str,
    pub success: bool,
    pub payload: &'a str,
    pub headers: &'a str,
}

/// Checks the method-name invariant: non-empty, free of `{` and the
/// frame separator byte.
pub fn validate_method_name(method_name: &str) -> Result<(), ProtocolError> {
    if method_name.is_empty()
        || method_name.contains('{')
        || method_name.bytes().any(|b| b == MESSAGE_SEPARATOR)
    {
        return Err(ProtocolError::InvalidMessageFormat);
    }
    Ok(())
}

/// Extracts the method name from a raw request frame without a full decode.
pub fn find_method_name(data: &[u8]) -> Result<&str, ProtocolError> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
    match text.find('{') {
        Some(0) | None => Err(ProtocolError::InvalidMessageFormat),
        Some(payload_start) => Ok(&text[..payload_start]),
    }
}

impl<'a> RequestFrame<'a> {
    /// Scans a request frame: method name, then two adjacent JSON objects.
    pub fn scan(data: &'a [u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;

        let payload_start = text.find('{');
        let headers_start = payload_start.and_then(|p| text[p + 1..].find('{').map(|h| p + 1 + h));

        match (payload_start, headers_start) {
            (Some(p), Some(h)) if p > 0 && p < h => Ok(Self {
                method_name: &text[..p],
                payload: &text[p..h],
                headers: &text[h..],
            }),
            _ => Err(ProtocolError::InvalidMessageFormat),
        }
    }
}

impl<'a> ResponseFrame<'a> {
    /// Scans a response frame: method name, `:`, a literal `ok`/`err` status
    /// token, then two adjacent JSON objects.
    pub fn scan(data: &'a [u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;

        let status_start = text.find(':');
        let payload_start =
            status_start.and_then(|s| text[s + 1..].find('{').map(|p| s + 1 + p));
        let headers_start = payload_start.and_then(|p| text[p + 1..].find('{').map(|h| p + 1 + h));

        let (s, p, h) = match (status_start, payload_start, headers_start) {
            (Some(s), Some(p), Some(h)) if s > 0 && s < p && p < h => (s, p, h),
            _ => return Err(ProtocolError::InvalidMessageFormat),
        };

        let success = match &text[s + 1..p] {
            "ok" => true,
            "err" => false,
            token => return Err(ProtocolError::InvalidStatusToken(token.to_string())),
        };

        Ok(Self {
            method_name: &text[..s],
            success,
            payload: &text[p..h],
            headers: &text[h..],
        })
    }
}
