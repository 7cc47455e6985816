use crate::http::request::{Method, Request};
use std::collections::HashMap;
use std::fmt;

/// Longest method token accepted.
pub const MAX_METHOD_LEN: usize = 15;
/// Longest request target accepted.
pub const MAX_PATH_LEN: usize = 1023;
/// Longest protocol token accepted.
pub const MAX_PROTOCOL_LEN: usize = 15;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request line missing, not UTF-8, or short of three tokens.
    Malformed,
    /// A request line token is longer than its limit.
    TokenTooLong,
    /// No blank line yet.
    Incomplete,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed => f.write_str("malformed request line"),
            ParseError::TokenTooLong => f.write_str("request line token too long"),
            ParseError::Incomplete => f.write_str("incomplete request head"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses a complete request head at the front of `buf` and returns it with
/// the number of bytes consumed, terminator included.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let request = parse_request(&buf[..headers_end])?;
    Ok((request, headers_end + HEADER_TERMINATOR.len()))
}

/// Parses the request line and headers of a raw head.
///
/// The terminator itself is optional here: the caller has already decided
/// the head is complete.
pub fn parse_request(raw: &[u8]) -> Result<Request, ParseError> {
    let line_end = raw
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(raw.len());

    let request_line =
        std::str::from_utf8(&raw[..line_end]).map_err(|_| ParseError::Malformed)?;

    let mut parts = request_line.split_ascii_whitespace();
    let method = parts.next().ok_or(ParseError::Malformed)?;
    let path = parts.next().ok_or(ParseError::Malformed)?;
    let version = parts.next().ok_or(ParseError::Malformed)?;

    if method.len() > MAX_METHOD_LEN
        || path.len() > MAX_PATH_LEN
        || version.len() > MAX_PROTOCOL_LEN
    {
        return Err(ParseError::TokenTooLong);
    }

    let headers = parse_headers(raw.get(line_end + 2..).unwrap_or_default());

    Ok(Request {
        method: Method::from_token(method),
        path: path.to_string(),
        version: version.to_string(),
        headers,
    })
}

/// Header lines are informational only, so anything unreadable is skipped
/// rather than failing the request.
fn parse_headers(raw: &[u8]) -> HashMap<String, String> {
    let mut headers = HashMap::new();

    let text = String::from_utf8_lossy(raw);
    for line in text.split("\r\n") {
        if line.is_empty() {
            break;
        }

        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    headers
}

/// Offset of the first `CRLF CRLF` in `buf`.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}
