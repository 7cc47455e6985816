use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};

use chrono::Utc;

use crate::http::response::{Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// File bodies are copied through a buffer of at most this many bytes.
pub const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// `Date` header value, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Status line and headers, blank line included.
pub fn serialize_head(resp: &Response, server: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    push_header(&mut buf, "Date", &http_date());
    push_header(&mut buf, "Server", server);
    push_header(&mut buf, "Connection", "close");

    // Content-Length first so the head reads in a stable order
    if let Some(len) = resp.headers.get("Content-Length") {
        push_header(&mut buf, "Content-Length", len);
    }
    for (k, v) in &resp.headers {
        if k == "Content-Length" || k.eq_ignore_ascii_case("connection") {
            continue;
        }
        push_header(&mut buf, k, v);
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

fn serialize_response(resp: &Response, server: &str) -> Vec<u8> {
    let mut buf = serialize_head(resp, server);
    buf.extend_from_slice(&resp.body);
    buf
}

fn push_header(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Outcome of one [`ResponseWriter::write_to`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Every byte of the response has been handed to the socket.
    Done,
    /// The socket would block; call again once it is writable.
    Blocked,
}

struct FileBody {
    file: File,
    remaining: u64,
}

/// A serialized response being written to a non-blocking socket.
///
/// Bodies built in memory are written straight from the serialized buffer.
/// File bodies are streamed: the buffer is refilled from the file one chunk
/// at a time, only after the previous chunk has been fully written.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
    file: Option<FileBody>,
    status: StatusCode,
    body_len: u64,
    sent: u64,
}

impl ResponseWriter {
    pub fn new(response: &Response, server: &str) -> Self {
        Self {
            buffer: serialize_response(response, server),
            written: 0,
            file: None,
            status: response.status,
            body_len: response.body.len() as u64,
            sent: 0,
        }
    }

    /// Writes `response`'s head, then `len` bytes read from `file`.
    pub fn with_file(response: &Response, server: &str, file: File, len: u64) -> Self {
        Self {
            buffer: serialize_head(response, server),
            written: 0,
            file: Some(FileBody {
                file,
                remaining: len,
            }),
            status: response.status,
            body_len: len,
            sent: 0,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body_len(&self) -> u64 {
        self.body_len
    }

    /// Total bytes accepted by the socket so far, head included.
    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }

    /// Writes until finished or until `out` would block.
    ///
    /// Any error other than `WouldBlock` and `Interrupted` is returned as is;
    /// the response cannot be resumed after that.
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> io::Result<WriteProgress> {
        loop {
            while self.written < self.buffer.len() {
                match out.write(&self.buffer[self.written..]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            ErrorKind::WriteZero,
                            "connection closed while writing",
                        ));
                    }
                    Ok(n) => {
                        self.written += n;
                        self.sent += n as u64;
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        return Ok(WriteProgress::Blocked);
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }

            if !self.refill()? {
                return Ok(WriteProgress::Done);
            }
        }
    }

    /// Loads the next file chunk. Returns false once the body is exhausted.
    fn refill(&mut self) -> io::Result<bool> {
        let Some(body) = self.file.as_mut() else {
            return Ok(false);
        };

        if body.remaining == 0 {
            self.file = None;
            return Ok(false);
        }

        let chunk = body.remaining.min(FILE_CHUNK_SIZE as u64) as usize;
        self.buffer.clear();
        self.buffer.resize(chunk, 0);
        self.written = 0;

        let n = loop {
            match body.file.read(&mut self.buffer) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        // The announced Content-Length can no longer be honoured.
        if n == 0 {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "file shrank while sending",
            ));
        }

        self.buffer.truncate(n);
        body.remaining -= n as u64;
        Ok(true)
    }
}
