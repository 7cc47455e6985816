use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use mio::Interest;
use mio::event::Event;

use crate::config::{Limits, MAX_IDLE_TIMEOUT_SECS, MIN_HEADER_BYTES};
use crate::http::mime::mime_for_path;
use crate::http::parser::{find_headers_end, parse_request};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::{ResponseWriter, WriteProgress};
use crate::site::Site;
use crate::site::listing::ListError;
use crate::site::resolver::{ResolveError, ResolvedTarget};

const READ_CHUNK: usize = 4096;

const MAX_IDLE_TIMEOUT: Duration = Duration::from_secs(MAX_IDLE_TIMEOUT_SECS);

/// What the event loop reported for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    /// Socket error, or the peer can no longer receive.
    pub failed: bool,
}

impl Readiness {
    pub fn from_event(event: &Event) -> Self {
        Self {
            // A half-closed peer may still have request bytes queued.
            readable: event.is_readable() || event.is_read_closed(),
            writable: event.is_writable(),
            failed: event.is_error() || event.is_write_closed(),
        }
    }

    pub fn readable() -> Self {
        Self {
            readable: true,
            ..Self::default()
        }
    }

    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }
}

/// What the event loop should do with a connection after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep it registered with this interest.
    Wait(Interest),
    /// Deregister and drop it.
    Close,
}

pub enum ConnectionState {
    Reading,
    Writing(ResponseWriter),
    Closed,
}

/// One accepted client, from its first byte to the end of its response.
///
/// The stream is owned here and nowhere else; dropping the connection
/// closes it.
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    buffer: BytesMut,
    state: ConnectionState,
    response_sent: bool,
    limits: Limits,
    deadline: Instant,
    request_line: Option<(String, String)>,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, peer: SocketAddr, limits: Limits) -> Self {
        let limits = Limits {
            max_header_bytes: limits.max_header_bytes.max(MIN_HEADER_BYTES),
            ..limits
        };

        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(READ_CHUNK.min(limits.max_header_bytes)),
            state: ConnectionState::Reading,
            response_sent: false,
            limits,
            deadline: idle_deadline(Instant::now(), limits.idle_timeout),
            request_line: None,
        }
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }

    pub fn response_sent(&self) -> bool {
        self.response_sent
    }

    /// Bytes of the request head received so far.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        !self.is_closed() && now >= self.deadline
    }

    /// The registration this state needs, or `None` once closed.
    pub fn interest(&self) -> Option<Interest> {
        match self.state {
            ConnectionState::Reading => Some(Interest::READABLE),
            ConnectionState::Writing(_) => Some(Interest::WRITABLE),
            ConnectionState::Closed => None,
        }
    }

    /// Advances the state machine for one readiness notification.
    pub fn ready(&mut self, readiness: Readiness, site: &Site) -> Step {
        if readiness.failed && !self.is_closed() {
            tracing::debug!(peer = %self.peer, "peer hung up or socket error");
            self.state = ConnectionState::Closed;
        }

        let mut dispatched = false;
        if readiness.readable && matches!(self.state, ConnectionState::Reading) {
            self.read_request(site);
            dispatched = matches!(self.state, ConnectionState::Writing(_));
        }

        // A fresh response is flushed straight away; the socket is usually writable.
        if dispatched || readiness.writable {
            self.flush();
        }

        match self.interest() {
            Some(interest) => Step::Wait(interest),
            None => Step::Close,
        }
    }

    /// Drains the socket into the head buffer until it would block, the head
    /// is complete, or the buffer is full.
    fn read_request(&mut self, site: &Site) {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let room = self.limits.max_header_bytes - self.buffer.len();
            let want = room.min(READ_CHUNK);

            match self.stream.read(&mut chunk[..want]) {
                Ok(0) => {
                    tracing::debug!(
                        peer = %self.peer,
                        buffered = self.buffer.len(),
                        "peer closed before completing request"
                    );
                    self.state = ConnectionState::Closed;
                    return;
                }
                Ok(n) => {
                    // Only the new bytes plus three of overlap can hold a new terminator.
                    let search_from = self.buffer.len().saturating_sub(3);
                    self.buffer.extend_from_slice(&chunk[..n]);

                    if let Some(end) = find_headers_end(&self.buffer[search_from..]) {
                        let writer = self.dispatch(site, search_from + end);
                        self.state = ConnectionState::Writing(writer);
                        return;
                    }

                    if self.buffer.len() >= self.limits.max_header_bytes {
                        tracing::warn!(
                            peer = %self.peer,
                            limit = self.limits.max_header_bytes,
                            "request head too large"
                        );
                        let writer = ResponseWriter::new(&Response::bad_request(), site.server_name());
                        self.state = ConnectionState::Writing(writer);
                        return;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "read failed");
                    self.state = ConnectionState::Closed;
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, site: &Site, head_end: usize) -> ResponseWriter {
        let request = match parse_request(&self.buffer[..head_end]) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "rejecting request");
                return ResponseWriter::new(&Response::bad_request(), site.server_name());
            }
        };

        tracing::trace!(
            peer = %self.peer,
            method = %request.method,
            path = %request.path,
            user_agent = request.user_agent(),
            "request received"
        );

        self.request_line = Some((request.method.to_string(), request.path.clone()));
        handle_request(site, &request, self.peer)
    }

    fn flush(&mut self) {
        let ConnectionState::Writing(writer) = &mut self.state else {
            return;
        };

        let before = writer.bytes_sent();
        match writer.write_to(&mut self.stream) {
            Ok(WriteProgress::Done) => {
                let (method, path) = self
                    .request_line
                    .as_ref()
                    .map(|(m, p)| (m.as_str(), p.as_str()))
                    .unwrap_or(("-", "-"));
                tracing::info!(
                    peer = %self.peer,
                    method,
                    path,
                    status = writer.status().as_u16(),
                    bytes = writer.body_len(),
                    "response sent"
                );
                self.response_sent = true;
                self.state = ConnectionState::Closed;
            }
            Ok(WriteProgress::Blocked) => {
                if writer.bytes_sent() > before {
                    self.deadline = idle_deadline(Instant::now(), self.limits.idle_timeout);
                }
            }
            Err(e) => {
                // Mid-response; nothing more can be told to the client.
                tracing::debug!(peer = %self.peer, error = %e, "abandoning response");
                self.state = ConnectionState::Closed;
            }
        }
    }
}

/// `now + timeout`, with the timeout capped so the sum cannot overflow.
fn idle_deadline(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout.min(MAX_IDLE_TIMEOUT)).unwrap_or(now)
}

/// Produces the response for a parsed request.
///
/// Only GET is served. The resolved path is never logged; a refused target
/// is reported by the path the client sent.
pub fn handle_request(site: &Site, request: &Request, peer: SocketAddr) -> ResponseWriter {
    let server = site.server_name();

    if request.method != Method::GET {
        return ResponseWriter::new(&Response::method_not_allowed(), server);
    }

    let path = request.target_path();
    let target = match site.resolve(path) {
        Ok(target) => target,
        Err(ResolveError::Forbidden) => {
            tracing::warn!(peer = %peer, path = %request.path, "forbidden request path");
            return ResponseWriter::new(&Response::forbidden(), server);
        }
        Err(ResolveError::NotFound) => {
            return ResponseWriter::new(&Response::not_found(), server);
        }
    };

    match target {
        ResolvedTarget::Directory { path: dir } => {
            let response = match site.list(&dir, path) {
                Ok(page) => Response::html(page),
                Err(ListError::BufferExceeded) => {
                    tracing::warn!(
                        path = %request.path,
                        limit = site.listing_limit(),
                        "directory listing exceeds limit"
                    );
                    Response::internal_error()
                }
                Err(ListError::Io(e)) if e.kind() == ErrorKind::PermissionDenied => {
                    Response::error(StatusCode::Forbidden)
                }
                Err(ListError::Io(e)) => {
                    tracing::error!(path = %request.path, error = %e, "directory listing failed");
                    Response::internal_error()
                }
            };
            ResponseWriter::new(&response, server)
        }
        ResolvedTarget::File { path: file_path, file, len } => {
            let head = Response::file_head(mime_for_path(&file_path), len);
            ResponseWriter::with_file(&head, server, file, len)
        }
    }
}
