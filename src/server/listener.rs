use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, warn};

use crate::config::{Config, Limits};
use crate::http::connection::{Connection, Readiness, Step};
use crate::site::Site;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CLIENT: usize = 2;

const EVENTS_CAPACITY: usize = 1024;

/// Asks a running [`EventLoop`] to stop, from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        self.waker.wake()
    }
}

struct Client {
    conn: Connection<TcpStream>,
    /// What the stream is currently registered for.
    interest: Interest,
}

/// Single-threaded accept/read/write loop over one `mio::Poll`.
///
/// The loop owns the listener and every connection. Connections live in a
/// table keyed by their poll token, and [`EventLoop::close`] is the only way
/// out of it.
pub struct EventLoop {
    poll: Poll,
    listener: TcpListener,
    waker: Arc<Waker>,
    connections: HashMap<Token, Client>,
    next_token: usize,
    site: Site,
    limits: Limits,
}

impl EventLoop {
    pub fn bind(addr: SocketAddr, site: Site, limits: Limits) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        Ok(Self {
            poll,
            listener,
            waker,
            connections: HashMap::new(),
            next_token: FIRST_CLIENT,
            site,
            limits,
        })
    }

    /// Validates the limits, canonicalizes the root, resolves the bind
    /// address and binds.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let limits = cfg.server.limits()?;
        let site = Site::from_config(&cfg.static_files)?;
        let addr = cfg.server.bind_addr()?;
        Self::bind(addr, site, limits)
            .with_context(|| format!("failed to listen on {addr}"))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: Arc::clone(&self.waker),
        }
    }

    /// Runs until a shutdown is requested. Any poll failure other than an
    /// interrupted wait is returned and ends the server.
    pub fn run(&mut self) -> io::Result<()> {
        info!(
            addr = %self.local_addr()?,
            root = %self.site.root().display(),
            "Listening"
        );

        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        loop {
            let timeout = self.next_timeout(Instant::now());
            if let Err(e) = self.poll.poll(&mut events, timeout) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %e, "poll failed");
                return Err(e);
            }

            let mut shutdown = false;
            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_all(),
                    WAKER => shutdown = true,
                    token => self.drive(token, Readiness::from_event(event)),
                }
            }

            if shutdown {
                info!(open = self.connections.len(), "Shutting down");
                self.close_all();
                return Ok(());
            }

            self.expire_idle(Instant::now());
        }
    }

    /// Edge-triggered: one notification may stand for many queued
    /// connections, so accept until the listener would block.
    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::Interrupted | ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    fn admit(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        if self.connections.len() >= self.limits.max_connections {
            warn!(
                peer = %peer,
                limit = self.limits.max_connections,
                "connection table full, dropping client"
            );
            return;
        }

        let token = self.next_token();
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut stream, token, Interest::READABLE)
        {
            warn!(peer = %peer, error = %e, "failed to register client");
            return;
        }

        debug!(peer = %peer, token = token.0, "Accepted connection");
        self.connections.insert(
            token,
            Client {
                conn: Connection::new(stream, peer, self.limits),
                interest: Interest::READABLE,
            },
        );
    }

    fn next_token(&mut self) -> Token {
        loop {
            let token = Token(self.next_token);
            self.next_token = if self.next_token == usize::MAX {
                FIRST_CLIENT
            } else {
                self.next_token + 1
            };

            if !self.connections.contains_key(&token) {
                return token;
            }
        }
    }

    fn drive(&mut self, token: Token, readiness: Readiness) {
        // Events for a connection closed earlier in the same batch.
        let Some(client) = self.connections.get_mut(&token) else {
            return;
        };

        match client.conn.ready(readiness, &self.site) {
            Step::Wait(interest) if interest != client.interest => {
                if let Err(e) =
                    self.poll
                        .registry()
                        .reregister(client.conn.stream_mut(), token, interest)
                {
                    debug!(peer = %client.conn.peer(), error = %e, "reregister failed");
                    self.close(token);
                    return;
                }
                client.interest = interest;
            }
            Step::Wait(_) => {}
            Step::Close => self.close(token),
        }
    }

    /// Deregisters and drops a connection, which closes its socket. Every
    /// exit path ends here, so each descriptor is released exactly once.
    fn close(&mut self, token: Token) {
        let Some(mut client) = self.connections.remove(&token) else {
            return;
        };

        if let Err(e) = self.poll.registry().deregister(client.conn.stream_mut()) {
            debug!(peer = %client.conn.peer(), error = %e, "deregister failed");
        }
        debug!(
            peer = %client.conn.peer(),
            response_sent = client.conn.response_sent(),
            "Connection closed"
        );
    }

    fn close_all(&mut self) {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.close(token);
        }
    }

    fn expire_idle(&mut self, now: Instant) {
        let expired: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, client)| client.conn.is_expired(now))
            .map(|(token, _)| *token)
            .collect();

        for token in expired {
            if let Some(client) = self.connections.get(&token) {
                debug!(
                    peer = %client.conn.peer(),
                    buffered = client.conn.buffered(),
                    "idle timeout"
                );
            }
            self.close(token);
        }
    }

    /// Time until the earliest connection deadline; `None` blocks indefinitely.
    fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.connections
            .values()
            .map(|client| client.conn.deadline())
            .min()
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
