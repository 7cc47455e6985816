//! HTTP protocol implementation.
//!
//! This module implements just enough HTTP/1.1 to serve files: one request
//! per connection, answered and then closed.
//!
//! - **`connection`**: per-client state machine and request dispatch
//! - **`parser`**: head terminator search and request line parsing
//! - **`request`** / **`response`**: message types
//! - **`writer`**: response serialization and chunked file streaming
//! - **`mime`**: content types by file extension
//!
//! # Connection lifecycle
//!
//! ```text
//!   accept ──► Reading ──(CRLF CRLF)──► dispatch ──► Writing ──(done)──► Closed
//!                 │                        ▲            │                 ▲
//!                 ├─(head too large)───────┘ 400        └─(would block)   │
//!                 │                                        wait WRITABLE  │
//!                 └─(EOF, error, idle timeout)────────────────────────────┘
//! ```
//!
//! Dispatch runs synchronously inside the read step, so it has no variant
//! of its own in [`connection::ConnectionState`]. Every connection is
//! answered at most once and then closed.
//!
//! # Example
//!
//! ```ignore
//! use dirserve::http::connection::{Connection, Readiness};
//!
//! let mut conn = Connection::new(stream, peer, limits);
//! match conn.ready(Readiness::readable(), &site) {
//!     Step::Wait(interest) => registry.reregister(conn.stream_mut(), token, interest)?,
//!     Step::Close => drop(conn),
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
