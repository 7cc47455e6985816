//! The readiness-driven server loop.

pub mod listener;

pub use listener::{EventLoop, ShutdownHandle};
