//! Snap-Pad device protocol.
//!
//! The pad speaks a line-oriented text protocol over a byte stream. Every
//! command is one line; its response must be consumed completely before the
//! next command is written.
//!
//! # Components
//! - `transport`: the injected byte-stream collaborator.
//! - `frame`: parsers for version, diagnostics, and page preamble lines.
//! - `client`: `PadClient`, the request/response session.
//! - `rng`: the hardware RNG tap as a `rand_core` RNG.
//! - `shared`: a lock around a session for multi-threaded callers.
//! - `mock`: a software stand-in for the hardware.

pub mod client;
pub mod frame;
pub mod mock;
pub mod rng;
pub mod shared;
pub mod transport;

pub use client::PadClient;
pub use transport::{StreamTransport, Transport};

use std::io;

use thiserror::Error;

/// Errors raised while talking to the pad.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Malformed or unexpected response; the session is out of step.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The device did not answer in time, typically because the
    /// confirmation button was not pressed.
    #[error("timed out waiting for the device")]
    Timeout,

    /// The firmware cannot be used (factory test build, unknown variant,
    /// or an unparseable version string).
    #[error("firmware error: {0}")]
    Firmware(String),

    /// Page count outside `1..=max_pages`.
    #[error("page count {count} is outside 1..={max}")]
    BadCount { count: usize, max: usize },

    /// Page index 0 is never assigned by the device.
    #[error("invalid page index {0}")]
    InvalidPageIndex(u16),

    /// The device answered with an `ERROR:` line.
    #[error("device reported error: {0}")]
    Device(String),

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for DeviceError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DeviceError::Timeout,
            io::ErrorKind::UnexpectedEof => {
                DeviceError::Protocol(String::from("unexpected end of stream"))
            }
            _ => DeviceError::Io(err),
        }
    }
}

impl DeviceError {
    /// True if the session may be out of step and should be reopened.
    pub fn desynchronizes(&self) -> bool {
        matches!(self, DeviceError::Protocol(_) | DeviceError::Timeout | DeviceError::Io(_))
    }
}
