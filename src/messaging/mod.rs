//! Message layer: splits a plaintext across pages, encrypts and signs each
//! chunk, and reverses the process on the receiving pad.
//!
//! # Components
//! - `engine`: `encrypt_and_sign` / `decrypt_and_verify` and the length-prefix framing.
//! - `input`: bounded plaintext reading for caller layers.

pub mod engine;
pub mod input;

pub use engine::{decrypt_and_verify, encrypt_and_sign, marshal, unmarshal};
pub use input::read_plaintext;

use core::fmt;
use std::io;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::device::DeviceError;
use crate::pad::PadError;

/// Errors from the message layer.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The raw message does not fit in `max_pages` pages with its prefix.
    #[error("message of {len} bytes exceeds the {max}-byte limit")]
    MessageTooLarge { len: usize, max: usize },

    /// Nothing to encrypt.
    #[error("no data")]
    NoData,

    /// A message must hold between 1 and `max_pages` blocks.
    #[error("message has {0} blocks")]
    BlockCount(usize),

    /// Two blocks name the same page.
    #[error("page {0} is referenced by more than one block")]
    PageReused(u16),

    /// The length prefix does not fit the decrypted data.
    #[error("length prefix of {declared} bytes but only {available} available")]
    BadLength { declared: usize, available: usize },

    /// One or more blocks failed verification.
    #[error("{failed} of {total} blocks failed signature verification")]
    BadSignature {
        failed: usize,
        total: usize,
        unverified: UnverifiedPayload,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Pad(#[from] PadError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Decrypted bytes whose signatures did not verify, padding included.
///
/// The contents are never printed. They can only be reached through
/// `expose_unverified`, and are wiped on drop.
pub struct UnverifiedPayload(Zeroizing<Vec<u8>>);

impl UnverifiedPayload {
    pub(crate) fn new(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(bytes)
    }

    /// The unauthenticated decryption. An attacker may have chosen these bytes.
    pub fn expose_unverified(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for UnverifiedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnverifiedPayload({} bytes, redacted)", self.0.len())
    }
}

impl fmt::Display for UnverifiedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} unverified bytes>", self.0.len())
    }
}
