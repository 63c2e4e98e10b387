//! One-time pad pages.
//!
//! A `Page` is one block of device-supplied random bytes: a keystream of
//! `page_size` bytes followed by 16 bytes of HMAC salt and 32 bytes of MAC
//! mask. Every cryptographic operation takes the page by value, so a page
//! cannot be used twice; its material is zeroized when the call returns.
//!
//! # Components
//! - `page`: the `Page` type and its split halves `Keystream` and `MacKey`.

pub mod page;

pub use page::{Keystream, MacKey, Page, Signature};

use thiserror::Error;

/// Errors related to page use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PadError {
    /// The device reported the page as already used; it carries no material.
    #[error("page {index} has already been consumed")]
    Consumed { index: u16 },

    /// Data is longer than the page keystream.
    #[error("data of {len} bytes exceeds the {max}-byte page keystream")]
    DataTooLong { len: usize, max: usize },

    /// Page material has the wrong length.
    #[error("page material is {actual} bytes, expected {expected}")]
    MalformedMaterial { expected: usize, actual: usize },
}
