//! Page crypto primitives.
//!
//! - `xor`: keystream application (encryption is its own inverse).
//! - `masked_mac`: HMAC-SHA256 tag XORed with a one-time mask.
//!
//! Both operate on borrowed key material; one-time use of that material is
//! enforced by `crate::pad::Page`.

pub mod masked_mac;
pub mod xor;
