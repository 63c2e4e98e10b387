//! Protocol configuration for a Snap-Pad session.
//!
//! Every component (page protocol client, crypto engine, message engine,
//! container codec) receives a `PadConfig` at construction instead of
//! reading module-level constants.

use std::time::Duration;

/// Bytes of HMAC salt at the start of a page's key material.
pub const SALT_LEN: usize = 16;

/// Bytes of MAC mask following the salt.
pub const MASK_LEN: usize = 32;

/// Total key material appended to every page payload.
pub const KEY_MATERIAL_LEN: usize = SALT_LEN + MASK_LEN;

/// Length of a block signature (masked HMAC-SHA256 tag).
pub const SIGNATURE_LEN: usize = 32;

/// Length of the big-endian length prefix in a marshaled plaintext.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Immutable protocol constants shared by all components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadConfig {
    /// Random data bytes per page (the keystream length).
    pub page_size: usize,

    /// Maximum number of pages a single command or message may use.
    pub max_pages: usize,

    /// Bytes returned by one `#` RNG command.
    pub rng_chunk_len: usize,

    /// Read timeout for ordinary command responses.
    pub command_timeout: Duration,

    /// Read timeout while waiting for a page preamble. The device blocks on
    /// a physical button press before answering.
    pub page_wait_timeout: Duration,

    /// Magic literal opening every binary container record.
    pub binary_magic: [u8; 8],

    /// Value of the `Magic` field in JSON containers.
    pub json_magic: String,

    /// Container format version.
    pub version: String,

    /// First line of an ASCII-armored container.
    pub armor_begin: String,

    /// Last line of an ASCII-armored container.
    pub armor_end: String,

    /// Base64 column width inside the armor.
    pub armor_line_width: usize,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            page_size: 2048,
            max_pages: 4,
            rng_chunk_len: 64,
            command_timeout: Duration::from_secs(1),
            page_wait_timeout: Duration::from_secs(11),
            binary_magic: *b"SP-BLOCK",
            json_magic: String::from("Snap-Pad OTP Message"),
            version: String::from("1.0"),
            armor_begin: String::from("-----BEGIN SNAP-PAD MESSAGE-----"),
            armor_end: String::from("-----END SNAP-PAD MESSAGE-----"),
            armor_line_width: 64,
        }
    }
}

impl PadConfig {
    /// Decoded length of a `BEGIN PAGE` body: payload plus key material.
    pub fn frame_len(&self) -> usize {
        self.page_size + KEY_MATERIAL_LEN
    }

    /// Largest marshaled plaintext (prefix + message + padding) in bytes.
    pub fn max_marshaled_len(&self) -> usize {
        self.page_size * self.max_pages
    }

    /// Largest raw message that still fits the prefix within `max_pages`.
    pub fn max_message_len(&self) -> usize {
        self.max_marshaled_len() - LENGTH_PREFIX_LEN
    }

    /// Pages needed to carry `marshaled_len` bytes.
    pub fn pages_for(&self, marshaled_len: usize) -> usize {
        marshaled_len.div_ceil(self.page_size)
    }
}
