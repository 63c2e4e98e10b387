//! Encrypted message containers.
//!
//! An `EncryptedMessage` is an ordered list of 1 to `max_pages` blocks, each
//! `(page index, ciphertext, signature)`. It has three interchangeable
//! serializations:
//! - `binary`: a stream of fixed-header records (`SP-BLOCK` magic).
//! - `json`: an object with `Magic`, `Version` and a `Blocks` array.
//! - `armor`: the binary form, base64-wrapped between text markers.
//!
//! Auto-detection on decode tries armor, then JSON, then binary.

pub mod armor;
pub mod binary;
pub mod json;

use core::fmt;
use core::str::FromStr;
use std::io;

use thiserror::Error;

use crate::config::PadConfig;
use crate::pad::Signature;

/// Errors raised while encoding or decoding a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Missing or incorrect magic literal.
    #[error("missing or incorrect container magic")]
    BadMagic,

    /// Container version is missing or not the supported one.
    #[error("unsupported container version {found:?}, expected {expected:?}")]
    BadVersion { expected: String, found: Option<String> },

    /// Input ended inside a record.
    #[error("container truncated at byte {offset}")]
    Truncated { offset: usize },

    /// A block carries more ciphertext than one page can encrypt.
    #[error("block of {len} bytes exceeds the {max}-byte page size")]
    BlockTooLarge { len: usize, max: usize },

    /// A message must hold between 1 and `max_pages` blocks.
    #[error("message has {count} blocks, expected 1..={max}")]
    BlockCount { count: usize, max: usize },

    /// Page index 0 is never assigned.
    #[error("invalid page index {0}")]
    BadPageIndex(u16),

    /// Signatures are exactly 32 bytes.
    #[error("signature is {0} bytes, expected 32")]
    BadSignatureLength(usize),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Armored text does not start with the begin marker.
    #[error("missing armor begin marker")]
    MissingBeginMarker,

    /// Armored text ended before the end marker.
    #[error("armor end marker not found")]
    UnterminatedArmor,

    #[error("armored container is not valid UTF-8")]
    NotUtf8,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One encrypted chunk of a message.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    pub page_index: u16,
    pub ciphertext: Vec<u8>,
    pub signature: Signature,
}

impl Block {
    pub fn new(page_index: u16, ciphertext: Vec<u8>, signature: Signature) -> Self {
        Self { page_index, ciphertext, signature }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("page_index", &self.page_index)
            .field("ciphertext_len", &self.ciphertext.len())
            .field("signature", &hex::encode(self.signature))
            .finish()
    }
}

/// Ordered blocks of one encrypted message. Order is chunk order of the
/// plaintext, not page order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptedMessage {
    blocks: Vec<Block>,
}

impl EncryptedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, page_index: u16, ciphertext: Vec<u8>, signature: Signature) {
        self.blocks.push(Block::new(page_index, ciphertext, signature));
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Distinct page indices in order of first appearance.
    pub fn page_indices(&self) -> Vec<u16> {
        let mut seen = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            if !seen.contains(&block.page_index) {
                seen.push(block.page_index);
            }
        }
        seen
    }
}

impl From<Vec<Block>> for EncryptedMessage {
    fn from(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }
}

/// Container serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Binary,
    Json,
    Armor,
}

impl Format {
    /// Order in which `decode_auto` tries the formats.
    pub const DETECTION_ORDER: [Format; 3] = [Format::Armor, Format::Json, Format::Binary];
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Binary => "bin",
            Format::Json => "json",
            Format::Armor => "ascii",
        };
        f.write_str(name)
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bin" | "binary" => Ok(Format::Binary),
            "json" => Ok(Format::Json),
            "ascii" | "armor" | "asc" => Ok(Format::Armor),
            other => Err(format!("unknown container format {:?}", other)),
        }
    }
}

/// Encodes and decodes containers under one protocol configuration.
#[derive(Debug, Clone, Default)]
pub struct ContainerCodec {
    config: PadConfig,
}

impl ContainerCodec {
    pub fn new(config: PadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PadConfig {
        &self.config
    }

    pub fn to_binary(&self, msg: &EncryptedMessage) -> Result<Vec<u8>, ContainerError> {
        self.validate(msg)?;
        binary::encode(&self.config, msg)
    }

    pub fn from_binary(&self, data: &[u8]) -> Result<EncryptedMessage, ContainerError> {
        let msg = binary::decode(&self.config, data)?;
        self.validate(&msg)?;
        Ok(msg)
    }

    pub fn to_json(&self, msg: &EncryptedMessage) -> Result<String, ContainerError> {
        self.validate(msg)?;
        json::encode(&self.config, msg)
    }

    pub fn from_json(&self, data: &[u8]) -> Result<EncryptedMessage, ContainerError> {
        let msg = json::decode(&self.config, data)?;
        self.validate(&msg)?;
        Ok(msg)
    }

    pub fn to_armor(&self, msg: &EncryptedMessage) -> Result<String, ContainerError> {
        self.validate(msg)?;
        armor::encode(&self.config, msg)
    }

    pub fn from_armor(&self, data: &[u8]) -> Result<EncryptedMessage, ContainerError> {
        let msg = armor::decode(&self.config, data)?;
        self.validate(&msg)?;
        Ok(msg)
    }

    /// Serializes `msg` in `format`.
    pub fn encode(
        &self,
        format: Format,
        msg: &EncryptedMessage,
    ) -> Result<Vec<u8>, ContainerError> {
        match format {
            Format::Binary => self.to_binary(msg),
            Format::Json => self.to_json(msg).map(String::into_bytes),
            Format::Armor => self.to_armor(msg).map(String::into_bytes),
        }
    }

    /// Parses `data` as `format`.
    pub fn decode(&self, format: Format, data: &[u8]) -> Result<EncryptedMessage, ContainerError> {
        match format {
            Format::Binary => self.from_binary(data),
            Format::Json => self.from_json(data),
            Format::Armor => self.from_armor(data),
        }
    }

    /// Tries each format in `Format::DETECTION_ORDER` and returns the first
    /// that parses. If none does, the last error is returned.
    pub fn decode_auto(&self, data: &[u8]) -> Result<(Format, EncryptedMessage), ContainerError> {
        let mut last_err = None;
        for format in Format::DETECTION_ORDER {
            match self.decode(format, data) {
                Ok(msg) => {
                    log::debug!("Detected {} container with {} blocks", format, msg.len());
                    return Ok((format, msg));
                }
                Err(err) => {
                    log::trace!("Not a {} container: {}", format, err);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(ContainerError::BadMagic))
    }

    fn validate(&self, msg: &EncryptedMessage) -> Result<(), ContainerError> {
        let max = self.config.max_pages;
        if msg.is_empty() || msg.len() > max {
            return Err(ContainerError::BlockCount { count: msg.len(), max });
        }
        for block in msg.blocks() {
            if block.page_index == 0 {
                return Err(ContainerError::BadPageIndex(0));
            }
            if block.ciphertext.len() > self.config.page_size {
                return Err(ContainerError::BlockTooLarge {
                    len: block.ciphertext.len(),
                    max: self.config.page_size,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four blocks of growing size.
    fn sample_message() -> EncryptedMessage {
        let mut msg = EncryptedMessage::new();
        for i in 1..=4u8 {
            msg.add_block(i as u16, vec![b'*'; 1 << i], [i; 32]);
        }
        msg
    }

    fn codec() -> ContainerCodec {
        ContainerCodec::default()
    }

    #[test]
    fn test_equality_depends_on_all_blocks_in_order() {
        let full = sample_message();
        for n in 1..4 {
            let partial: EncryptedMessage = full.blocks()[..n].to_vec().into();
            assert_ne!(partial, full);
            assert_ne!(full, partial);
        }
        let mut reordered = full.blocks().to_vec();
        reordered.swap(0, 1);
        assert_ne!(EncryptedMessage::from(reordered), full);
        assert_eq!(full.clone(), full);
    }

    #[test]
    fn test_roundtrip_all_formats() {
        let c = codec();
        let msg = sample_message();
        assert_eq!(c.from_binary(&c.to_binary(&msg).unwrap()).unwrap(), msg);
        assert_eq!(c.from_json(c.to_json(&msg).unwrap().as_bytes()).unwrap(), msg);
        assert_eq!(c.from_armor(c.to_armor(&msg).unwrap().as_bytes()).unwrap(), msg);
    }

    #[test]
    fn test_roundtrip_chain() {
        let c = codec();
        let msg = sample_message();
        let from_json = c.from_json(c.to_json(&msg).unwrap().as_bytes()).unwrap();
        let from_bin = c.from_binary(&c.to_binary(&from_json).unwrap()).unwrap();
        let from_armor = c.from_armor(c.to_armor(&from_bin).unwrap().as_bytes()).unwrap();
        assert_eq!(from_armor, msg);
    }

    #[test]
    fn test_cross_format_rejection() {
        let c = codec();
        let msg = sample_message();
        let bin = c.encode(Format::Binary, &msg).unwrap();
        let json = c.encode(Format::Json, &msg).unwrap();
        let armor = c.encode(Format::Armor, &msg).unwrap();

        assert!(c.from_json(&bin).is_err());
        assert!(c.from_json(&armor).is_err());
        assert!(c.from_binary(&json).is_err());
        assert!(c.from_binary(&armor).is_err());
        assert!(c.from_armor(&json).is_err());
        assert!(c.from_armor(&bin).is_err());
    }

    #[test]
    fn test_decode_auto() {
        let c = codec();
        let msg = sample_message();
        for format in [Format::Binary, Format::Json, Format::Armor] {
            let data = c.encode(format, &msg).unwrap();
            let (detected, decoded) = c.decode_auto(&data).unwrap();
            assert_eq!(detected, format);
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_decode_auto_reports_last_error() {
        let err = codec().decode_auto(b"definitely not a container").unwrap_err();
        // Binary is tried last.
        assert!(matches!(err, ContainerError::BadMagic | ContainerError::Truncated { .. }));
    }

    #[test]
    fn test_block_count_limits() {
        let c = codec();
        let empty = EncryptedMessage::new();
        assert!(matches!(
            c.to_binary(&empty),
            Err(ContainerError::BlockCount { count: 0, max: 4 })
        ));
        assert!(matches!(c.from_binary(&[]), Err(ContainerError::BlockCount { count: 0, .. })));

        let mut five = sample_message();
        five.add_block(5, vec![1, 2, 3], [5; 32]);
        assert!(matches!(c.to_json(&five), Err(ContainerError::BlockCount { count: 5, .. })));
    }

    #[test]
    fn test_block_limits() {
        let c = codec();
        let mut msg = EncryptedMessage::new();
        msg.add_block(1, vec![0u8; 2049], [0; 32]);
        assert!(matches!(
            c.to_armor(&msg),
            Err(ContainerError::BlockTooLarge { len: 2049, max: 2048 })
        ));

        let mut msg = EncryptedMessage::new();
        msg.add_block(0, vec![0u8; 4], [0; 32]);
        assert!(matches!(c.to_binary(&msg), Err(ContainerError::BadPageIndex(0))));
    }

    #[test]
    fn test_page_indices_first_appearance() {
        let mut msg = EncryptedMessage::new();
        for idx in [9u16, 3, 9, 5] {
            msg.add_block(idx, vec![], [0; 32]);
        }
        assert_eq!(msg.page_indices(), vec![9, 3, 5]);
    }

    #[test]
    fn test_format_names() {
        assert_eq!("bin".parse::<Format>().unwrap(), Format::Binary);
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("ascii".parse::<Format>().unwrap(), Format::Armor);
        assert!("xml".parse::<Format>().is_err());
        assert_eq!(Format::Armor.to_string(), "ascii");
    }

    #[test]
    fn test_block_debug_shows_hex_signature() {
        let b = Block::new(3, vec![1, 2], [0xAB; 32]);
        let s = format!("{:?}", b);
        assert!(s.contains("abababab"));
        assert!(s.contains("ciphertext_len: 2"));
    }
}
