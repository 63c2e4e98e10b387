//! Binary container: a concatenation of records
//! `magic(8) | page_index(u16 LE) | length(u16 LE) | signature(32) | ciphertext(length)`.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{Block, ContainerError, EncryptedMessage};
use crate::config::{PadConfig, SIGNATURE_LEN};

/// Fixed bytes preceding each ciphertext.
pub fn header_len(config: &PadConfig) -> usize {
    config.binary_magic.len() + 2 + 2 + SIGNATURE_LEN
}

pub(crate) fn encode(
    config: &PadConfig,
    msg: &EncryptedMessage,
) -> Result<Vec<u8>, ContainerError> {
    let total: usize = msg
        .blocks()
        .iter()
        .map(|b| header_len(config) + b.ciphertext.len())
        .sum();
    let mut out = Vec::with_capacity(total);
    for block in msg.blocks() {
        let len = u16::try_from(block.ciphertext.len()).map_err(|_| ContainerError::BlockTooLarge {
            len: block.ciphertext.len(),
            max: u16::MAX as usize,
        })?;
        out.write_all(&config.binary_magic)?;
        out.write_u16::<LittleEndian>(block.page_index)?;
        out.write_u16::<LittleEndian>(len)?;
        out.write_all(&block.signature)?;
        out.write_all(&block.ciphertext)?;
    }
    Ok(out)
}

pub(crate) fn decode(config: &PadConfig, data: &[u8]) -> Result<EncryptedMessage, ContainerError> {
    let mut cursor = Cursor::new(data);
    let mut msg = EncryptedMessage::new();
    let header = header_len(config);

    while (cursor.position() as usize) < data.len() {
        let offset = cursor.position() as usize;
        let remaining = data.len() - offset;

        // Check magic first so a foreign input reports BadMagic, not Truncated.
        let magic_len = config.binary_magic.len().min(remaining);
        if data[offset..offset + magic_len] != config.binary_magic[..magic_len] {
            return Err(ContainerError::BadMagic);
        }
        if remaining < header {
            return Err(ContainerError::Truncated { offset });
        }

        let mut magic = [0u8; 8];
        cursor.read_exact(&mut magic)?;
        let page_index = cursor.read_u16::<LittleEndian>()?;
        let len = cursor.read_u16::<LittleEndian>()? as usize;
        let mut signature = [0u8; SIGNATURE_LEN];
        cursor.read_exact(&mut signature)?;

        if len > config.page_size {
            return Err(ContainerError::BlockTooLarge { len, max: config.page_size });
        }
        if remaining - header < len {
            return Err(ContainerError::Truncated { offset });
        }
        let mut ciphertext = vec![0u8; len];
        cursor.read_exact(&mut ciphertext)?;

        msg.push(Block::new(page_index, ciphertext, signature));
    }

    Ok(msg)
}
