//! Message engine.
//!
//! Encrypt path: prefix the plaintext with its length (u16 big-endian), pad
//! it with hardware RNG bytes to a whole number of pages, provision that many
//! pages and seal chunk *i* with the *i*-th provisioned page.
//!
//! Decrypt path: retrieve every page the message names, open each block in
//! order, and release the plaintext only if every signature verifies.

use std::collections::{HashMap, HashSet};

use byteorder::{BigEndian, ByteOrder};
use zeroize::Zeroizing;

use super::{MessageError, UnverifiedPayload};
use crate::config::{PadConfig, LENGTH_PREFIX_LEN};
use crate::container::EncryptedMessage;
use crate::device::{DeviceError, PadClient, Transport};
use crate::pad::Page;

/// Prepends the big-endian length of `data`. No padding is added.
pub fn marshal(data: &[u8], config: &PadConfig) -> Result<Zeroizing<Vec<u8>>, MessageError> {
    let max = config.max_message_len().min(u16::MAX as usize);
    if data.len() > max {
        return Err(MessageError::MessageTooLarge { len: data.len(), max });
    }
    let mut out = Zeroizing::new(vec![0u8; LENGTH_PREFIX_LEN]);
    BigEndian::write_u16(&mut out[..], data.len() as u16);
    out.extend_from_slice(data);
    Ok(out)
}

/// Reads the length prefix and returns exactly that many following bytes.
pub fn unmarshal(data: &[u8]) -> Result<Vec<u8>, MessageError> {
    if data.len() < LENGTH_PREFIX_LEN {
        return Err(MessageError::BadLength { declared: LENGTH_PREFIX_LEN, available: data.len() });
    }
    let (prefix, body) = data.split_at(LENGTH_PREFIX_LEN);
    let declared = BigEndian::read_u16(prefix) as usize;
    if declared > body.len() {
        return Err(MessageError::BadLength { declared, available: body.len() });
    }
    Ok(body[..declared].to_vec())
}

/// Encrypts and signs `data` with freshly provisioned pages.
///
/// Oversized input is rejected before anything is sent to the pad.
pub fn encrypt_and_sign<T: Transport>(
    client: &mut PadClient<T>,
    data: &[u8],
) -> Result<EncryptedMessage, MessageError> {
    let page_size = client.config().page_size;
    let mut marshaled = marshal(data, client.config())?;
    let page_count = client.config().pages_for(marshaled.len());

    let padding = Zeroizing::new(client.read_rng(page_count * page_size - marshaled.len())?);
    marshaled.extend_from_slice(&padding);

    let pages = client.provision_pages(page_count)?;
    if pages.len() != page_count {
        return Err(DeviceError::Protocol(format!(
            "asked for {} pages, received {}",
            page_count,
            pages.len()
        ))
        .into());
    }

    let mut msg = EncryptedMessage::new();
    for (chunk, page) in marshaled.chunks(page_size).zip(pages) {
        let index = page.index();
        let (ciphertext, signature) = page.seal(chunk)?;
        log::debug!("Block on page {} signed {}", index, hex::encode(signature));
        msg.add_block(index, ciphertext, signature);
    }
    log::info!("Encrypted {} bytes into {} blocks", data.len(), msg.len());
    Ok(msg)
}

/// Retrieves the pages `msg` names, decrypts every block and checks its
/// signature. A page named by more than one block is rejected as `PageReused`.
///
/// # Errors
/// `MessageError::BadSignature` if any block fails verification. The
/// decrypted bytes travel inside the error as an `UnverifiedPayload`.
pub fn decrypt_and_verify<T: Transport>(
    client: &mut PadClient<T>,
    msg: &EncryptedMessage,
) -> Result<Vec<u8>, MessageError> {
    let total = msg.len();
    if total == 0 || total > client.config().max_pages {
        return Err(MessageError::BlockCount(total));
    }
    let mut seen = HashSet::with_capacity(total);
    for block in msg.blocks() {
        if !seen.insert(block.page_index) {
            return Err(MessageError::PageReused(block.page_index));
        }
    }

    let indices = msg.page_indices();
    let mut pages: HashMap<u16, Page> = client
        .retrieve_pages(&indices)?
        .into_iter()
        .map(|page| (page.index(), page))
        .collect();

    let mut plaintext = Zeroizing::new(Vec::with_capacity(total * client.config().page_size));
    let mut failed = 0;
    for block in msg.blocks() {
        let page = pages.remove(&block.page_index).ok_or_else(|| {
            DeviceError::Protocol(format!("page {} missing from retrieval", block.page_index))
        })?;
        let (chunk, valid) = page.open(&block.ciphertext, &block.signature)?;
        let chunk = Zeroizing::new(chunk);
        if !valid {
            log::warn!("Signature check failed for block on page {}", block.page_index);
            failed += 1;
        }
        plaintext.extend_from_slice(&chunk);
    }

    if failed > 0 {
        log::error!("{} of {} blocks failed signature verification", failed, total);
        return Err(MessageError::BadSignature {
            failed,
            total,
            unverified: UnverifiedPayload::new(plaintext),
        });
    }
    unmarshal(&plaintext)
}
