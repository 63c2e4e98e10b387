//! Page lifecycle and the per-page crypto engine.
//!
//! # Security
//! - **Move semantics**: every operation consumes the `Page` (or its halves),
//!   so the same keystream or MAC key cannot be applied twice.
//! - **Zeroization**: material lives in `Zeroizing` buffers and is wiped on drop.
//! - **USED pages**: a page the device reported as used carries no material and
//!   fails every operation with `PadError::Consumed`.

use core::fmt;

use zeroize::Zeroizing;

use super::PadError;
use crate::config::{PadConfig, KEY_MATERIAL_LEN, MASK_LEN, SALT_LEN, SIGNATURE_LEN};
use crate::core::masked_mac::{masked_tag, verify as verify_tag};
use crate::core::xor::xor;

/// Masked HMAC-SHA256 tag over one block's ciphertext.
pub type Signature = [u8; SIGNATURE_LEN];

/// One physical one-time-use page as returned by the device.
pub struct Page {
    index: u16,
    /// `keystream || salt || mask`; `None` when the device answered `USED`.
    material: Option<Zeroizing<Vec<u8>>>,
}

impl Page {
    /// Wraps freshly read page material. The material must be exactly
    /// `config.frame_len()` bytes.
    pub fn fresh(index: u16, material: Vec<u8>, config: &PadConfig) -> Result<Self, PadError> {
        let material = Zeroizing::new(material);
        if material.len() != config.frame_len() {
            return Err(PadError::MalformedMaterial {
                expected: config.frame_len(),
                actual: material.len(),
            });
        }
        Ok(Self { index, material: Some(material) })
    }

    /// A page the device reported as already used.
    pub fn used(index: u16) -> Self {
        Self { index, material: None }
    }

    /// Device-assigned page index.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// True if the page carries no usable material.
    pub fn is_consumed(&self) -> bool {
        self.material.is_none()
    }

    /// Usable keystream bytes (zero for a consumed page).
    pub fn keystream_len(&self) -> usize {
        self.material
            .as_ref()
            .map_or(0, |m| m.len().saturating_sub(KEY_MATERIAL_LEN))
    }

    /// Splits the page into its keystream and MAC key halves.
    pub fn split(self) -> Result<(Keystream, MacKey), PadError> {
        let index = self.index;
        let material = self.material.ok_or(PadError::Consumed { index })?;
        if material.len() < KEY_MATERIAL_LEN {
            return Err(PadError::MalformedMaterial {
                expected: KEY_MATERIAL_LEN,
                actual: material.len(),
            });
        }
        let ks_len = material.len() - KEY_MATERIAL_LEN;
        let (keystream, keymat) = material.split_at(ks_len);
        let mac_key = MacKey::from_key_material(keymat)?;

        Ok((Keystream { index, bytes: Zeroizing::new(keystream.to_vec()) }, mac_key))
    }

    /// XORs `data` with the start of the keystream. Applying it to the output
    /// with the same page bytes returns the input.
    pub fn encrypt_or_decrypt(self, data: &[u8]) -> Result<Vec<u8>, PadError> {
        let (keystream, _) = self.split()?;
        keystream.apply(data)
    }

    /// Masked HMAC over `data`.
    pub fn sign(self, data: &[u8]) -> Result<Signature, PadError> {
        let (_, mac_key) = self.split()?;
        Ok(mac_key.sign(data))
    }

    /// Recomputes the masked HMAC over `data` and compares it with `signature`.
    pub fn verify(self, data: &[u8], signature: &Signature) -> Result<bool, PadError> {
        let (_, mac_key) = self.split()?;
        Ok(mac_key.verify(data, signature))
    }

    /// Encrypts one chunk and signs the resulting ciphertext.
    pub fn seal(self, chunk: &[u8]) -> Result<(Vec<u8>, Signature), PadError> {
        let (keystream, mac_key) = self.split()?;
        let ciphertext = keystream.apply(chunk)?;
        let signature = mac_key.sign(&ciphertext);
        Ok((ciphertext, signature))
    }

    /// Decrypts one block and reports whether its signature verifies.
    /// The plaintext is returned either way; callers decide what to trust.
    pub fn open(
        self,
        ciphertext: &[u8],
        signature: &Signature,
    ) -> Result<(Vec<u8>, bool), PadError> {
        let (keystream, mac_key) = self.split()?;
        let plaintext = keystream.apply(ciphertext)?;
        let valid = mac_key.verify(ciphertext, signature);
        Ok((plaintext, valid))
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("consumed", &self.is_consumed())
            .finish_non_exhaustive()
    }
}

/// The keystream half of a page.
pub struct Keystream {
    index: u16,
    bytes: Zeroizing<Vec<u8>>,
}

impl Keystream {
    /// XORs `data` against the keystream prefix, consuming the keystream.
    pub fn apply(self, data: &[u8]) -> Result<Vec<u8>, PadError> {
        if data.len() > self.bytes.len() {
            return Err(PadError::DataTooLong { len: data.len(), max: self.bytes.len() });
        }
        log::trace!("applying {} keystream bytes of page {}", data.len(), self.index);
        let mut out = vec![0u8; data.len()];
        xor(data, &self.bytes, &mut out);
        Ok(out)
    }
}

/// The salt and mask half of a page.
pub struct MacKey {
    salt: Zeroizing<[u8; SALT_LEN]>,
    mask: Zeroizing<[u8; MASK_LEN]>,
}

impl MacKey {
    /// Builds a key from the 48-byte `salt || mask` suffix.
    fn from_key_material(keymat: &[u8]) -> Result<Self, PadError> {
        if keymat.len() != KEY_MATERIAL_LEN {
            return Err(PadError::MalformedMaterial {
                expected: KEY_MATERIAL_LEN,
                actual: keymat.len(),
            });
        }
        let mut salt = Zeroizing::new([0u8; SALT_LEN]);
        let mut mask = Zeroizing::new([0u8; MASK_LEN]);
        salt.copy_from_slice(&keymat[..SALT_LEN]);
        mask.copy_from_slice(&keymat[SALT_LEN..]);
        Ok(Self { salt, mask })
    }

    pub fn sign(self, data: &[u8]) -> Signature {
        masked_tag(data, &self.salt, &self.mask)
    }

    pub fn verify(self, data: &[u8], signature: &Signature) -> bool {
        verify_tag(data, &self.salt, &self.mask, signature)
    }
}
