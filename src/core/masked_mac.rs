#![forbid(unsafe_code)]
// Masked HMAC-SHA256.
// - tag = HMAC-SHA256(key = salt, msg = data) XOR mask
// - salt and mask are both one-time page material, so the transmitted tag is
//   only checkable by a holder of the same page.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::{MASK_LEN, SALT_LEN, SIGNATURE_LEN};
use crate::core::xor::xor_array;

type HmacSha256 = Hmac<Sha256>;

/// Compute the masked tag for `data`.
#[inline(always)]
pub fn masked_tag(
    data: &[u8],
    salt: &[u8; SALT_LEN],
    mask: &[u8; MASK_LEN],
) -> [u8; SIGNATURE_LEN] {
    // HMAC accepts keys of any length; 16 bytes never fails.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(salt)
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(data);
    let raw: [u8; SIGNATURE_LEN] = mac.finalize().into_bytes().into();
    xor_array(&raw, mask)
}

/// Constant-time equality check for two tags.
#[inline(always)]
pub fn ct_eq(a: &[u8; SIGNATURE_LEN], b: &[u8; SIGNATURE_LEN]) -> bool {
    let mut diff: u8 = 0;
    for i in 0..SIGNATURE_LEN {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

/// Verify a masked tag in constant time.
#[inline(always)]
pub fn verify(
    data: &[u8],
    salt: &[u8; SALT_LEN],
    mask: &[u8; MASK_LEN],
    tag: &[u8; SIGNATURE_LEN],
) -> bool {
    let computed = masked_tag(data, salt, mask);
    ct_eq(&computed, tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys() -> ([u8; SALT_LEN], [u8; MASK_LEN]) {
        let mut salt = [0u8; SALT_LEN];
        let mut mask = [0u8; MASK_LEN];
        for (i, b) in salt.iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in mask.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7);
        }
        (salt, mask)
    }

    #[test]
    fn test_masked_tag_consistency() {
        let (salt, mask) = keys();
        let t1 = masked_tag(b"attack at dawn", &salt, &mask);
        let t2 = masked_tag(b"attack at dawn", &salt, &mask);
        assert_eq!(t1, t2);
        assert!(verify(b"attack at dawn", &salt, &mask, &t1));
        let mut wrong = t1;
        wrong[0] ^= 1;
        assert!(!verify(b"attack at dawn", &salt, &mask, &wrong));
    }

    #[test]
    fn test_mask_hides_raw_hmac() {
        let (salt, mask) = keys();
        let mut raw_mac = <HmacSha256 as Mac>::new_from_slice(&salt).unwrap();
        raw_mac.update(b"data");
        let raw: [u8; SIGNATURE_LEN] = raw_mac.finalize().into_bytes().into();
        let tag = masked_tag(b"data", &salt, &mask);
        assert_ne!(tag, raw);
        assert_eq!(xor_array(&tag, &mask), raw);
    }

    #[test]
    fn test_zero_mask_is_plain_hmac() {
        let salt = [0x0bu8; SALT_LEN];
        let tag = masked_tag(b"Hi There", &salt, &[0u8; MASK_LEN]);
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&salt).unwrap();
        mac.update(b"Hi There");
        assert!(mac.verify_slice(&tag).is_ok());
    }

    proptest! {
        #[test]
        fn prop_bit_flip_in_data_fails(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            bit in 0usize..4096,
        ) {
            let (salt, mask) = keys();
            let tag = masked_tag(&data, &salt, &mask);
            prop_assert!(verify(&data, &salt, &mask, &tag));
            let mut flipped = data.clone();
            let bit = bit % (flipped.len() * 8);
            flipped[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!verify(&flipped, &salt, &mask, &tag));
        }

        #[test]
        fn prop_bit_flip_in_tag_fails(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            bit in 0usize..256,
        ) {
            let (salt, mask) = keys();
            let mut tag = masked_tag(&data, &salt, &mask);
            tag[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!verify(&data, &salt, &mask, &tag));
        }
    }
}
