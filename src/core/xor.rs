#![forbid(unsafe_code)]
// XOR keystream application.
// - Word-at-a-time over 8-byte lanes, then a byte tail.
// - No secret-dependent branching; length checks are enforced by callers.

const LANE: usize = 8;

/// XORs `input` with the leading bytes of `keystream`, writing into `out`.
/// Requires: `out.len() == input.len()` and `keystream.len() >= input.len()`.
#[inline(always)]
pub fn xor(input: &[u8], keystream: &[u8], out: &mut [u8]) {
    let len = out.len();
    let keystream = &keystream[..len];
    let input = &input[..len];

    let words = len / LANE * LANE;
    for ((o, a), b) in out[..words]
        .chunks_exact_mut(LANE)
        .zip(input[..words].chunks_exact(LANE))
        .zip(keystream[..words].chunks_exact(LANE))
    {
        let mut wa = [0u8; LANE];
        let mut wb = [0u8; LANE];
        wa.copy_from_slice(a);
        wb.copy_from_slice(b);
        let x = u64::from_ne_bytes(wa) ^ u64::from_ne_bytes(wb);
        o.copy_from_slice(&x.to_ne_bytes());
    }

    for i in words..len {
        out[i] = input[i] ^ keystream[i];
    }
}

/// XORs two equal-length fixed arrays.
#[inline(always)]
pub fn xor_array<const N: usize>(a: &[u8; N], b: &[u8; N]) -> [u8; N] {
    let mut out = [0u8; N];
    xor(a, b, &mut out);
    out
}
