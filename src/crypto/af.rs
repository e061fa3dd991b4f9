//! Anti-forensic information splitter.
//!
//! LUKS1 stores each slot's copy of the master key expanded into `stripes`
//! blocks of `block_size` bytes, arranged so that destroying any single
//! stripe destroys the key. [`merge`] inverts that expansion:
//!
//! ```text
//! d = 0
//! d = diffuse(d XOR stripe[k])     for k = 0 .. stripes-2
//! key = d XOR stripe[stripes-1]
//! ```
//!
//! `diffuse` rewrites a buffer in digest-sized chunks, replacing chunk `i`
//! with `H(be32(i) || chunk_i)`; the trailing partial chunk takes a
//! truncated digest. Every step is length-preserving.
//!
//! [`split`] is the forward direction. The reader never needs it, but
//! image-building tooling and the round-trip tests do.

use zeroize::Zeroizing;

use super::hashes::HashSpec;
use super::xor;
use crate::{Error, Result};

/// Rewrite `buf` in place with the per-chunk diffusion hash.
fn diffuse(hash: &HashSpec, buf: &mut [u8]) {
    let d = hash.digest_len;
    let full = buf.len() / d;
    let mut dg = Zeroizing::new(vec![0u8; d]);
    for i in 0..full {
        hash.digest_into(&[&(i as u32).to_be_bytes(), &buf[i * d..(i + 1) * d]], &mut dg);
        buf[i * d..(i + 1) * d].copy_from_slice(&dg);
    }
    let pad = buf.len() % d;
    if pad != 0 {
        hash.digest_into(&[&(full as u32).to_be_bytes(), &buf[full * d..]], &mut dg[..pad]);
        buf[full * d..].copy_from_slice(&dg[..pad]);
    }
}

/// Merge `blocks` stripes of `block_size` bytes from `src` back into the
/// `block_size`-byte key in `dst`.
pub fn merge(
    hash: &HashSpec,
    src: &[u8],
    dst: &mut [u8],
    block_size: usize,
    blocks: usize,
) -> Result<()> {
    if blocks == 0 || dst.len() != block_size || src.len() != block_size * blocks {
        return Err(Error::HeaderInvalid("bad anti-forensic geometry"));
    }
    let mut buf = Zeroizing::new(vec![0u8; block_size]);
    for k in 0..blocks - 1 {
        xor(&mut buf, &src[k * block_size..(k + 1) * block_size]);
        diffuse(hash, &mut buf);
    }
    dst.copy_from_slice(&src[(blocks - 1) * block_size..]);
    xor(dst, &buf);
    Ok(())
}

/// Split the `block_size`-byte key in `src` into `blocks` stripes written
/// to `dst`, using `fill` to supply the random bytes of the first
/// `blocks - 1` stripes.
pub fn split(
    hash: &HashSpec,
    src: &[u8],
    dst: &mut [u8],
    block_size: usize,
    blocks: usize,
    mut fill: impl FnMut(&mut [u8]),
) -> Result<()> {
    if blocks == 0 || src.len() != block_size || dst.len() != block_size * blocks {
        return Err(Error::HeaderInvalid("bad anti-forensic geometry"));
    }
    let mut buf = Zeroizing::new(vec![0u8; block_size]);
    for k in 0..blocks - 1 {
        let stripe = &mut dst[k * block_size..(k + 1) * block_size];
        fill(stripe);
        xor(&mut buf, stripe);
        diffuse(hash, &mut buf);
    }
    let last = &mut dst[(blocks - 1) * block_size..];
    last.copy_from_slice(src);
    xor(last, &buf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hashes::lookup_hash;

    fn xorshift(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    fn fill_from(state: &mut u64) -> impl FnMut(&mut [u8]) + '_ {
        |buf: &mut [u8]| {
            for b in buf.iter_mut() {
                *b = xorshift(state) as u8;
            }
        }
    }

    #[test]
    fn split_then_merge_round_trips() {
        let mut state = 0x1234_5678_9abc_def0u64;
        for hash_name in ["sha1", "sha256"] {
            let hash = lookup_hash(hash_name).unwrap();
            for keysize in [16usize, 32, 64] {
                let stripes = 4000;
                let mut key = vec![0u8; keysize];
                fill_from(&mut state)(&mut key);

                let mut material = vec![0u8; keysize * stripes];
                split(hash, &key, &mut material, keysize, stripes, fill_from(&mut state)).unwrap();

                let mut out = vec![0u8; keysize];
                merge(hash, &material, &mut out, keysize, stripes).unwrap();
                assert_eq!(out, key, "{hash_name}/{keysize}");
            }
        }
    }

    #[test]
    fn single_stripe_is_a_copy() {
        let hash = lookup_hash("sha1").unwrap();
        let key = [0xABu8; 16];
        let mut out = [0u8; 16];
        merge(hash, &key, &mut out, 16, 1).unwrap();
        assert_eq!(out, key);
    }

    #[test]
    fn corrupt_stripe_destroys_the_key() {
        let mut state = 7u64;
        let hash = lookup_hash("sha256").unwrap();
        let key = [0x5Au8; 32];
        let mut material = vec![0u8; 32 * 40];
        split(hash, &key, &mut material, 32, 40, fill_from(&mut state)).unwrap();
        material[5] ^= 1;
        let mut out = [0u8; 32];
        merge(hash, &material, &mut out, 32, 40).unwrap();
        assert_ne!(out, key);
    }

    #[test]
    fn zero_stripes_rejected() {
        let hash = lookup_hash("sha1").unwrap();
        let mut out = [0u8; 16];
        assert!(merge(hash, &[], &mut out, 16, 0).is_err());
    }
}
