//! Hash registry: streaming digests and PBKDF2, dispatched by header name.
//!
//! LUKS1 uses one hash for three jobs - PBKDF2 of the passphrase, the
//! anti-forensic diffusion, and the master-key digest - and optionally a
//! second one to derive the ESSIV key. All are named by strings in the
//! header, so the descriptors here pair a [`digest::DynDigest`] factory
//! with a monomorphized PBKDF2 entry point per algorithm.

use digest::{Digest, DynDigest};
use hmac::Hmac;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::Result;

/// Descriptor for one hash algorithm.
pub struct HashSpec {
    /// Name as it appears in the header's hash field.
    pub name: &'static str,
    /// Digest length in bytes.
    pub digest_len: usize,
    new_ctx: fn() -> Box<dyn DynDigest>,
    pbkdf2: fn(&[u8], &[u8], u32, &mut [u8]),
}

macro_rules! hash_spec {
    ($name:literal, $t:ty, $len:expr) => {
        HashSpec {
            name: $name,
            digest_len: $len,
            new_ctx: {
                fn new_ctx() -> Box<dyn DynDigest> {
                    Box::new(<$t as Digest>::new())
                }
                new_ctx
            },
            pbkdf2: {
                fn derive(password: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) {
                    // The PRF is HMAC over a fixed hash; the only failure
                    // mode of the generic routine is an over-long output,
                    // which no caller requests.
                    let _ = pbkdf2::pbkdf2::<Hmac<$t>>(password, salt, rounds, out);
                }
                derive
            },
        }
    };
}

static HASHES: &[HashSpec] = &[
    hash_spec!("sha1", Sha1, 20),
    hash_spec!("sha256", Sha256, 32),
    hash_spec!("sha512", Sha512, 64),
    hash_spec!("ripemd160", Ripemd160, 20),
];

/// Look up a hash descriptor by header name.
pub fn lookup_hash(name: &str) -> Option<&'static HashSpec> {
    HASHES.iter().find(|h| h.name == name)
}

impl HashSpec {
    /// Fresh streaming context.
    pub fn hasher(&self) -> Box<dyn DynDigest> {
        (self.new_ctx)()
    }

    /// One-shot digest of the concatenation of `parts` into `out`.
    ///
    /// `out` may be shorter than the digest (it receives a prefix) but not
    /// longer.
    pub fn digest_into(&self, parts: &[&[u8]], out: &mut [u8]) {
        let mut ctx = self.hasher();
        for p in parts {
            ctx.update(p);
        }
        let dg = ctx.finalize_reset();
        out.copy_from_slice(&dg[..out.len()]);
    }

    /// PBKDF2 with HMAC over this hash, writing `out.len()` bytes.
    pub fn pbkdf2(&self, password: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) -> Result<()> {
        (self.pbkdf2)(password, salt, rounds, out);
        Ok(())
    }
}
