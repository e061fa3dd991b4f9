//! Block-cipher registry and keyed cipher handles.
//!
//! The header names its bulk cipher as a string (`aes`, `twofish`, ...),
//! so ciphers are looked up at runtime through a descriptor table and
//! driven through object-safe handles. A handle is opened unkeyed during
//! suite negotiation - block-size checks must pass before any key
//! material is derived - and keyed later, possibly several times while
//! key slots are being tried.

use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use serpent::Serpent;
use twofish::Twofish;

use crate::{Error, Result};

/// One keyed block-cipher instance.
trait Cipher {
    fn encrypt_block(&self, block: &mut [u8]);
    fn decrypt_block(&self, block: &mut [u8]);
}

macro_rules! impl_cipher {
    ($t:ty) => {
        impl Cipher for $t {
            fn encrypt_block(&self, block: &mut [u8]) {
                BlockEncrypt::encrypt_block(self, GenericArray::from_mut_slice(block));
            }

            fn decrypt_block(&self, block: &mut [u8]) {
                BlockDecrypt::decrypt_block(self, GenericArray::from_mut_slice(block));
            }
        }
    };
}

impl_cipher!(Aes128);
impl_cipher!(Aes192);
impl_cipher!(Aes256);
impl_cipher!(Twofish);
impl_cipher!(Serpent);
impl_cipher!(Blowfish);

/// Descriptor for one cipher algorithm.
pub struct CipherSpec {
    /// Name as it appears in the header's cipher field.
    pub name: &'static str,
    /// Block size in bytes.
    pub block_size: usize,
    init: fn(&[u8]) -> Result<Box<dyn Cipher>>,
}

fn init_aes(key: &[u8]) -> Result<Box<dyn Cipher>> {
    Ok(match key.len() {
        16 => Box::new(Aes128::new(GenericArray::from_slice(key))),
        24 => Box::new(Aes192::new(GenericArray::from_slice(key))),
        32 => Box::new(Aes256::new(GenericArray::from_slice(key))),
        _ => return Err(bad_key_len()),
    })
}

fn init_twofish(key: &[u8]) -> Result<Box<dyn Cipher>> {
    Ok(Box::new(
        Twofish::new_from_slice(key).map_err(|_| bad_key_len())?,
    ))
}

fn init_serpent(key: &[u8]) -> Result<Box<dyn Cipher>> {
    Ok(Box::new(
        Serpent::new_from_slice(key).map_err(|_| bad_key_len())?,
    ))
}

fn init_blowfish(key: &[u8]) -> Result<Box<dyn Cipher>> {
    Ok(Box::new(
        Blowfish::new_from_slice(key).map_err(|_| bad_key_len())?,
    ))
}

fn bad_key_len() -> Error {
    Error::HeaderInvalid("key length not supported by cipher")
}

static CIPHERS: &[CipherSpec] = &[
    CipherSpec {
        name: "aes",
        block_size: 16,
        init: init_aes,
    },
    CipherSpec {
        name: "twofish",
        block_size: 16,
        init: init_twofish,
    },
    CipherSpec {
        name: "serpent",
        block_size: 16,
        init: init_serpent,
    },
    CipherSpec {
        name: "blowfish",
        block_size: 8,
        init: init_blowfish,
    },
];

/// Look up a cipher descriptor by header name.
pub fn lookup_cipher(name: &str) -> Option<&'static CipherSpec> {
    CIPHERS.iter().find(|c| c.name == name)
}

/// An open cipher handle: a descriptor plus, once [`set_key`] has run,
/// a keyed instance.
///
/// [`set_key`]: CipherHandle::set_key
pub struct CipherHandle {
    spec: &'static CipherSpec,
    ctx: Option<Box<dyn Cipher>>,
}

impl CipherHandle {
    /// Open an unkeyed handle for `spec`.
    pub fn open(spec: &'static CipherSpec) -> Self {
        Self { spec, ctx: None }
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn block_size(&self) -> usize {
        self.spec.block_size
    }

    /// Install `key`, replacing any previous instance.
    pub fn set_key(&mut self, key: &[u8]) -> Result<()> {
        self.ctx = Some((self.spec.init)(key)?);
        Ok(())
    }

    fn ctx(&self) -> Result<&dyn Cipher> {
        self.ctx
            .as_deref()
            .ok_or(Error::HeaderInvalid("cipher handle has no key"))
    }

    /// Encrypt one block in place. `block` must be exactly one block long.
    pub fn encrypt_block(&self, block: &mut [u8]) -> Result<()> {
        debug_assert_eq!(block.len(), self.spec.block_size);
        self.ctx()?.encrypt_block(block);
        Ok(())
    }

    /// Decrypt one block in place. `block` must be exactly one block long.
    pub fn decrypt_block(&self, block: &mut [u8]) -> Result<()> {
        debug_assert_eq!(block.len(), self.spec.block_size);
        self.ctx()?.decrypt_block(block);
        Ok(())
    }

    /// ECB-encrypt `data` in place; the length must be a multiple of the
    /// block size.
    pub fn ecb_encrypt(&self, data: &mut [u8]) -> Result<()> {
        let ctx = self.check_len(data)?;
        for block in data.chunks_exact_mut(self.spec.block_size) {
            ctx.encrypt_block(block);
        }
        Ok(())
    }

    /// ECB-decrypt `data` in place; the length must be a multiple of the
    /// block size.
    pub fn ecb_decrypt(&self, data: &mut [u8]) -> Result<()> {
        let ctx = self.check_len(data)?;
        for block in data.chunks_exact_mut(self.spec.block_size) {
            ctx.decrypt_block(block);
        }
        Ok(())
    }

    /// CBC-decrypt `data` in place with `iv`, updating `iv` to the last
    /// ciphertext block so chained calls continue the stream.
    pub fn cbc_decrypt(&self, data: &mut [u8], iv: &mut [u8]) -> Result<()> {
        let ctx = self.check_len(data)?;
        let bs = self.spec.block_size;
        let mut prev = [0u8; 16];
        for block in data.chunks_exact_mut(bs) {
            prev[..bs].copy_from_slice(block);
            ctx.decrypt_block(block);
            super::xor(block, iv);
            iv[..bs].copy_from_slice(&prev[..bs]);
        }
        Ok(())
    }

    fn check_len(&self, data: &[u8]) -> Result<&dyn Cipher> {
        if data.len() % self.spec.block_size != 0 {
            return Err(Error::HeaderInvalid(
                "cipher data length not a multiple of the block size",
            ));
        }
        self.ctx()
    }
}
