//! LUKS1 - Linux Unified Key Setup, version 1 on-disk header.
//!
//! ## Layout (packed, all integers big-endian, 592 bytes total)
//! ```text
//! [0x000] Magic "LUKS\xBA\xBE"        (6 bytes)
//! [0x006] Version                     (u16, must be 1)
//! [0x008] CipherName                  (32 bytes, NUL/space terminated)
//! [0x028] CipherMode                  (32 bytes, e.g. "xts-plain64")
//! [0x048] HashSpec                    (32 bytes, e.g. "sha256")
//! [0x068] PayloadOffset               (u32, sectors)
//! [0x06C] KeyBytes                    (u32, master key length)
//! [0x070] MkDigest                    (20 bytes)
//! [0x084] MkDigestSalt                (32 bytes)
//! [0x0A4] MkDigestIterations          (u32)
//! [0x0A8] UUID                        (40 bytes, hyphenated ASCII)
//! [0x0D0] KeySlots                    (8 x 48 bytes)
//! ```
//!
//! ## Key slot (48 bytes)
//! ```text
//! [0x00] Active            (u32, 0x00AC71F3 = enabled)
//! [0x04] Iterations        (u32, PBKDF2 rounds for the passphrase)
//! [0x08] Salt              (32 bytes)
//! [0x28] KeyMaterialOffset (u32, sectors)
//! [0x2C] Stripes           (u32, anti-forensic expansion factor)
//! ```
//!
//! ## Notes
//! * The UUID is canonicalized on parse: hyphens stripped, value ends at
//!   the first NUL. Lookups compare case-insensitively.
//! * A magic or version mismatch yields [`Error::NotLuks`] so scanners can
//!   hand the device to another decoder; any later failure is final.

use std::io::Read;

use crate::utils::{be_u16, be_u32, bytesa, str_field};
use crate::{Error, Result};

/// The six magic bytes opening every LUKS1 header.
pub const LUKS_MAGIC: [u8; 6] = *b"LUKS\xBA\xBE";

/// Only header version understood by this parser.
pub const LUKS_VERSION: u16 = 1;

/// Marker value of an enabled key slot.
pub const KEY_ENABLED: u32 = 0x00AC_71F3;

/// Number of key slots in a LUKS1 header.
pub const KEY_SLOTS: usize = 8;

/// Total header size in bytes.
pub const HEADER_LEN: usize = 592;

/// Upper bound on `key_bytes` accepted during unlock.
pub const MAX_KEY_BYTES: u32 = 1024;

/// One passphrase-protected key slot.
#[derive(Debug, Clone, Copy)]
pub struct KeySlot {
    /// Slot state; only [`KEY_ENABLED`] slots are tried.
    pub active: u32,
    /// PBKDF2 iteration count for the passphrase.
    pub iterations: u32,
    /// PBKDF2 salt for the passphrase.
    pub salt: [u8; 32],
    /// Start of the anti-forensic key material, in sectors.
    pub material_offset: u32,
    /// Number of anti-forensic stripes the master key was split into.
    pub stripes: u32,
}

impl KeySlot {
    /// Whether this slot holds key material worth trying.
    pub fn is_active(&self) -> bool {
        self.active == KEY_ENABLED
    }
}

/// Parsed LUKS1 header (metadata only; key material stays on disk).
#[derive(Debug, Clone)]
pub struct Phdr {
    /// Bulk cipher name, e.g. `aes`.
    pub cipher_name: String,
    /// Chaining mode and IV scheme, e.g. `xts-plain64`, `cbc-essiv:sha256`.
    pub cipher_mode: String,
    /// Hash used for PBKDF2 and the anti-forensic merge, e.g. `sha256`.
    pub hash_spec: String,
    /// First payload sector on the backing device.
    pub payload_offset: u32,
    /// Master key length in bytes.
    pub key_bytes: u32,
    /// PBKDF2 digest of the master key, for passphrase verification.
    pub mk_digest: [u8; 20],
    /// Salt for the master-key digest.
    pub mk_digest_salt: [u8; 32],
    /// Iteration count for the master-key digest.
    pub mk_digest_iterations: u32,
    /// Canonical UUID: hyphens stripped, case preserved.
    pub uuid: String,
    /// The eight key slots, active or not.
    pub key_slots: [KeySlot; KEY_SLOTS],
}

impl Phdr {
    /// Parse a LUKS1 header from `r`.
    ///
    /// The reader must be positioned at the start of the device. Returns
    /// [`Error::NotLuks`] on a magic or version mismatch without reading
    /// the remainder of the header.
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let magic = bytesa::<6>(r)?;
        if magic != LUKS_MAGIC {
            return Err(Error::NotLuks);
        }
        if be_u16(r)? != LUKS_VERSION {
            return Err(Error::NotLuks);
        }

        let cipher_name = str_field::<_, 32>(r)?;
        let cipher_mode = str_field::<_, 32>(r)?;
        let hash_spec = str_field::<_, 32>(r)?;
        let payload_offset = be_u32(r)?;
        let key_bytes = be_u32(r)?;
        let mk_digest = bytesa::<20>(r)?;
        let mk_digest_salt = bytesa::<32>(r)?;
        let mk_digest_iterations = be_u32(r)?;
        let uuid = canonical_uuid(&bytesa::<40>(r)?);

        let mut key_slots = [KeySlot {
            active: 0,
            iterations: 0,
            salt: [0; 32],
            material_offset: 0,
            stripes: 0,
        }; KEY_SLOTS];
        for slot in &mut key_slots {
            *slot = KeySlot {
                active: be_u32(r)?,
                iterations: be_u32(r)?,
                salt: bytesa::<32>(r)?,
                material_offset: be_u32(r)?,
                stripes: be_u32(r)?,
            };
        }

        Ok(Self {
            cipher_name,
            cipher_mode,
            hash_spec,
            payload_offset,
            key_bytes,
            mk_digest,
            mk_digest_salt,
            mk_digest_iterations,
            uuid,
            key_slots,
        })
    }

    /// Iterate over the active key slots in header order.
    pub fn active_slots(&self) -> impl Iterator<Item = (usize, &KeySlot)> {
        self.key_slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_active())
    }
}

/// Canonicalize a raw on-disk UUID field: drop hyphens, stop at the first
/// NUL, keep case (comparisons are case-insensitive at lookup time).
pub fn canonical_uuid(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|&&b| b != 0)
        .filter(|&&b| b != b'-')
        .map(|&b| b as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Vec<u8> {
        let mut h = vec![0u8; HEADER_LEN];
        h[..6].copy_from_slice(&LUKS_MAGIC);
        h[6..8].copy_from_slice(&1u16.to_be_bytes());
        h[8..11].copy_from_slice(b"aes");
        h[40..51].copy_from_slice(b"xts-plain64");
        h[72..78].copy_from_slice(b"sha256");
        h[104..108].copy_from_slice(&4096u32.to_be_bytes());
        h[108..112].copy_from_slice(&64u32.to_be_bytes());
        for (i, b) in h[132..164].iter_mut().enumerate() {
            *b = i as u8;
        }
        h[164..168].copy_from_slice(&1000u32.to_be_bytes());
        h[168..204].copy_from_slice(b"21f427f2-5d8a-4b4c-a659-c0d05c332066");
        // slot 0 active, slot 1 untouched
        h[208..212].copy_from_slice(&KEY_ENABLED.to_be_bytes());
        h[212..216].copy_from_slice(&2000u32.to_be_bytes());
        h[248..252].copy_from_slice(&8u32.to_be_bytes());
        h[252..256].copy_from_slice(&4000u32.to_be_bytes());
        h
    }

    #[test]
    fn parses_sample() {
        let raw = sample_header();
        let hdr = Phdr::parse(&mut raw.as_slice()).unwrap();
        assert_eq!(hdr.cipher_name, "aes");
        assert_eq!(hdr.cipher_mode, "xts-plain64");
        assert_eq!(hdr.hash_spec, "sha256");
        assert_eq!(hdr.payload_offset, 4096);
        assert_eq!(hdr.key_bytes, 64);
        assert_eq!(hdr.mk_digest_iterations, 1000);
        assert_eq!(hdr.uuid, "21f427f25d8a4b4ca659c0d05c332066");
        assert_eq!(hdr.active_slots().count(), 1);
        let (idx, slot) = hdr.active_slots().next().unwrap();
        assert_eq!(idx, 0);
        assert_eq!(slot.iterations, 2000);
        assert_eq!(slot.material_offset, 8);
        assert_eq!(slot.stripes, 4000);
    }

    #[test]
    fn magic_gate() {
        let mut raw = sample_header();
        raw[0] ^= 0xFF;
        assert!(matches!(
            Phdr::parse(&mut raw.as_slice()),
            Err(Error::NotLuks)
        ));
    }

    #[test]
    fn version_gate() {
        let mut raw = sample_header();
        raw[7] = 2;
        assert!(matches!(
            Phdr::parse(&mut raw.as_slice()),
            Err(Error::NotLuks)
        ));
    }

    #[test]
    fn truncated_header() {
        let raw = sample_header();
        assert!(matches!(
            Phdr::parse(&mut &raw[..100]),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn uuid_canonical_form() {
        let mut raw = [0u8; 40];
        raw[..36].copy_from_slice(b"ABCDEF00-1111-2222-3333-444455556666");
        assert_eq!(canonical_uuid(&raw), "ABCDEF00111122223333444455556666");
    }
}
