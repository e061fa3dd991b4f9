//! One unlocked LUKS1 volume.
//!
//! A [`Volume`] is created by [`configure`](Volume::configure) from a
//! parsed header (cipher handles open, no key yet), brought to life by
//! [`recover_key`](Volume::recover_key), and then owned by the
//! [`registry`](crate::registry). After key recovery nothing about it
//! changes except the open reference count.

use log::{debug, info};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::crypto::af;
use crate::crypto::sector::SectorCipher;
use crate::device::{BlockDevice, SECTOR_BITS, SECTOR_SIZE};
use crate::formats::luks1::{Phdr, MAX_KEY_BYTES};
use crate::{Error, Result};

/// Longest passphrase accepted, in bytes.
pub const MAX_PASSPHRASE: usize = 256;

/// An unlocked volume: a negotiated cipher suite bound to a backing
/// device region.
pub struct Volume {
    pub(crate) source: String,
    pub(crate) source_id: u64,
    pub(crate) source_class_id: u64,
    /// First payload sector on the backing device.
    pub(crate) offset: u64,
    /// Registry ordinal; assigned on insertion.
    pub(crate) ordinal: u64,
    /// Canonical UUID (no hyphens).
    pub(crate) uuid: String,
    pub(crate) crypt: SectorCipher,
    /// Held open while `refs > 0`.
    pub(crate) device: Option<Box<dyn BlockDevice>>,
    pub(crate) refs: u32,
}

impl Volume {
    /// Negotiate the header's cipher suite into an unkeyed volume.
    ///
    /// Fails without prompting when the suite is unsupported or the
    /// header is structurally unsound; nothing is allocated on failure
    /// beyond what RAII reclaims.
    pub(crate) fn configure(header: &Phdr) -> Result<Self> {
        if header.key_bytes > MAX_KEY_BYTES {
            return Err(Error::HeaderInvalid("key size out of range"));
        }
        let crypt =
            SectorCipher::negotiate(&header.cipher_name, &header.cipher_mode, &header.hash_spec)?;
        Ok(Self {
            source: String::new(),
            source_id: 0,
            source_class_id: 0,
            offset: header.payload_offset as u64,
            ordinal: 0,
            uuid: header.uuid.clone(),
            crypt,
            device: None,
            refs: 0,
        })
    }

    /// Try the passphrase against every active key slot and install the
    /// master key on the first match.
    ///
    /// The passphrase is used up to its first NUL byte (matching the
    /// C-string handling that existing images were created under) and
    /// capped at [`MAX_PASSPHRASE`] bytes. All intermediate key material
    /// is zeroed before return, on success and failure alike.
    pub(crate) fn recover_key(
        &mut self,
        header: &Phdr,
        source: &mut dyn BlockDevice,
        passphrase: &[u8],
    ) -> Result<()> {
        let nul = passphrase
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(passphrase.len());
        let passphrase = &passphrase[..nul.min(MAX_PASSPHRASE)];

        let keysize = header.key_bytes as usize;
        let hash = self.crypt.hash();
        let mut derived = Zeroizing::new(vec![0u8; keysize]);
        let mut candidate = Zeroizing::new(vec![0u8; keysize]);
        let mut candidate_digest = Zeroizing::new([0u8; 20]);

        for (slot_idx, slot) in header.active_slots() {
            if slot.stripes == 0 {
                return Err(Error::HeaderInvalid("key slot has zero stripes"));
            }
            debug!("trying key slot {slot_idx}");

            hash.pbkdf2(passphrase, &slot.salt, slot.iterations, &mut derived)?;
            self.crypt.set_key(&derived)?;

            // Pull the slot's anti-forensic material and peel it with the
            // candidate key: material is stored as ordinary encrypted
            // sectors counted from 0.
            let length = keysize * slot.stripes as usize;
            let mut split_key = Zeroizing::new(Vec::new());
            split_key
                .try_reserve_exact(length)
                .map_err(|_| Error::OutOfMemory)?;
            split_key.resize(length, 0);
            source.read(slot.material_offset as u64, 0, &mut split_key)?;
            self.crypt.decrypt(&mut split_key, 0)?;
            af::merge(hash, &split_key, &mut candidate, keysize, slot.stripes as usize)?;

            hash.pbkdf2(
                &candidate,
                &header.mk_digest_salt,
                header.mk_digest_iterations,
                &mut candidate_digest[..],
            )?;
            if !bool::from(candidate_digest[..].ct_eq(&header.mk_digest[..])) {
                debug!("key slot {slot_idx}: digest mismatch");
                continue;
            }

            info!("key slot {slot_idx} opened");
            self.crypt.set_key(&candidate)?;
            return Ok(());
        }

        Err(Error::PermissionDenied)
    }

    /// Registry ordinal (valid once inserted).
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Canonical UUID, hyphens stripped.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Name of the backing device this volume was unlocked from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Bulk cipher name of the negotiated suite.
    pub fn cipher_name(&self) -> &'static str {
        self.crypt.cipher_name()
    }

    /// Hash name of the negotiated suite.
    pub fn hash_name(&self) -> &'static str {
        self.crypt.hash().name
    }

    /// Whether any handle currently holds the backing device open.
    pub fn is_open(&self) -> bool {
        self.refs > 0
    }

    /// Plaintext size in sectors (backing size minus the payload offset).
    pub(crate) fn sectors(&self) -> Result<u64> {
        let dev = self
            .device
            .as_ref()
            .ok_or_else(|| Error::UnknownDevice(self.source.clone()))?;
        Ok(dev.sectors()?.saturating_sub(self.offset))
    }

    /// Read and decrypt whole sectors starting at virtual sector
    /// `sector`. `buf` must be a multiple of the sector size.
    pub(crate) fn read(&mut self, sector: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() % SECTOR_SIZE != 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "read length not sector-aligned",
            )));
        }
        let dev = self
            .device
            .as_mut()
            .ok_or_else(|| Error::UnknownDevice(self.source.clone()))?;
        debug!(
            "reading {} sectors at {sector} (+{} payload offset)",
            buf.len() >> SECTOR_BITS,
            self.offset
        );
        dev.read(sector + self.offset, 0, buf)?;
        self.crypt.decrypt(buf, sector)
    }
}
