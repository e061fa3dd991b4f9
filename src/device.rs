//! Capabilities the unlocking core consumes from its host.
//!
//! The core never touches files or hardware directly: it reads ciphertext
//! through [`BlockDevice`], enumerates candidate devices through
//! [`DeviceProvider`], and obtains passphrases through
//! [`PassphraseSource`]. Tests and embedders plug in their own
//! implementations; [`MemDevice`] / [`MemProvider`] ship for in-memory use.

use std::io;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::{Error, Result};

/// Fixed sector size of every backing and virtual device.
pub const SECTOR_SIZE: usize = 512;

/// log2 of [`SECTOR_SIZE`], for sector/byte conversions.
pub const SECTOR_BITS: u32 = 9;

/// A sector-addressed, read-only source of ciphertext.
///
/// `class_id`/`id` together identify the underlying device across repeated
/// opens; the registry uses the pair to make unlocks idempotent.
pub trait BlockDevice {
    /// Identity of this device within its class. Stable across opens.
    fn id(&self) -> u64;

    /// Identity of the device class (disk driver, image file, ...).
    fn class_id(&self) -> u64;

    /// Total size in sectors.
    fn sectors(&self) -> Result<u64>;

    /// Fill `buf` starting at `byte_offset` bytes into sector `sector`.
    ///
    /// Must read exactly `buf.len()` bytes or fail; short reads are
    /// reported as errors, never as partial success.
    fn read(&mut self, sector: u64, byte_offset: u64, buf: &mut [u8]) -> Result<()>;
}

/// Enumeration and opening of backing devices, supplied by the host.
pub trait DeviceProvider {
    /// Names of all devices worth scanning, in scan order.
    fn device_names(&self) -> Vec<String>;

    /// Open a device by name.
    fn open(&mut self, name: &str) -> Result<Box<dyn BlockDevice>>;
}

/// Interactive (or scripted) passphrase entry.
pub trait PassphraseSource {
    /// Return the passphrase for the volume on `source` (LUKS UUID
    /// `uuid`), or `None` if entry was cancelled. The returned buffer is
    /// zeroed on drop.
    fn passphrase(&mut self, source: &str, uuid: &str) -> Option<Zeroizing<Vec<u8>>>;
}

/// A fixed passphrase, for non-interactive use and tests.
pub struct StaticPassphrase(pub Vec<u8>);

impl PassphraseSource for StaticPassphrase {
    fn passphrase(&mut self, _source: &str, _uuid: &str) -> Option<Zeroizing<Vec<u8>>> {
        Some(Zeroizing::new(self.0.clone()))
    }
}

/// Read-only in-memory block device over a shared byte image.
pub struct MemDevice {
    id: u64,
    class_id: u64,
    data: Arc<[u8]>,
}

impl MemDevice {
    pub fn new(id: u64, class_id: u64, data: Arc<[u8]>) -> Self {
        Self { id, class_id, data }
    }
}

impl BlockDevice for MemDevice {
    fn id(&self) -> u64 {
        self.id
    }

    fn class_id(&self) -> u64 {
        self.class_id
    }

    fn sectors(&self) -> Result<u64> {
        Ok(self.data.len() as u64 >> SECTOR_BITS)
    }

    fn read(&mut self, sector: u64, byte_offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = (sector << SECTOR_BITS)
            .checked_add(byte_offset)
            .and_then(|s| usize::try_from(s).ok())
            .ok_or_else(out_of_range)?;
        let end = start.checked_add(buf.len()).ok_or_else(out_of_range)?;
        let src = self.data.get(start..end).ok_or_else(out_of_range)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

fn out_of_range() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "read past end of device",
    ))
}

/// Device class id used by [`MemProvider`] devices.
const MEM_CLASS_ID: u64 = 0x6d65_6d64;

/// A provider over named in-memory images.
#[derive(Default)]
pub struct MemProvider {
    devices: Vec<(String, Arc<[u8]>)>,
}

impl MemProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under `name`. Later opens share the bytes.
    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.devices.push((name.to_owned(), data.into()));
    }
}

impl DeviceProvider for MemProvider {
    fn device_names(&self) -> Vec<String> {
        self.devices.iter().map(|(n, _)| n.clone()).collect()
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn BlockDevice>> {
        let idx = self
            .devices
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| Error::UnknownDevice(name.to_owned()))?;
        let data = self.devices[idx].1.clone();
        Ok(Box::new(MemDevice::new(idx as u64, MEM_CLASS_ID, data)))
    }
}
