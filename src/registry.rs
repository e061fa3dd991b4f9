//! Process-wide registry of unlocked volumes.
//!
//! The registry is an explicit owned collection - embedders create one
//! and pass it to their command handlers; nothing here is global. Each
//! successful unlock appends a [`Volume`] and assigns it an ordinal from
//! a monotonically increasing counter that is never reused, so virtual
//! device names stay stable for the life of the process:
//!
//! * `luks<n>` - by ordinal, e.g. `luks0`
//! * `luksuuid/<uuid>` - by canonical UUID, case-insensitive, hyphens
//!   ignored
//!
//! Unlocking the same backing device twice is idempotent: the second
//! request finds the existing volume by device identity and returns its
//! ordinal without touching the header again.

use log::{debug, warn};

use crate::device::{BlockDevice, DeviceProvider, PassphraseSource};
use crate::formats::luks1::{self, Phdr};
use crate::volume::Volume;
use crate::{Error, Result};

/// Ordered collection of unlocked volumes plus the ordinal counter.
#[derive(Default)]
pub struct Registry {
    volumes: Vec<Volume>,
    next_ordinal: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unlocked volumes.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Iterate over the unlocked volumes, oldest first.
    pub fn volumes(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.iter()
    }

    /// Virtual device names, one `luks<n>` per volume.
    pub fn iterate(&self) -> Vec<String> {
        self.volumes
            .iter()
            .map(|v| format!("luks{}", v.ordinal))
            .collect()
    }

    /// Unlock the named backing device.
    ///
    /// Prompts through `pass` only after the header parses and the suite
    /// negotiates. Returns the volume's ordinal; if the device is already
    /// unlocked the existing ordinal is returned and nothing is prompted.
    pub fn unlock(
        &mut self,
        provider: &mut dyn DeviceProvider,
        pass: &mut dyn PassphraseSource,
        name: &str,
    ) -> Result<u64> {
        let device = provider.open(name)?;
        if let Some(v) = self.find_by_device(&*device) {
            debug!("{name} already unlocked as luks{}", v.ordinal);
            return Ok(v.ordinal);
        }
        self.unlock_opened(name, device, pass)
    }

    /// Unlock the first backing device whose LUKS UUID matches `uuid`
    /// (case-insensitive, hyphens ignored).
    ///
    /// An already-unlocked match returns immediately. Devices that are
    /// not LUKS or fail to read are skipped; once the UUID matches, the
    /// unlock's outcome - success or the first error - is final.
    pub fn unlock_by_uuid(
        &mut self,
        provider: &mut dyn DeviceProvider,
        pass: &mut dyn PassphraseSource,
        uuid: &str,
    ) -> Result<u64> {
        let wanted = luks1::canonical_uuid(uuid.as_bytes());
        if let Some(v) = self
            .volumes
            .iter()
            .find(|v| v.uuid.eq_ignore_ascii_case(&wanted))
        {
            debug!("uuid {wanted} already unlocked as luks{}", v.ordinal);
            return Ok(v.ordinal);
        }

        for name in provider.device_names() {
            let mut device = match provider.open(&name) {
                Ok(d) => d,
                Err(e) => {
                    warn!("{name}: {e}");
                    continue;
                }
            };
            let header = match read_header(&mut *device) {
                Ok(h) => h,
                Err(Error::NotLuks) => continue,
                Err(e) => {
                    warn!("{name}: {e}");
                    continue;
                }
            };
            if !header.uuid.eq_ignore_ascii_case(&wanted) {
                debug!("{name}: uuid {} does not match", header.uuid);
                continue;
            }
            if let Some(v) = self.find_by_device(&*device) {
                return Ok(v.ordinal);
            }
            return self.unlock_parsed(&name, device, &header, pass);
        }
        Err(Error::UnknownDevice(format!("uuid {uuid}")))
    }

    /// Scan every known device and unlock all LUKS volumes the
    /// passphrase source can open.
    ///
    /// Non-LUKS devices are skipped silently; other per-device failures
    /// are logged and skipped. Returns how many volumes were unlocked
    /// (idempotent repeats included).
    pub fn unlock_all(
        &mut self,
        provider: &mut dyn DeviceProvider,
        pass: &mut dyn PassphraseSource,
    ) -> Result<usize> {
        let mut count = 0;
        for name in provider.device_names() {
            match self.unlock(provider, pass, &name) {
                Ok(_) => count += 1,
                Err(Error::NotLuks) => {}
                Err(e) => warn!("{name}: {e}"),
            }
        }
        Ok(count)
    }

    fn unlock_opened(
        &mut self,
        name: &str,
        mut device: Box<dyn BlockDevice>,
        pass: &mut dyn PassphraseSource,
    ) -> Result<u64> {
        let header = read_header(&mut *device)?;
        self.unlock_parsed(name, device, &header, pass)
    }

    fn unlock_parsed(
        &mut self,
        name: &str,
        mut device: Box<dyn BlockDevice>,
        header: &Phdr,
        pass: &mut dyn PassphraseSource,
    ) -> Result<u64> {
        let mut vol = Volume::configure(header)?;
        let phrase = pass
            .passphrase(name, &vol.uuid)
            .ok_or(Error::PermissionDenied)?;
        vol.recover_key(header, &mut *device, &phrase)?;

        vol.source = name.to_owned();
        vol.source_id = device.id();
        vol.source_class_id = device.class_id();
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        vol.ordinal = ordinal;
        self.volumes.push(vol);
        Ok(ordinal)
    }

    /// Open a virtual device by `luks<n>` or `luksuuid/<uuid>` name,
    /// bumping its reference count. The backing device is (re)opened on
    /// the first concurrent open.
    pub fn open(&mut self, provider: &mut dyn DeviceProvider, name: &str) -> Result<u64> {
        let idx = self
            .lookup(name)
            .ok_or_else(|| Error::UnknownDevice(name.to_owned()))?;
        let vol = &mut self.volumes[idx];
        if vol.device.is_none() {
            debug!("opening backing device {}", vol.source);
            vol.device = Some(provider.open(&vol.source)?);
        }
        vol.refs += 1;
        Ok(vol.ordinal)
    }

    /// Drop one reference to an open volume, closing the backing device
    /// with the last one.
    pub fn close(&mut self, ordinal: u64) -> Result<()> {
        let vol = self
            .by_ordinal_mut(ordinal)
            .ok_or_else(|| Error::UnknownDevice(format!("luks{ordinal}")))?;
        if vol.refs == 0 {
            return Err(Error::UnknownDevice(format!("luks{ordinal} is not open")));
        }
        vol.refs -= 1;
        if vol.refs == 0 {
            debug!("closing backing device {}", vol.source);
            vol.device = None;
        }
        Ok(())
    }

    /// Plaintext size of an open volume, in sectors.
    pub fn sectors(&self, ordinal: u64) -> Result<u64> {
        self.volumes
            .iter()
            .find(|v| v.ordinal == ordinal)
            .ok_or_else(|| Error::UnknownDevice(format!("luks{ordinal}")))?
            .sectors()
    }

    /// Read whole plaintext sectors from an open volume.
    pub fn read(&mut self, ordinal: u64, sector: u64, buf: &mut [u8]) -> Result<()> {
        let vol = self
            .by_ordinal_mut(ordinal)
            .ok_or_else(|| Error::UnknownDevice(format!("luks{ordinal}")))?;
        vol.read(sector, buf)
    }

    /// Writes are refused: the driver is strictly read-only.
    pub fn write(&mut self, _ordinal: u64, _sector: u64, _buf: &[u8]) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Resolve a virtual device name to an index into `volumes`.
    fn lookup(&self, name: &str) -> Option<usize> {
        if let Some(uuid) = name.strip_prefix("luksuuid/") {
            let wanted = luks1::canonical_uuid(uuid.as_bytes());
            return self
                .volumes
                .iter()
                .position(|v| v.uuid.eq_ignore_ascii_case(&wanted));
        }
        let ordinal: u64 = name.strip_prefix("luks")?.parse().ok()?;
        self.volumes.iter().position(|v| v.ordinal == ordinal)
    }

    fn by_ordinal_mut(&mut self, ordinal: u64) -> Option<&mut Volume> {
        self.volumes.iter_mut().find(|v| v.ordinal == ordinal)
    }

    fn find_by_device(&self, device: &dyn BlockDevice) -> Option<&Volume> {
        self.volumes
            .iter()
            .find(|v| v.source_id == device.id() && v.source_class_id == device.class_id())
    }
}

/// Read and parse the 592-byte header at the start of `device`.
fn read_header(device: &mut dyn BlockDevice) -> Result<Phdr> {
    let mut raw = [0u8; luks1::HEADER_LEN];
    device.read(0, 0, &mut raw)?;
    Phdr::parse(&mut raw.as_slice())
}
