//! Unlock LUKS1 images from the command line and dump the first
//! plaintext sector of each.
//!
//! ```text
//! unlock <image>...        unlock the named image files
//! unlock -u <uuid> <image>...   unlock whichever image has the UUID
//! unlock -a <image>...     unlock every image the passphrase opens
//! ```

use std::fs::File;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::process::ExitCode;

use lukskit::device::{BlockDevice, DeviceProvider, PassphraseSource, SECTOR_BITS, SECTOR_SIZE};
use lukskit::{Registry, Result};
use zeroize::Zeroizing;

/// A raw image file exposed as a block device.
struct FileDevice {
    id: u64,
    file: File,
}

impl BlockDevice for FileDevice {
    fn id(&self) -> u64 {
        self.id
    }

    fn class_id(&self) -> u64 {
        u64::from_be_bytes(*b"filedev\0")
    }

    fn sectors(&self) -> lukskit::Result<u64> {
        Ok(self.file.metadata().map_err(lukskit::Error::Io)?.len() >> SECTOR_BITS)
    }

    fn read(&mut self, sector: u64, byte_offset: u64, buf: &mut [u8]) -> lukskit::Result<()> {
        self.file
            .seek(SeekFrom::Start((sector << SECTOR_BITS) + byte_offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }
}

struct FileProvider {
    paths: Vec<String>,
}

impl DeviceProvider for FileProvider {
    fn device_names(&self) -> Vec<String> {
        self.paths.clone()
    }

    fn open(&mut self, name: &str) -> lukskit::Result<Box<dyn BlockDevice>> {
        let id = self
            .paths
            .iter()
            .position(|p| p == name)
            .ok_or_else(|| lukskit::Error::UnknownDevice(name.to_owned()))?;
        let file = File::open(name).map_err(lukskit::Error::Io)?;
        Ok(Box::new(FileDevice { id: id as u64, file }))
    }
}

/// Prompt on stderr, read one line from stdin.
struct StdinPassphrase;

impl PassphraseSource for StdinPassphrase {
    fn passphrase(&mut self, source: &str, uuid: &str) -> Option<Zeroizing<Vec<u8>>> {
        eprint!("Enter passphrase for {source} ({uuid}): ");
        io::stderr().flush().ok();
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return None;
        }
        Some(Zeroizing::new(line.as_bytes().to_vec()))
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut registry = Registry::new();
    let mut pass = StdinPassphrase;

    match args.first().map(String::as_str) {
        Some("-u") if args.len() >= 3 => {
            let mut provider = FileProvider {
                paths: args[2..].to_vec(),
            };
            registry.unlock_by_uuid(&mut provider, &mut pass, &args[1])?;
        }
        Some("-a") if args.len() >= 2 => {
            let mut provider = FileProvider {
                paths: args[1..].to_vec(),
            };
            let n = registry.unlock_all(&mut provider, &mut pass)?;
            eprintln!("unlocked {n} volume(s)");
        }
        Some(_) => {
            let mut provider = FileProvider {
                paths: args.clone(),
            };
            for name in args.clone() {
                registry.unlock(&mut provider, &mut pass, &name)?;
            }
        }
        None => {
            eprintln!("usage: unlock [-a | -u UUID] IMAGE...");
            return Err(lukskit::Error::UnknownDevice("no image given".into()));
        }
    }

    let mut provider = FileProvider {
        paths: registry.volumes().map(|v| v.source().to_owned()).collect(),
    };
    for name in registry.iterate() {
        let ordinal = registry.open(&mut provider, &name)?;
        let mut sector0 = vec![0u8; SECTOR_SIZE];
        registry.read(ordinal, 0, &mut sector0)?;
        println!(
            "{name}: {} sectors, first plaintext bytes: {:02x?}",
            registry.sectors(ordinal)?,
            &sector0[..16]
        );
        registry.close(ordinal)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
