//! **lukskit** - a read-only Rust library for unlocking and reading LUKS1
//! encrypted volumes.
//!
//! Given a block device holding a LUKS version 1 header and a passphrase,
//! the library recovers the master key through the anti-forensic key-slot
//! machinery and exposes a virtual block device whose sector reads return
//! plaintext. Writing is refused unconditionally.
//!
//! # Modules
//! | Module | Purpose |
//! |--------|---------|
//! | [`formats::luks1`] | On-disk LUKS1 header parsing |
//! | [`crypto`]         | Cipher/hash registries, GF(2^128), AF merge, sector codecs |
//! | [`device`]         | Block-device and passphrase capabilities |
//! | [`volume`]         | One unlocked volume: key recovery and the read path |
//! | [`registry`]       | Volume registry: unlock commands, `luks<n>` naming |
//!
//! # Supported cipher suites
//! Ciphers `aes`, `twofish`, `serpent`, `blowfish`; chaining modes `ecb`,
//! `cbc`, `pcbc`, `xts`, `lrw`; IV schemes `null`, `plain`, `plain64`,
//! `benbi`, `essiv:<hash>`; hashes `sha1`, `sha256`, `sha512`, `ripemd160`.

pub mod crypto;
pub mod device;
pub mod error;
pub mod formats;
pub mod registry;
pub mod utils;
pub mod volume;

pub use error::{Error, Result};
pub use registry::Registry;
