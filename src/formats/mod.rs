//! Parsers for on-disk encrypted-volume headers.
//!
//! All parsers follow the same conventions:
//!
//! * **Generic over** [`std::io::Read`] - pass a [`std::io::Cursor`], a
//!   byte slice, or a buffered device read.
//! * **Metadata only** - `parse` reads the header and builds an in-memory
//!   description; payload data is never touched.
//! * **Crypto is separate** - parsers hand their fields to
//!   [`crate::crypto::sector::SectorCipher`] for negotiation; they never
//!   allocate cipher state themselves, so a magic mismatch is free.
//!
//! | Module | Format | Description |
//! |--------|--------|-------------|
//! | [`luks1`] | LUKS1 | 592-byte big-endian header with 8 passphrase-protected key slots |

pub mod luks1;
