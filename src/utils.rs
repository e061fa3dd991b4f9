//! Low-level I/O primitives shared by the header parser.
//!
//! Each function reads exactly the bytes it promises or returns an error -
//! there is no partial-read ambiguity. All LUKS1 multi-byte integers are
//! big-endian regardless of host order.

use std::io::Read;

use crate::Result;

/// Read a big-endian `u16`.
#[inline]
pub(crate) fn be_u16<R: Read>(r: &mut R) -> Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_be_bytes(b))
}

/// Read a big-endian `u32`.
#[inline]
pub(crate) fn be_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_be_bytes(b))
}

/// Read exactly `N` bytes into a fixed-size array.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Read an `N`-byte fixed-width ASCII field and decode it.
///
/// On disk the field is NUL- or space-terminated; the value ends at the
/// first NUL and trailing spaces are dropped, so a full-width field still
/// decodes (the on-disk layout reserves no terminator byte).
#[inline]
pub(crate) fn str_field<R: Read, const N: usize>(r: &mut R) -> Result<String> {
    let raw = bytesa::<N>(r)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(N);
    let s = String::from_utf8_lossy(&raw[..end]);
    Ok(s.trim_end_matches(' ').to_owned())
}
