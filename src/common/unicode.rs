//! UTF-8 ⇄ UTF-16 conversion for everything that crosses into the wide
//! native API.

use super::error::{Error, Result};

/// Longest UTF-8 encoding of a single UTF-16 code unit.
///
/// A BMP scalar takes at most three UTF-8 bytes. A surrogate pair (two units)
/// becomes four UTF-8 bytes, so per unit it never exceeds this bound either.
pub const MAX_UTF8_BYTES_PER_WIDE_UNIT: usize = 3;

/// Longest directory entry name the wide directory API can return, in UTF-16
/// code units including its terminator.
pub const WIDE_NAME_MAX: usize = 260;

/// Bytes needed to hold `units` UTF-16 code units as UTF-8, plus a
/// terminating NUL.
pub const fn utf8_capacity_for_wide(units: usize) -> usize {
    units * MAX_UTF8_BYTES_PER_WIDE_UNIT + 1
}

/// A NUL-terminated wide string owned for the duration of one native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideString {
    units: Vec<u16>,
}

impl WideString {
    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }

    /// Code units without the terminator.
    pub fn as_units(&self) -> &[u16] {
        &self.units[..self.units.len() - 1]
    }

    /// Appends raw code units before the terminator.
    pub fn push_units(&mut self, extra: &[u16]) -> Result<()> {
        self.units.try_reserve(extra.len())?;
        self.units.pop();
        self.units.extend_from_slice(extra);
        self.units.push(0);
        Ok(())
    }
}

/// Converts UTF-8 text into a NUL-terminated wide string.
///
/// Empty input and input with an interior NUL are rejected, because neither
/// can name anything on the native side.
pub fn to_wide(value: &str) -> Result<WideString> {
    if value.is_empty() || value.contains('\0') {
        return Err(Error::EncodingError);
    }
    let needed = value.encode_utf16().count() + 1;
    let mut units = Vec::new();
    units.try_reserve_exact(needed)?;
    units.extend(value.encode_utf16());
    units.push(0);
    Ok(WideString { units })
}

/// Converts wide text (without terminator) to UTF-8.
///
/// Unpaired surrogates cannot be represented and fail with `EncodingError`.
pub fn from_wide(units: &[u16]) -> Result<String> {
    if units.is_empty() {
        return Err(Error::EncodingError);
    }
    let mut out = String::new();
    out.try_reserve(units.len() * MAX_UTF8_BYTES_PER_WIDE_UNIT)?;
    for ch in char::decode_utf16(units.iter().copied()) {
        out.push(ch.map_err(|_| Error::EncodingError)?);
    }
    Ok(out)
}

/// Encodes `units` as UTF-8 into `out` followed by a NUL and returns the
/// encoded length without the NUL.
///
/// `out` must have room for `utf8_capacity_for_wide(units.len())` bytes to be
/// guaranteed to fit; a shorter buffer fails with `RangeExceeded` when the
/// text does not fit.
pub fn encode_wide_into(units: &[u16], out: &mut [u8]) -> Result<usize> {
    let mut len = 0;
    let mut scratch = [0u8; 4];
    for ch in char::decode_utf16(units.iter().copied()) {
        let ch = ch.map_err(|_| Error::EncodingError)?;
        let encoded = ch.encode_utf8(&mut scratch).as_bytes();
        if len + encoded.len() + 1 > out.len() {
            return Err(Error::RangeExceeded);
        }
        out[len..len + encoded.len()].copy_from_slice(encoded);
        len += encoded.len();
    }
    if len >= out.len() {
        return Err(Error::RangeExceeded);
    }
    out[len] = 0;
    Ok(len)
}

/// Length of a NUL-terminated wide slice, or the whole slice if it has no NUL.
pub fn wide_len(units: &[u16]) -> usize {
    units.iter().position(|c| *c == 0).unwrap_or(units.len())
}
