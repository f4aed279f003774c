//! Modified UTF-8 as used by `CONSTANT_Utf8_info` (JVMS §4.4.7).
//!
//! Differs from standard UTF-8 in two ways: the NUL character is written as the two-byte
//! sequence `0xC0 0x80`, and supplementary characters are written as a surrogate pair where each
//! surrogate is encoded on its own with three bytes.

use crate::Result;

/// Decodes modified UTF-8 bytes into a Rust string.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for truncated sequences, forbidden bytes or unpaired
/// surrogates.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let units = decode_units(bytes)?;
    String::from_utf16(&units).map_err(|_| malformed_error!("Unpaired surrogate in modified UTF-8"))
}

/// Decodes modified UTF-8 bytes into UTF-16 code units.
///
/// Unlike [`decode`] this accepts unpaired surrogates, which Java strings may contain.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for truncated sequences and forbidden bytes.
pub fn decode_units(bytes: &[u8]) -> Result<Vec<u16>> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while pos < bytes.len() {
        let first = bytes[pos];
        match first {
            0x01..=0x7F => {
                units.push(u16::from(first));
                pos += 1;
            }
            0xC0..=0xDF => {
                let second = continuation(bytes, pos + 1)?;
                units.push((u16::from(first & 0x1F) << 6) | u16::from(second));
                pos += 2;
            }
            0xE0..=0xEF => {
                let second = continuation(bytes, pos + 1)?;
                let third = continuation(bytes, pos + 2)?;
                units.push(
                    (u16::from(first & 0x0F) << 12) | (u16::from(second) << 6) | u16::from(third),
                );
                pos += 3;
            }
            _ => {
                return Err(malformed_error!(
                    "Invalid modified UTF-8 byte 0x{:02X} at {}",
                    first,
                    pos
                ))
            }
        }
    }

    Ok(units)
}

fn continuation(bytes: &[u8], pos: usize) -> Result<u8> {
    match bytes.get(pos) {
        Some(byte) if byte & 0xC0 == 0x80 => Ok(byte & 0x3F),
        Some(byte) => Err(malformed_error!(
            "Invalid continuation byte 0x{:02X} at {}",
            byte,
            pos
        )),
        None => Err(malformed_error!("Truncated modified UTF-8 sequence")),
    }
}

/// Number of bytes [`encode`] produces for `value`.
#[must_use]
pub fn encoded_len(value: &str) -> usize {
    value
        .encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Encodes a Rust string as modified UTF-8.
#[must_use]
pub fn encode(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());

    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    out
}
