// SPDX-License-Identifier: MIT

//! Bit-level accessors for report payloads plus the hex string codecs
//! used at the I/O boundary.
//!
//! Report fields are packed little-endian within bytes: bit 0 of a byte
//! is the least significant bit, and a field starting at bit `offset`
//! occupies bits `offset..offset + length` of the buffer with the
//! field's own LSB first.

use crate::{ensure, ParserError};

type Result<T> = std::result::Result<T, ParserError>;

/// Read a `length`-bit field (`length <= 32`) starting at bit `offset`.
///
/// Bit `i` of the result is bit `(offset + i) & 7` of byte
/// `(offset + i) / 8`. With `signed` the result is sign-extended from
/// `length` bits to the full 32.
pub fn peek(buffer: &[u8], offset: usize, length: usize, signed: bool) -> Result<i32> {
    ensure!(
        length <= 32,
        ParserError::InvalidArgument {
            message: format!("invalid bit field length {length}"),
        }
    );
    ensure!(offset + length <= buffer.len() * 8, ParserError::OutOfBounds);

    let mut res: u32 = 0;
    for i in 0..length {
        if buffer[(offset + i) / 8] & (1 << ((offset + i) & 7)) != 0 {
            res |= 1 << i;
        }
    }

    let mut res = res as i32;
    if signed && length > 0 {
        res = res << (32 - length) >> (32 - length);
    }

    Ok(res)
}

/// Write the low `length` bits (`length <= 32`) of `value` starting at
/// bit `offset`. Zero bits in `value` clear the corresponding buffer
/// bits, so a field can be overwritten in place.
pub fn poke(buffer: &mut [u8], offset: usize, length: usize, value: i32) -> Result<()> {
    ensure!(
        length <= 32,
        ParserError::InvalidArgument {
            message: format!("invalid bit field length {length}"),
        }
    );
    ensure!(offset + length <= buffer.len() * 8, ParserError::OutOfBounds);

    for i in 0..length {
        if value & (1 << i) != 0 {
            buffer[(offset + i) / 8] |= 1 << ((offset + i) & 7);
        } else {
            buffer[(offset + i) / 8] &= !(1 << ((offset + i) & 7));
        }
    }

    Ok(())
}

/// Encode bytes as an uppercase hex string, two digits per byte.
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

/// Decode a hex string (case-insensitive, no separators) into bytes.
pub fn from_hex(hex: &str) -> Result<Vec<u8>> {
    ensure!(
        hex.len() % 2 == 0,
        ParserError::InvalidArgument {
            message: format!("odd hex string length {}", hex.len()),
        }
    );

    hex.as_bytes()
        .chunks(2)
        .map(|pair| Ok(hex_digit(pair[0])? << 4 | hex_digit(pair[1])?))
        .collect()
}

fn hex_digit(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(ParserError::InvalidArgument {
            message: format!("invalid hex digit {:?}", c as char),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_unsigned() {
        let buffer = [0b1010_0101, 0b0000_1111];
        assert_eq!(peek(&buffer, 0, 8, false).unwrap(), 0xa5);
        assert_eq!(peek(&buffer, 0, 4, false).unwrap(), 0x5);
        assert_eq!(peek(&buffer, 4, 4, false).unwrap(), 0xa);
        // straddles the byte boundary
        assert_eq!(peek(&buffer, 4, 8, false).unwrap(), 0xfa);
        assert_eq!(peek(&buffer, 0, 16, false).unwrap(), 0x0fa5);
        assert_eq!(peek(&buffer, 0, 0, false).unwrap(), 0);
    }

    #[test]
    fn peek_signed() {
        let buffer = [0xff, 0x7f];
        assert_eq!(peek(&buffer, 0, 4, true).unwrap(), -1);
        assert_eq!(peek(&buffer, 0, 8, true).unwrap(), -1);
        assert_eq!(peek(&buffer, 0, 16, true).unwrap(), 0x7fff);
        let buffer = [0x80, 0x80];
        assert_eq!(peek(&buffer, 0, 8, true).unwrap(), -128);
        assert_eq!(peek(&buffer, 0, 16, true).unwrap(), -32640);
        let buffer = [0xff, 0xff, 0xff, 0xff];
        assert_eq!(peek(&buffer, 0, 32, true).unwrap(), -1);
        assert_eq!(peek(&buffer, 0, 32, false).unwrap(), -1);
    }

    #[test]
    fn poke_roundtrip() {
        let mut buffer = [0u8; 12];
        for length in 1..=32usize {
            for offset in [0usize, 1, 3, 7, 8, 13] {
                for value in [0i32, 1, -1, 0x5a5a_a5a5u32 as i32, i32::MIN, i32::MAX] {
                    poke(&mut buffer, offset, length, value).unwrap();
                    let mask = (1u64 << length) - 1;
                    let expected = (value as u32 as u64 & mask) as u32;
                    let read = peek(&buffer, offset, length, false).unwrap() as u32;
                    assert_eq!(
                        read, expected,
                        "length={length} offset={offset} value={value:#x}"
                    );
                }
            }
        }
    }

    #[test]
    fn poke_clears_stale_bits() {
        let mut buffer = [0xffu8; 4];
        poke(&mut buffer, 5, 9, 0).unwrap();
        assert_eq!(peek(&buffer, 5, 9, false).unwrap(), 0);
        assert_eq!(peek(&buffer, 0, 5, false).unwrap(), 0x1f);
        assert_eq!(peek(&buffer, 14, 2, false).unwrap(), 0x3);
    }

    #[test]
    fn peek_poke_errors() {
        let mut buffer = [0u8; 4];
        assert!(matches!(
            peek(&buffer, 0, 33, false),
            Err(ParserError::InvalidArgument { .. })
        ));
        assert!(matches!(
            poke(&mut buffer, 0, 33, 0),
            Err(ParserError::InvalidArgument { .. })
        ));
        assert!(matches!(
            peek(&buffer, 24, 16, false),
            Err(ParserError::OutOfBounds)
        ));
        assert!(matches!(
            poke(&mut buffer, 32, 1, 1),
            Err(ParserError::OutOfBounds)
        ));
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = [0x05u8, 0x01, 0xa1, 0x00, 0xff];
        let hex = to_hex(&bytes);
        assert_eq!(hex, "0501A100FF");
        assert_eq!(from_hex(&hex).unwrap(), bytes);
        assert_eq!(from_hex("0501a100ff").unwrap(), bytes);
        assert_eq!(from_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn hex_errors() {
        assert!(matches!(
            from_hex("05f"),
            Err(ParserError::InvalidArgument { .. })
        ));
        assert!(matches!(
            from_hex("zz"),
            Err(ParserError::InvalidArgument { .. })
        ));
    }
}
