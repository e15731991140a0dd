//! Strict fixed-length hex parsing for EUIs and keys
//!
//! Operator input is accepted only when it has exactly the expected number
//! of hex digits. Two digits pack into one byte, high nibble first.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("expected {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid hex character {c:?} at position {index}")]
    InvalidDigit { c: char, index: usize },
}

/// Decode exactly `N` bytes from `2 * N` hex characters
pub fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], HexError> {
    if text.len() != N * 2 {
        return Err(HexError::Length {
            expected: N * 2,
            actual: text.len(),
        });
    }

    let mut out = [0u8; N];
    hex::decode_to_slice(text, &mut out).map_err(|err| match err {
        hex::FromHexError::InvalidHexCharacter { c, index } => HexError::InvalidDigit { c, index },
        _ => HexError::Length {
            expected: N * 2,
            actual: text.len(),
        },
    })?;
    Ok(out)
}

/// Decode a 64-bit identifier from exactly 16 hex characters, most significant first
pub fn decode_u64(text: &str) -> Result<u64, HexError> {
    decode_fixed::<8>(text).map(u64::from_be_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fixed_key() {
        let key = decode_fixed::<16>("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(
            key,
            [
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC,
                0xDD, 0xEE, 0xFF
            ]
        );
    }

    #[test]
    fn test_decode_fixed_mixed_case() {
        let bytes = decode_fixed::<2>("aBcD").unwrap();
        assert_eq!(bytes, [0xAB, 0xCD]);
    }

    #[test]
    fn test_decode_fixed_wrong_length_fails() {
        let result = decode_fixed::<16>("00112233445566778899aabbccddeeff0");
        assert_eq!(
            result,
            Err(HexError::Length {
                expected: 32,
                actual: 33
            })
        );
        assert!(decode_fixed::<16>("").is_err());
    }

    #[test]
    fn test_decode_fixed_non_hex_fails() {
        let result = decode_fixed::<16>("00112233445566778899aabbccddeefg");
        assert_eq!(result, Err(HexError::InvalidDigit { c: 'g', index: 31 }));
    }

    #[test]
    fn test_decode_u64_bounds() {
        assert_eq!(decode_u64("0000000000000000"), Ok(0));
        assert_eq!(decode_u64("FFFFFFFFFFFFFFFF"), Ok(u64::MAX));
        assert_eq!(decode_u64("70B3D57ED0000001"), Ok(0x70B3_D57E_D000_0001));
    }

    #[test]
    fn test_decode_u64_wrong_length_fails() {
        assert!(decode_u64("FFFFFFFFFFFFFFF").is_err());
        assert!(decode_u64("FFFFFFFFFFFFFFFFF").is_err());
        assert!(decode_u64(" 000000000000000").is_err());
    }
}
