//! Common Utilities
//!
//! Provides utility functions used across the PDCP implementation

use bytes::{Bytes, BytesMut, BufMut};
use tracing::trace;

/// Length of a 128-bit security key in bytes
pub const KEY_128_LEN: usize = 16;

/// Convert a byte slice to hex string for debugging
pub fn bytes_to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a hex string into bytes
///
/// Whitespace and an optional `0x` prefix are ignored.
pub fn hex_to_bytes(hex: &str) -> Option<Bytes> {
    let hex = hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let digits: Vec<u8> = hex
        .bytes()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if digits.len() % 2 != 0 {
        trace!("Odd number of hex digits: {}", digits.len());
        return None;
    }

    let mut out = BytesMut::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.put_u8(((hi << 4) | lo) as u8);
    }

    Some(out.freeze())
}

/// Decode a 128-bit key from its hex representation
pub fn parse_key_128(hex: &str) -> Option<[u8; KEY_128_LEN]> {
    let bytes = hex_to_bytes(hex)?;
    if bytes.len() != KEY_128_LEN {
        trace!("Key has {} bytes, expected {}", bytes.len(), KEY_128_LEN);
        return None;
    }

    let mut key = [0u8; KEY_128_LEN];
    key.copy_from_slice(&bytes);
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        let data = vec![0x12, 0x34, 0xAB, 0xCD];
        assert_eq!(bytes_to_hex(&data), "12 34 ab cd");
    }

    #[test]
    fn test_hex_to_bytes() {
        assert_eq!(hex_to_bytes("1234abCD").unwrap().as_ref(), &[0x12, 0x34, 0xab, 0xcd]);
        assert_eq!(hex_to_bytes("0x12 34").unwrap().as_ref(), &[0x12, 0x34]);
        assert!(hex_to_bytes("123").is_none());
        assert!(hex_to_bytes("zz").is_none());
    }

    #[test]
    fn test_parse_key_128() {
        let key = parse_key_128("2bd6459f82c5b300952c49104881ff48").unwrap();
        assert_eq!(key[0], 0x2b);
        assert_eq!(key[15], 0x48);
        assert!(parse_key_128("2bd6").is_none());
    }
}
