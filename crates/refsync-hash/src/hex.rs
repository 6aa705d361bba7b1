//! Lowercase hex encoding and decoding for object ids.

use crate::HashError;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Encode bytes as a lowercase hex string.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0xf) as usize] as char);
    }
    out
}

/// Decode a hex string into `out`. The input must be exactly
/// `out.len() * 2` characters.
pub fn decode(hex: &str, out: &mut [u8]) -> Result<(), HashError> {
    let hex = hex.as_bytes();
    if hex.len() != out.len() * 2 {
        return Err(HashError::InvalidHexLength {
            expected: out.len() * 2,
            actual: hex.len(),
        });
    }
    for (i, chunk) in hex.chunks_exact(2).enumerate() {
        let hi = nibble(chunk[0], i * 2)?;
        let lo = nibble(chunk[1], i * 2 + 1)?;
        out[i] = (hi << 4) | lo;
    }
    Ok(())
}

fn nibble(byte: u8, position: usize) -> Result<u8, HashError> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        _ => Err(HashError::InvalidHexByte { byte, position }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let bytes = [0xde, 0xad, 0xbe, 0xef];
        let hex = encode(&bytes);
        assert_eq!(hex, "deadbeef");

        let mut out = [0u8; 4];
        decode(&hex, &mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn decode_uppercase() {
        let mut out = [0u8; 2];
        decode("DEAD", &mut out).unwrap();
        assert_eq!(out, [0xde, 0xad]);
    }

    #[test]
    fn decode_rejects_bad_length() {
        let mut out = [0u8; 2];
        assert!(matches!(
            decode("dea", &mut out),
            Err(HashError::InvalidHexLength { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_char() {
        let mut out = [0u8; 2];
        assert!(matches!(
            decode("dexd", &mut out),
            Err(HashError::InvalidHexByte { byte: b'x', position: 2 })
        ));
    }
}
