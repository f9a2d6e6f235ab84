//! Bit-vector helpers
//!
//! Codewords travel over the wire as hex, most significant bit of each byte
//! first.

use crate::error::{Error, Result};

/// Pack bits MSB-first into hex; a trailing partial byte is zero-padded
pub fn bits_to_hex(bits: &[u8]) -> String {
    let bytes: Vec<u8> = bits
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit & 1) << (7 - i)))
        })
        .collect();
    hex::encode(bytes)
}

/// Unpack hex (optionally `0x`-prefixed) into bits, MSB-first per byte
pub fn hex_to_bits(hex_str: &str) -> Result<Vec<u8>> {
    let trimmed = hex_str.trim_start_matches("0x").trim_start_matches("0X");
    let bytes = hex::decode(trimmed)
        .map_err(|e| Error::validation(format!("Invalid codeword hex: {}", e)))?;
    Ok(bytes_to_bits(&bytes))
}

/// Expand bytes into bits, MSB-first per byte
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |shift| (byte >> shift) & 1))
        .collect()
}

/// Number of set bits
pub fn hamming_weight(bits: &[u8]) -> usize {
    bits.iter().filter(|&&b| b & 1 == 1).count()
}

/// Derive the length-`n` hash vector from a digest
///
/// Only the first `n / 8` digest bytes contribute; any remaining positions
/// stay zero.
pub fn hash_vector(n: usize, digest: &[u8]) -> Vec<u8> {
    let mut vector = vec![0u8; n];
    for (i, &byte) in digest.iter().enumerate().take(n / 8) {
        for j in 0..8 {
            vector[8 * i + j] = (byte >> (7 - j)) & 1;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bits_to_hex() {
        assert_eq!(bits_to_hex(&[1, 0, 0, 0, 0, 0, 0, 1]), "81");
        assert_eq!(bits_to_hex(&[1, 1, 1, 1]), "f0");
        assert_eq!(bits_to_hex(&[]), "");
    }

    #[test]
    fn test_hex_to_bits() {
        assert_eq!(hex_to_bits("0x81").unwrap(), vec![1, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(hex_to_bits("ff").unwrap(), vec![1; 8]);
        assert!(hex_to_bits("0xf").is_err());
        assert!(hex_to_bits("zz").is_err());
    }

    #[test]
    fn test_hamming_weight() {
        assert_eq!(hamming_weight(&[1, 0, 1, 1]), 3);
        assert_eq!(hamming_weight(&[]), 0);
    }

    #[test]
    fn test_hash_vector_layout() {
        let digest = [0b1010_0000u8, 0xff, 0x00];
        let vector = hash_vector(20, &digest);
        assert_eq!(vector.len(), 20);
        assert_eq!(&vector[..8], &[1, 0, 1, 0, 0, 0, 0, 0]);
        assert_eq!(&vector[8..16], &[1; 8]);
        // 20 / 8 = 2 bytes used, the rest stays zero
        assert_eq!(&vector[16..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_hash_vector_longer_than_digest() {
        let vector = hash_vector(32, &[0xff]);
        assert_eq!(hamming_weight(&vector), 8);
    }
}
