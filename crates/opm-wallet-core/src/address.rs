//! EVM account addresses
//!
//! An address is the last 20 bytes of Keccak-256 over the 64-byte
//! uncompressed public key (without the `0x04` tag), rendered as `0x` plus
//! EIP-55 mixed-case hex.

use secp256k1::PublicKey;
use sha3::{Digest, Keccak256};

/// `0x` + 40 hex digits.
pub const ADDRESS_LEN: usize = 42;

/// Raw address length in bytes.
pub const ADDRESS_BYTES: usize = 20;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Derive the checksummed address of a public key.
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes.copy_from_slice(&hash[32 - ADDRESS_BYTES..]);
    to_checksum_address(&bytes)
}

/// EIP-55: upper-case every hex letter whose nibble in
/// Keccak-256(lower-case hex) is 8 or more.
pub fn to_checksum_address(bytes: &[u8; ADDRESS_BYTES]) -> String {
    let lower = hex::encode(bytes);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Structural check of an address string.
///
/// All-lower and all-upper hex carry no checksum and are accepted as is;
/// mixed case must match EIP-55 exactly.
pub fn is_valid_address(s: &str) -> bool {
    let Some(body) = s.strip_prefix("0x") else {
        return false;
    };
    if body.len() != ADDRESS_BYTES * 2 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true;
    }

    let mut bytes = [0u8; ADDRESS_BYTES];
    match hex::decode_to_slice(body, &mut bytes) {
        Ok(()) => to_checksum_address(&bytes) == s,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vectors from EIP-55
    const EIP55_VECTORS: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_eip55_vectors_encode() {
        for expected in EIP55_VECTORS {
            let mut bytes = [0u8; ADDRESS_BYTES];
            hex::decode_to_slice(&expected[2..], &mut bytes).unwrap();
            assert_eq!(to_checksum_address(&bytes), expected);
        }
    }

    #[test]
    fn test_eip55_vectors_validate() {
        for addr in EIP55_VECTORS {
            assert!(is_valid_address(addr), "{} should be valid", addr);
        }
    }

    #[test]
    fn test_single_case_addresses_accepted() {
        let addr = EIP55_VECTORS[0];
        assert!(is_valid_address(&addr.to_lowercase()));
        assert!(is_valid_address(&format!("0x{}", addr[2..].to_uppercase())));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // Flip the case of one letter
        let bad = EIP55_VECTORS[0].replacen("aA", "Aa", 1);
        assert!(!is_valid_address(&bad));
    }

    #[test]
    fn test_structural_rejections() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("0x"));
        assert!(!is_valid_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAe"));
        assert!(!is_valid_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAedd"));
        assert!(!is_valid_address("0xzaaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(!is_valid_address("0X5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
    }

    #[test]
    fn test_digit_only_address_has_no_case() {
        assert_eq!(
            to_checksum_address(&[0u8; ADDRESS_BYTES]),
            "0x0000000000000000000000000000000000000000"
        );
        assert!(is_valid_address(&to_checksum_address(&[0x11; ADDRESS_BYTES])));
    }

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
