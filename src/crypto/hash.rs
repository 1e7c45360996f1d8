//! Hash primitives used for script hashes, checksums and interop ids.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Length of a script hash in bytes.
pub const HASH160_LEN: usize = 20;

/// Length of a transaction/block hash in bytes.
pub const HASH256_LEN: usize = 32;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 applied twice.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn ripemd160(data: &[u8]) -> [u8; HASH160_LEN] {
    Ripemd160::digest(data).into()
}

/// RIPEMD-160 of SHA-256, the script hash of a contract or verification script.
pub fn hash160(data: &[u8]) -> [u8; HASH160_LEN] {
    ripemd160(&sha256(data))
}

/// First four bytes of the double SHA-256 of `data`.
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let h = double_sha256(data);
    [h[0], h[1], h[2], h[3]]
}

/// Render a script hash the way explorers and manifests show it: `0x` and
/// big-endian hex.
pub fn hash160_to_string(hash: &[u8; HASH160_LEN]) -> String {
    let mut be = *hash;
    be.reverse();
    format!("0x{}", hex::encode(be))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_ripemd160_empty() {
        assert_eq!(
            hex::encode(ripemd160(b"")),
            "9c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
    }

    #[test]
    fn test_checksum_is_double_sha_prefix() {
        let data = b"hello";
        let full = double_sha256(data);
        assert_eq!(checksum(data), [full[0], full[1], full[2], full[3]]);
    }

    #[test]
    fn test_hash160_composes() {
        let data = b"\x01\x02\x03";
        assert_eq!(hash160(data), ripemd160(&sha256(data)));
    }

    #[test]
    fn test_hash160_to_string_is_big_endian() {
        let mut h = [0u8; HASH160_LEN];
        h[0] = 0xab;
        let s = hash160_to_string(&h);
        assert!(s.starts_with("0x00"));
        assert!(s.ends_with("ab"));
    }
}
