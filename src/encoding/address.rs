//! Conversion between address strings and 20-byte script hashes.
//!
//! An address is the base58check encoding of a one-byte version prefix
//! followed by the script hash.

use crate::crypto::hash::HASH160_LEN;
use crate::encoding::base58::{self, Base58Error};

/// Address version used by the current network.
pub const DEFAULT_ADDRESS_VERSION: u8 = 0x35;

/// Address version of the legacy network, rejected with a dedicated error.
pub const LEGACY_ADDRESS_VERSION: u8 = 0x17;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid address encoding: {0}")]
    Base58(Base58Error),
    #[error("invalid address checksum")]
    Checksum,
    #[error("invalid address length: expected {expected} bytes, got {found}")]
    InvalidLength { expected: usize, found: usize },
    #[error("invalid address prefix: expected 0x{expected:02x}, got 0x{found:02x}")]
    InvalidPrefix { expected: u8, found: u8 },
}

impl AddressError {
    /// Whether the address was produced for the legacy network.
    pub fn is_legacy_prefix(&self) -> bool {
        matches!(
            self,
            AddressError::InvalidPrefix { found, .. } if *found == LEGACY_ADDRESS_VERSION
        )
    }
}

impl From<Base58Error> for AddressError {
    fn from(e: Base58Error) -> Self {
        match e {
            Base58Error::Checksum => AddressError::Checksum,
            other => AddressError::Base58(other),
        }
    }
}

/// Decode an address into its script hash, checking the version byte.
pub fn to_hash160(address: &str, version: u8) -> Result<[u8; HASH160_LEN], AddressError> {
    let payload = base58::check_decode(address)?;
    if payload.len() != HASH160_LEN + 1 {
        return Err(AddressError::InvalidLength {
            expected: HASH160_LEN + 1,
            found: payload.len(),
        });
    }
    if payload[0] != version {
        return Err(AddressError::InvalidPrefix {
            expected: version,
            found: payload[0],
        });
    }
    let mut hash = [0u8; HASH160_LEN];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}

/// Encode a script hash as an address string.
pub fn from_hash160(hash: &[u8; HASH160_LEN], version: u8) -> String {
    let mut buf = Vec::with_capacity(HASH160_LEN + 1);
    buf.push(version);
    buf.extend_from_slice(hash);
    base58::check_encode(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "NQRLhCpAru9BjGsMwk67vdMwmzKMRgsnnN";

    #[test]
    fn test_decode_known_address() {
        let h = to_hash160(ADDR, DEFAULT_ADDRESS_VERSION).unwrap();
        assert_eq!(from_hash160(&h, DEFAULT_ADDRESS_VERSION), ADDR);
    }

    #[test]
    fn test_legacy_prefix() {
        let h = to_hash160(ADDR, DEFAULT_ADDRESS_VERSION).unwrap();
        let legacy = from_hash160(&h, LEGACY_ADDRESS_VERSION);
        let err = to_hash160(&legacy, DEFAULT_ADDRESS_VERSION).unwrap_err();
        assert!(err.is_legacy_prefix());
        assert!(err.to_string().contains("invalid address prefix"));
    }

    #[test]
    fn test_invalid_length() {
        let s = base58::check_encode(&[0u8; HASH160_LEN + 2]);
        assert_eq!(
            to_hash160(&s, DEFAULT_ADDRESS_VERSION),
            Err(AddressError::InvalidLength {
                expected: 21,
                found: 22
            })
        );
    }

    #[test]
    fn test_bad_checksum() {
        let mut chars: Vec<char> = ADDR.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'N' { 'M' } else { 'N' };
        let broken: String = chars.into_iter().collect();
        assert_eq!(
            to_hash160(&broken, DEFAULT_ADDRESS_VERSION),
            Err(AddressError::Checksum)
        );
    }
}
