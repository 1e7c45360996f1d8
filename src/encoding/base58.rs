//! Base58 with a four-byte double SHA-256 checksum suffix.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Base58Error {
    #[error("invalid base58 string: {0}")]
    Alphabet(String),
    #[error("base58 payload too short for checksum")]
    TooShort,
    #[error("checksum mismatch")]
    Checksum,
}

impl From<bs58::decode::Error> for Base58Error {
    fn from(e: bs58::decode::Error) -> Self {
        match e {
            bs58::decode::Error::InvalidChecksum { .. } => Base58Error::Checksum,
            bs58::decode::Error::NoChecksum => Base58Error::TooShort,
            other => Base58Error::Alphabet(other.to_string()),
        }
    }
}

/// Encode `data` followed by its checksum.
pub fn check_encode(data: &[u8]) -> String {
    bs58::encode(data).with_check().into_string()
}

/// Decode a base58check string and strip the verified checksum.
pub fn check_decode(s: &str) -> Result<Vec<u8>, Base58Error> {
    Ok(bs58::decode(s).with_check(None).into_vec()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_roundtrip() {
        let data = vec![0x35, 1, 2, 3, 4, 5];
        let s = check_encode(&data);
        assert_eq!(check_decode(&s).unwrap(), data);
    }

    #[test]
    fn test_checksum_suffix() {
        let data = [0x35u8, 7, 7];
        let raw = bs58::decode(check_encode(&data)).into_vec().unwrap();
        assert_eq!(raw[..3], data);
        assert_eq!(raw[3..], crate::crypto::hash::checksum(&data));
    }

    #[test]
    fn test_corrupted_checksum() {
        let mut raw = vec![0x35, 9, 9, 9];
        raw.extend_from_slice(&[0, 0, 0, 0]);
        let s = bs58::encode(raw).into_string();
        assert_eq!(check_decode(&s), Err(Base58Error::Checksum));
    }

    #[test]
    fn test_invalid_alphabet() {
        assert!(matches!(check_decode("0OIl"), Err(Base58Error::Alphabet(_))));
    }

    #[test]
    fn test_too_short() {
        let s = bs58::encode([1u8, 2]).into_string();
        assert_eq!(check_decode(&s), Err(Base58Error::TooShort));
    }
}
