//! Native contracts referenced by compiler templates.

use crate::crypto::hash::HASH160_LEN;

/// Script hash of StdLib, in script (little-endian) byte order.
pub const STDLIB_HASH: [u8; HASH160_LEN] = [
    0xc0, 0xef, 0x39, 0xce, 0xe0, 0xe4, 0xe9, 0x25, 0xc6, 0xc2, 0xa0, 0x6a, 0x79, 0xe1, 0x44, 0x0d,
    0xd8, 0x6f, 0xce, 0xac,
];

/// Script hash of ContractManagement, in script byte order.
pub const MANAGEMENT_HASH: [u8; HASH160_LEN] = [
    0xfd, 0xa3, 0xfa, 0x43, 0x46, 0xea, 0x53, 0x2a, 0x25, 0x8f, 0xc4, 0x97, 0xdd, 0xad, 0xdb, 0x64,
    0x37, 0xc9, 0xfd, 0xff,
];

pub const BASE58_CHECK_ENCODE: &str = "base58CheckEncode";
pub const BASE58_CHECK_DECODE: &str = "base58CheckDecode";
pub const GET_CONTRACT: &str = "getContract";

/// Index of the update counter in the contract state returned by `getContract`.
pub const CONTRACT_STATE_UPDATE_COUNTER: i64 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::hash160_to_string;

    #[test]
    fn test_native_hashes() {
        assert_eq!(
            hash160_to_string(&STDLIB_HASH),
            "0xacce6fd80d44e1796aa0c2c625e9e4e0ce39efc0"
        );
        assert_eq!(
            hash160_to_string(&MANAGEMENT_HASH),
            "0xfffdc93764dbaddd97c48f252a53ea4643faa3fd"
        );
    }
}
