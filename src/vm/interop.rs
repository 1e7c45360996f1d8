//! System call identifiers.
//!
//! A syscall operand is the first four bytes (little-endian) of the SHA-256
//! of the call's name.

use crate::crypto::hash::sha256;
use crate::smartcontract::callflag::CallFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syscall {
    ContractCall,
    RuntimeNotify,
    RuntimeGetAddressVersion,
    RuntimeLog,
}

impl Syscall {
    pub const ALL: [Syscall; 4] = [
        Syscall::ContractCall,
        Syscall::RuntimeNotify,
        Syscall::RuntimeGetAddressVersion,
        Syscall::RuntimeLog,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Syscall::ContractCall => "System.Contract.Call",
            Syscall::RuntimeNotify => "System.Runtime.Notify",
            Syscall::RuntimeGetAddressVersion => "System.Runtime.GetAddressVersion",
            Syscall::RuntimeLog => "System.Runtime.Log",
        }
    }

    pub fn id(self) -> u32 {
        interop_id(self.name())
    }

    /// Flags the calling context must hold.
    pub fn required_flags(self) -> CallFlags {
        match self {
            Syscall::ContractCall => CallFlags::READ_STATES.union(CallFlags::ALLOW_CALL),
            Syscall::RuntimeNotify | Syscall::RuntimeLog => CallFlags::ALLOW_NOTIFY,
            Syscall::RuntimeGetAddressVersion => CallFlags::NONE,
        }
    }

    pub fn from_id(id: u32) -> Option<Syscall> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }
}

pub fn interop_id(name: &str) -> u32 {
    let h = sha256(name.as_bytes());
    u32::from_le_bytes([h[0], h[1], h[2], h[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_and_reversible() {
        for s in Syscall::ALL {
            assert_eq!(Syscall::from_id(s.id()), Some(s));
        }
        assert_ne!(Syscall::ContractCall.id(), Syscall::RuntimeNotify.id());
    }

    #[test]
    fn test_contract_call_id() {
        // Well-known id of System.Contract.Call.
        assert_eq!(Syscall::ContractCall.id(), 0x525b7d62);
    }
}
