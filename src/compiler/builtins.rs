//! Catalogue of interop packages the compiler lowers itself.
//!
//! Lookup is by canonical import path and symbol only, so aliasing an import
//! never hides a builtin and a user package with the same symbol names is
//! compiled as ordinary code.

use crate::smartcontract::CallFlags;
use crate::smartcontract::native::{
    BASE58_CHECK_DECODE, BASE58_CHECK_ENCODE, GET_CONTRACT, MANAGEMENT_HASH, STDLIB_HASH,
};
use crate::vm::{Opcode, StackItemType, Syscall};

pub const INTEROP_PREFIX: &str = "github.com/nspcc-dev/neo-go/pkg/interop";
pub const UTIL_PKG: &str = "github.com/nspcc-dev/neo-go/pkg/interop/util";
pub const ADDRESS_PKG: &str = "github.com/nspcc-dev/neo-go/pkg/interop/lib/address";
pub const CONTRACT_PKG: &str = "github.com/nspcc-dev/neo-go/pkg/interop/contract";
pub const LIB_CONTRACT_PKG: &str = "github.com/nspcc-dev/neo-go/pkg/interop/lib/contract";
pub const NEOGOINTERNAL_PKG: &str = "github.com/nspcc-dev/neo-go/pkg/interop/neogointernal";
pub const RUNTIME_PKG: &str = "github.com/nspcc-dev/neo-go/pkg/interop/runtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    PlainCall,
    FoldableConversion,
    Abort,
    EqualsOverride,
    TokenCall,
    NotifyCall,
    ContractCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == k,
            Arity::Variadic(min) => n >= min,
        }
    }
}

/// A static native contract call emitted through the method-token table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeMethod {
    pub hash: &'static [u8; 20],
    pub method: &'static str,
    pub params: u16,
    pub returns: bool,
    pub flags: CallFlags,
}

/// One step of an inline instruction template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Op(Opcode),
    PushInt(i64),
    Syscall(Syscall),
    Convert(StackItemType),
    Native(NativeMethod),
    AssertMsg(&'static str),
}

/// How a builtin is lowered once its arguments are on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Steps(&'static [Step]),
    /// Arguments are consumed by dedicated lowering code.
    ContractCall,
    TokenCall,
    VersionedCall,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    pub path: &'static str,
    pub symbol: &'static str,
    pub kind: BuiltinKind,
    pub arity: Arity,
    pub returns: bool,
    pub emission: Emission,
}

impl BuiltinDescriptor {
    pub fn qualified_name(&self) -> String {
        let pkg = self.path.rsplit('/').next().unwrap_or(self.path);
        format!("{}.{}", pkg, self.symbol)
    }

    pub fn foldable(&self) -> bool {
        self.kind == BuiltinKind::FoldableConversion
    }
}

pub const STDLIB_BASE58_CHECK_DECODE: NativeMethod = NativeMethod {
    hash: &STDLIB_HASH,
    method: BASE58_CHECK_DECODE,
    params: 1,
    returns: true,
    flags: CallFlags::NONE,
};

pub const STDLIB_BASE58_CHECK_ENCODE: NativeMethod = NativeMethod {
    hash: &STDLIB_HASH,
    method: BASE58_CHECK_ENCODE,
    params: 1,
    returns: true,
    flags: CallFlags::NONE,
};

pub const MANAGEMENT_GET_CONTRACT: NativeMethod = NativeMethod {
    hash: &MANAGEMENT_HASH,
    method: GET_CONTRACT,
    params: 1,
    returns: true,
    flags: CallFlags::READ_STATES,
};

/// Address string on the stack, 20-byte script hash left in its place.
const TO_HASH160: &[Step] = &[
    Step::Native(STDLIB_BASE58_CHECK_DECODE),
    Step::Op(Opcode::DUP),
    Step::Op(Opcode::SIZE),
    Step::PushInt(21),
    Step::Op(Opcode::NUMEQUAL),
    Step::AssertMsg("invalid address length"),
    Step::Op(Opcode::DUP),
    Step::Op(Opcode::PUSH0),
    Step::Op(Opcode::PICKITEM),
    Step::Syscall(Syscall::RuntimeGetAddressVersion),
    Step::Op(Opcode::NUMEQUAL),
    Step::AssertMsg("invalid address prefix"),
    Step::Op(Opcode::PUSH1),
    Step::PushInt(20),
    Step::Op(Opcode::SUBSTR),
];

const FROM_HASH160: &[Step] = &[
    Step::Op(Opcode::DUP),
    Step::Op(Opcode::SIZE),
    Step::PushInt(20),
    Step::Op(Opcode::NUMEQUAL),
    Step::AssertMsg("invalid Hash160 length"),
    Step::Syscall(Syscall::RuntimeGetAddressVersion),
    Step::Convert(StackItemType::ByteString),
    // Versions of 0x80 and above convert with a sign byte appended.
    Step::Op(Opcode::PUSH1),
    Step::Op(Opcode::LEFT),
    Step::Op(Opcode::SWAP),
    Step::Op(Opcode::CAT),
    Step::Native(STDLIB_BASE58_CHECK_ENCODE),
];

static CATALOGUE: &[BuiltinDescriptor] = &[
    BuiltinDescriptor {
        path: UTIL_PKG,
        symbol: "FromAddress",
        kind: BuiltinKind::FoldableConversion,
        arity: Arity::Fixed(1),
        returns: true,
        emission: Emission::Steps(TO_HASH160),
    },
    BuiltinDescriptor {
        path: UTIL_PKG,
        symbol: "Abort",
        kind: BuiltinKind::Abort,
        arity: Arity::Fixed(0),
        returns: false,
        emission: Emission::Steps(&[Step::Op(Opcode::ABORT)]),
    },
    BuiltinDescriptor {
        path: UTIL_PKG,
        symbol: "Equals",
        kind: BuiltinKind::EqualsOverride,
        arity: Arity::Fixed(2),
        returns: true,
        emission: Emission::Steps(&[Step::Op(Opcode::EQUAL)]),
    },
    BuiltinDescriptor {
        path: ADDRESS_PKG,
        symbol: "ToHash160",
        kind: BuiltinKind::FoldableConversion,
        arity: Arity::Fixed(1),
        returns: true,
        emission: Emission::Steps(TO_HASH160),
    },
    BuiltinDescriptor {
        path: ADDRESS_PKG,
        symbol: "FromHash160",
        kind: BuiltinKind::PlainCall,
        arity: Arity::Fixed(1),
        returns: true,
        emission: Emission::Steps(FROM_HASH160),
    },
    BuiltinDescriptor {
        path: CONTRACT_PKG,
        symbol: "Call",
        kind: BuiltinKind::ContractCall,
        arity: Arity::Variadic(3),
        returns: true,
        emission: Emission::ContractCall,
    },
    BuiltinDescriptor {
        path: LIB_CONTRACT_PKG,
        symbol: "CallWithVersion",
        kind: BuiltinKind::PlainCall,
        arity: Arity::Variadic(4),
        returns: true,
        emission: Emission::VersionedCall,
    },
    BuiltinDescriptor {
        path: NEOGOINTERNAL_PKG,
        symbol: "CallWithToken",
        kind: BuiltinKind::TokenCall,
        arity: Arity::Variadic(3),
        returns: true,
        emission: Emission::TokenCall,
    },
    BuiltinDescriptor {
        path: NEOGOINTERNAL_PKG,
        symbol: "CallWithTokenNoRet",
        kind: BuiltinKind::TokenCall,
        arity: Arity::Variadic(3),
        returns: false,
        emission: Emission::TokenCall,
    },
    BuiltinDescriptor {
        path: RUNTIME_PKG,
        symbol: "Notify",
        kind: BuiltinKind::NotifyCall,
        arity: Arity::Variadic(1),
        returns: false,
        emission: Emission::Notify,
    },
    BuiltinDescriptor {
        path: RUNTIME_PKG,
        symbol: "GetAddressVersion",
        kind: BuiltinKind::PlainCall,
        arity: Arity::Fixed(0),
        returns: true,
        emission: Emission::Steps(&[Step::Syscall(Syscall::RuntimeGetAddressVersion)]),
    },
    BuiltinDescriptor {
        path: RUNTIME_PKG,
        symbol: "Log",
        kind: BuiltinKind::PlainCall,
        arity: Arity::Fixed(1),
        returns: false,
        emission: Emission::Steps(&[Step::Syscall(Syscall::RuntimeLog)]),
    },
];

pub fn classify(path: &str, symbol: &str) -> Option<&'static BuiltinDescriptor> {
    CATALOGUE.iter().find(|b| b.path == path && b.symbol == symbol)
}

/// Value of an interop constant such as `contract.All`.
pub fn interop_constant(path: &str, symbol: &str) -> Option<i64> {
    if path != CONTRACT_PKG {
        return None;
    }
    let flags = match symbol {
        "NoneFlag" => CallFlags::NONE,
        "ReadStates" => CallFlags::READ_STATES,
        "WriteStates" => CallFlags::WRITE_STATES,
        "AllowCall" => CallFlags::ALLOW_CALL,
        "AllowNotify" => CallFlags::ALLOW_NOTIFY,
        "States" => CallFlags::STATES,
        "ReadOnly" => CallFlags::READ_ONLY,
        "All" => CallFlags::ALL,
        _ => return None,
    };
    Some(flags.bits() as i64)
}

/// Whether `path` belongs to the interop tree, whose packages have no
/// compilable sources of their own.
pub fn is_interop_path(path: &str) -> bool {
    path == INTEROP_PREFIX
        || path
            .strip_prefix(INTEROP_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_requires_canonical_path() {
        assert!(classify(UTIL_PKG, "FromAddress").is_some());
        assert!(classify("example.com/testdata/util", "Equals").is_none());
        assert!(classify(UTIL_PKG, "Missing").is_none());
    }

    #[test]
    fn test_descriptors() {
        let b = classify(NEOGOINTERNAL_PKG, "CallWithTokenNoRet").unwrap();
        assert_eq!(b.kind, BuiltinKind::TokenCall);
        assert!(!b.returns);
        assert!(b.arity.accepts(3));
        assert!(!b.arity.accepts(2));
        assert!(classify(ADDRESS_PKG, "ToHash160").unwrap().foldable());
        assert!(!classify(ADDRESS_PKG, "FromHash160").unwrap().foldable());
        assert_eq!(b.qualified_name(), "neogointernal.CallWithTokenNoRet");
    }

    #[test]
    fn test_flag_constants() {
        assert_eq!(interop_constant(CONTRACT_PKG, "All"), Some(15));
        assert_eq!(interop_constant(CONTRACT_PKG, "ReadOnly"), Some(5));
        assert_eq!(interop_constant(UTIL_PKG, "All"), None);
    }

    #[test]
    fn test_interop_path() {
        assert!(is_interop_path(RUNTIME_PKG));
        assert!(!is_interop_path("github.com/nspcc-dev/neo-go/pkg/interopx"));
    }
}
