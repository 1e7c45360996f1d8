use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::hash::{HASH160_LEN, HASH256_LEN};
use crate::smartcontract::ParamType;
use crate::vm::StackItemType;

/// Static types known to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Int,
    Bool,
    String,
    ByteSlice,
    Hash160,
    Hash256,
    PublicKey,
    Signature,
    /// `interface{}` / `any`
    Any,
    Slice(Box<Type>),
    Void,
}

impl Type {
    /// Stack item representation a value of this type has at runtime.
    ///
    /// `Any` means unknown; callers must not assume a representation.
    pub fn stack_type(&self) -> StackItemType {
        match self {
            Type::Int => StackItemType::Integer,
            Type::Bool => StackItemType::Boolean,
            Type::String | Type::Hash160 | Type::Hash256 | Type::PublicKey | Type::Signature => {
                StackItemType::ByteString
            }
            Type::ByteSlice => StackItemType::Buffer,
            Type::Slice(_) => StackItemType::Array,
            Type::Any | Type::Void => StackItemType::Any,
        }
    }

    pub fn param_type(&self) -> ParamType {
        match self {
            Type::Int => ParamType::Integer,
            Type::Bool => ParamType::Boolean,
            Type::String => ParamType::String,
            Type::ByteSlice => ParamType::ByteArray,
            Type::Hash160 => ParamType::Hash160,
            Type::Hash256 => ParamType::Hash256,
            Type::PublicKey => ParamType::PublicKey,
            Type::Signature => ParamType::Signature,
            Type::Any => ParamType::Any,
            Type::Slice(_) => ParamType::Array,
            Type::Void => ParamType::Void,
        }
    }

    /// Types whose values are byte sequences.
    pub fn is_byte_like(&self) -> bool {
        matches!(
            self,
            Type::String | Type::ByteSlice | Type::Hash160 | Type::Hash256 | Type::PublicKey | Type::Signature
        )
    }

    /// Required length of fixed-width interop types.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Type::Hash160 => Some(HASH160_LEN),
            Type::Hash256 => Some(HASH256_LEN),
            _ => None,
        }
    }

    /// Whether values of both types may be compared with `==`.
    pub fn comparable_with(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Any, _) | (_, Type::Any) => true,
            (a, b) if a.is_byte_like() && b.is_byte_like() => true,
            (Type::Slice(_), Type::Slice(_)) => true,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::ByteSlice => write!(f, "[]byte"),
            Type::Hash160 => write!(f, "interop.Hash160"),
            Type::Hash256 => write!(f, "interop.Hash256"),
            Type::PublicKey => write!(f, "interop.PublicKey"),
            Type::Signature => write!(f, "interop.Signature"),
            Type::Any => write!(f, "any"),
            Type::Slice(elem) => write!(f, "[]{}", elem),
            Type::Void => write!(f, "void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_types() {
        assert_eq!(Type::Hash160.stack_type(), StackItemType::ByteString);
        assert_eq!(Type::ByteSlice.stack_type(), StackItemType::Buffer);
        assert_eq!(Type::Slice(Box::new(Type::Int)).stack_type(), StackItemType::Array);
    }

    #[test]
    fn test_comparable() {
        assert!(Type::Int.comparable_with(&Type::Int));
        assert!(Type::String.comparable_with(&Type::ByteSlice));
        assert!(!Type::Int.comparable_with(&Type::String));
        assert!(!Type::Bool.comparable_with(&Type::Int));
        assert!(Type::Any.comparable_with(&Type::Bool));
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::Slice(Box::new(Type::ByteSlice)).to_string(), "[][]byte");
    }
}
