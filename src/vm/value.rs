use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Stack item type tags, as used by the `CONVERT` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StackItemType {
    Any = 0x00,
    Pointer = 0x10,
    Boolean = 0x20,
    Integer = 0x21,
    ByteString = 0x28,
    Buffer = 0x30,
    Array = 0x40,
    Struct = 0x41,
    Map = 0x48,
    InteropInterface = 0x60,
}

impl StackItemType {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => StackItemType::Any,
            0x10 => StackItemType::Pointer,
            0x20 => StackItemType::Boolean,
            0x21 => StackItemType::Integer,
            0x28 => StackItemType::ByteString,
            0x30 => StackItemType::Buffer,
            0x40 => StackItemType::Array,
            0x41 => StackItemType::Struct,
            0x48 => StackItemType::Map,
            0x60 => StackItemType::InteropInterface,
            _ => return None,
        })
    }
}

/// Maximum size of a byte string interpreted as an integer or boolean.
pub const MAX_INTEGER_SIZE: usize = 32;

/// A value on the evaluation stack.
///
/// Buffers and compound items are shared by reference, like on the real VM;
/// `PartialEq` compares contents, which is what tests want.
#[derive(Clone)]
pub enum StackItem {
    Null,
    Boolean(bool),
    Integer(i64),
    ByteString(Vec<u8>),
    Buffer(Rc<RefCell<Vec<u8>>>),
    Array(Rc<RefCell<Vec<StackItem>>>),
    Struct(Rc<RefCell<Vec<StackItem>>>),
    Pointer(usize),
}

/// Failed conversion between stack item representations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid conversion from {from:?} to {to:?}")]
    InvalidCast {
        from: StackItemType,
        to: StackItemType,
    },
    #[error("value of {0} bytes does not fit an integer")]
    IntegerTooLarge(usize),
}

impl StackItem {
    pub fn buffer(bytes: Vec<u8>) -> Self {
        StackItem::Buffer(Rc::new(RefCell::new(bytes)))
    }

    pub fn array(items: Vec<StackItem>) -> Self {
        StackItem::Array(Rc::new(RefCell::new(items)))
    }

    pub fn bytes(bytes: &[u8]) -> Self {
        StackItem::ByteString(bytes.to_vec())
    }

    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Pointer(_) => StackItemType::Pointer,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// Byte representation of a primitive or buffer item.
    pub fn span(&self) -> Option<Vec<u8>> {
        match self {
            StackItem::Boolean(b) => Some(vec![*b as u8]),
            StackItem::Integer(n) => Some(int_to_bytes(*n)),
            StackItem::ByteString(b) => Some(b.clone()),
            StackItem::Buffer(b) => Some(b.borrow().clone()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Result<i64, ConvertError> {
        match self {
            StackItem::Integer(n) => Ok(*n),
            StackItem::Boolean(b) => Ok(*b as i64),
            other => {
                let bytes = other.span().ok_or(ConvertError::InvalidCast {
                    from: other.item_type(),
                    to: StackItemType::Integer,
                })?;
                bytes_to_int(&bytes)
            }
        }
    }

    pub fn as_bool(&self) -> Result<bool, ConvertError> {
        match self {
            StackItem::Null => Ok(false),
            StackItem::Boolean(b) => Ok(*b),
            StackItem::Integer(n) => Ok(*n != 0),
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Pointer(_) => Ok(true),
            other => {
                let bytes = other.span().unwrap_or_default();
                if bytes.len() > MAX_INTEGER_SIZE {
                    return Err(ConvertError::IntegerTooLarge(bytes.len()));
                }
                Ok(bytes.iter().any(|b| *b != 0))
            }
        }
    }

    /// Convert to another representation with `CONVERT` semantics.
    pub fn convert(&self, to: StackItemType) -> Result<StackItem, ConvertError> {
        let from = self.item_type();
        let invalid = ConvertError::InvalidCast { from, to };
        if from == to {
            return Ok(self.clone());
        }
        match (self, to) {
            (_, StackItemType::Any) => Err(invalid),
            (StackItem::Null, _) => Ok(StackItem::Null),
            (StackItem::Array(items), StackItemType::Struct) => {
                Ok(StackItem::Struct(Rc::new(RefCell::new(items.borrow().clone()))))
            }
            (StackItem::Struct(items), StackItemType::Array) => Ok(StackItem::array(items.borrow().clone())),
            (StackItem::Integer(n), StackItemType::Boolean) => Ok(StackItem::Boolean(*n != 0)),
            (StackItem::Boolean(b), StackItemType::Integer) => Ok(StackItem::Integer(*b as i64)),
            (item, StackItemType::Integer) => {
                let bytes = item.span().ok_or(invalid)?;
                Ok(StackItem::Integer(bytes_to_int(&bytes)?))
            }
            (item, StackItemType::Boolean) => {
                let bytes = item.span().ok_or(invalid)?;
                if bytes.len() > MAX_INTEGER_SIZE {
                    return Err(ConvertError::IntegerTooLarge(bytes.len()));
                }
                Ok(StackItem::Boolean(bytes.iter().any(|b| *b != 0)))
            }
            (item, StackItemType::ByteString) => Ok(StackItem::ByteString(item.span().ok_or(invalid)?)),
            (item, StackItemType::Buffer) => Ok(StackItem::buffer(item.span().ok_or(invalid)?)),
            _ => Err(invalid),
        }
    }

    /// Equality as performed by `EQUAL`: compound items compare by reference.
    pub fn vm_equals(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Buffer(a), StackItem::Buffer(b)) => Rc::ptr_eq(a, b),
            (StackItem::Array(a), StackItem::Array(b)) => Rc::ptr_eq(a, b),
            (StackItem::Struct(a), StackItem::Struct(b)) => Rc::ptr_eq(a, b),
            (StackItem::Buffer(_), _) | (_, StackItem::Buffer(_)) => false,
            _ => self == other,
        }
    }
}

impl PartialEq for StackItem {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StackItem::Null, StackItem::Null) => true,
            (StackItem::Boolean(a), StackItem::Boolean(b)) => a == b,
            (StackItem::Integer(a), StackItem::Integer(b)) => a == b,
            (StackItem::ByteString(a), StackItem::ByteString(b)) => a == b,
            (StackItem::Buffer(a), StackItem::Buffer(b)) => *a.borrow() == *b.borrow(),
            (StackItem::Array(a), StackItem::Array(b)) => *a.borrow() == *b.borrow(),
            (StackItem::Struct(a), StackItem::Struct(b)) => *a.borrow() == *b.borrow(),
            (StackItem::Pointer(a), StackItem::Pointer(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackItem::Null => write!(f, "Null"),
            StackItem::Boolean(b) => write!(f, "Boolean({})", b),
            StackItem::Integer(n) => write!(f, "Integer({})", n),
            StackItem::ByteString(b) => write!(f, "ByteString({})", hex::encode(b)),
            StackItem::Buffer(b) => write!(f, "Buffer({})", hex::encode(&*b.borrow())),
            StackItem::Array(items) => f.debug_tuple("Array").field(&*items.borrow()).finish(),
            StackItem::Struct(items) => f.debug_tuple("Struct").field(&*items.borrow()).finish(),
            StackItem::Pointer(p) => write!(f, "Pointer({})", p),
        }
    }
}

/// Minimal little-endian two's complement encoding; zero is empty.
pub fn int_to_bytes(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let mut bytes = n.to_le_bytes().to_vec();
    while bytes.len() > 1 {
        let last = bytes[bytes.len() - 1];
        let prev_sign = bytes[bytes.len() - 2] & 0x80;
        if (last == 0x00 && prev_sign == 0) || (last == 0xff && prev_sign != 0) {
            bytes.pop();
        } else {
            break;
        }
    }
    bytes
}

pub fn bytes_to_int(bytes: &[u8]) -> Result<i64, ConvertError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(ConvertError::IntegerTooLarge(bytes.len()));
    }
    let fill = if bytes[bytes.len() - 1] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(i64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_encoding() {
        assert_eq!(int_to_bytes(0), Vec::<u8>::new());
        assert_eq!(int_to_bytes(1), vec![1]);
        assert_eq!(int_to_bytes(-1), vec![0xff]);
        assert_eq!(int_to_bytes(128), vec![0x80, 0x00]);
        assert_eq!(int_to_bytes(-129), vec![0x7f, 0xff]);
        for n in [0, 1, -1, 127, 128, -128, -129, 255, 256, 0x35, i64::MAX, i64::MIN] {
            assert_eq!(bytes_to_int(&int_to_bytes(n)).unwrap(), n);
        }
    }

    #[test]
    fn test_integer_conversions() {
        let three = StackItem::Integer(3);
        assert_eq!(three.convert(StackItemType::Boolean).unwrap(), StackItem::Boolean(true));
        assert_eq!(
            StackItem::Integer(0).convert(StackItemType::Boolean).unwrap(),
            StackItem::Boolean(false)
        );
        assert_eq!(three.convert(StackItemType::ByteString).unwrap(), StackItem::bytes(&[3]));
        assert_eq!(
            StackItem::Integer(0).convert(StackItemType::ByteString).unwrap(),
            StackItem::bytes(&[])
        );
        assert!(three.convert(StackItemType::Array).is_err());
    }

    #[test]
    fn test_convert_is_idempotent() {
        let once = StackItem::Integer(5).convert(StackItemType::ByteString).unwrap();
        let twice = once.convert(StackItemType::ByteString).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_buffer_equality() {
        let a = StackItem::buffer(vec![1, 2]);
        let b = StackItem::buffer(vec![1, 2]);
        assert_eq!(a, b);
        assert!(!a.vm_equals(&b));
        assert!(a.vm_equals(&a.clone()));
    }
}
