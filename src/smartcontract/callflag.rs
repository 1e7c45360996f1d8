use std::fmt;
use std::ops::BitOr;

/// Permission bitmask restricting what an invoked contract context may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallFlags(u8);

impl CallFlags {
    pub const NONE: CallFlags = CallFlags(0);
    pub const READ_STATES: CallFlags = CallFlags(1);
    pub const WRITE_STATES: CallFlags = CallFlags(1 << 1);
    pub const ALLOW_CALL: CallFlags = CallFlags(1 << 2);
    pub const ALLOW_NOTIFY: CallFlags = CallFlags(1 << 3);
    pub const STATES: CallFlags = CallFlags(Self::READ_STATES.0 | Self::WRITE_STATES.0);
    pub const READ_ONLY: CallFlags = CallFlags(Self::READ_STATES.0 | Self::ALLOW_CALL.0);
    pub const ALL: CallFlags = CallFlags(Self::STATES.0 | Self::ALLOW_CALL.0 | Self::ALLOW_NOTIFY.0);

    /// Named flags, in the order they are rendered.
    pub const NAMED: [(&'static str, CallFlags); 8] = [
        ("None", Self::NONE),
        ("ReadStates", Self::READ_STATES),
        ("WriteStates", Self::WRITE_STATES),
        ("AllowCall", Self::ALLOW_CALL),
        ("AllowNotify", Self::ALLOW_NOTIFY),
        ("States", Self::STATES),
        ("ReadOnly", Self::READ_ONLY),
        ("All", Self::ALL),
    ];

    /// Accepts only values made of known bits.
    pub fn from_bits(bits: i64) -> Option<CallFlags> {
        if (0..=Self::ALL.0 as i64).contains(&bits) {
            Some(CallFlags(bits as u8))
        } else {
            None
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: CallFlags) -> CallFlags {
        CallFlags(self.0 | other.0)
    }

    pub fn intersection(self, other: CallFlags) -> CallFlags {
        CallFlags(self.0 & other.0)
    }

    pub fn difference(self, other: CallFlags) -> CallFlags {
        CallFlags(self.0 & !other.0)
    }

    pub fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CallFlags {
    type Output = CallFlags;

    fn bitor(self, rhs: CallFlags) -> CallFlags {
        self.union(rhs)
    }
}

impl fmt::Display for CallFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((name, _)) = Self::NAMED.iter().rev().find(|(_, v)| v == self) {
            return write!(f, "{}", name);
        }
        let parts: Vec<&str> = Self::NAMED[1..5]
            .iter()
            .filter(|(_, v)| self.contains(*v))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values() {
        assert_eq!(CallFlags::ALL.bits(), 15);
        assert_eq!(CallFlags::STATES.bits(), 3);
        assert_eq!(CallFlags::READ_ONLY.bits(), 5);
        assert_eq!((CallFlags::READ_STATES | CallFlags::ALLOW_CALL), CallFlags::READ_ONLY);
    }

    #[test]
    fn test_from_bits() {
        assert_eq!(CallFlags::from_bits(15), Some(CallFlags::ALL));
        assert_eq!(CallFlags::from_bits(16), None);
        assert_eq!(CallFlags::from_bits(-1), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(CallFlags::ALL.to_string(), "All");
        assert_eq!(CallFlags::NONE.to_string(), "None");
        assert_eq!((CallFlags::WRITE_STATES | CallFlags::ALLOW_NOTIFY).to_string(), "WriteStates, AllowNotify");
    }
}
