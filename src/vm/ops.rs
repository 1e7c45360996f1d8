/// Instruction opcodes of the contract VM.
///
/// Only the subset emitted by the compiler and understood by the reference
/// engine is listed. Byte values match the VM's instruction encoding.
///
/// Naming follows the VM's own mnemonics:
/// - `_L` suffix for long (4-byte offset) jump forms
/// - `PUSHINTn` carries an n-bit little-endian immediate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    // ========================================
    // Constants
    // ========================================
    PUSHINT8 = 0x00,
    PUSHINT16 = 0x01,
    PUSHINT32 = 0x02,
    PUSHINT64 = 0x03,
    PUSHT = 0x08,
    PUSHF = 0x09,
    PUSHNULL = 0x0B,
    PUSHDATA1 = 0x0C,
    PUSHDATA2 = 0x0D,
    PUSHDATA4 = 0x0E,
    PUSHM1 = 0x0F,
    PUSH0 = 0x10,
    PUSH1 = 0x11,
    PUSH2 = 0x12,
    PUSH3 = 0x13,
    PUSH4 = 0x14,
    PUSH5 = 0x15,
    PUSH6 = 0x16,
    PUSH7 = 0x17,
    PUSH8 = 0x18,
    PUSH9 = 0x19,
    PUSH10 = 0x1A,
    PUSH11 = 0x1B,
    PUSH12 = 0x1C,
    PUSH13 = 0x1D,
    PUSH14 = 0x1E,
    PUSH15 = 0x1F,
    PUSH16 = 0x20,

    // ========================================
    // Flow Control
    // ========================================
    NOP = 0x21,
    JMP = 0x22,
    JMP_L = 0x23,
    JMPIF = 0x24,
    JMPIF_L = 0x25,
    JMPIFNOT = 0x26,
    JMPIFNOT_L = 0x27,
    CALL = 0x34,
    CALL_L = 0x35,
    CALLT = 0x37, // u16 method-token index
    ABORT = 0x38,
    ASSERT = 0x39,
    THROW = 0x3A,
    RET = 0x40,
    SYSCALL = 0x41, // u32 interop id

    // ========================================
    // Stack
    // ========================================
    DROP = 0x45,
    NIP = 0x46,
    DUP = 0x4A,
    OVER = 0x4B,
    SWAP = 0x50,
    ROT = 0x51,

    // ========================================
    // Slots
    // ========================================
    INITSSLOT = 0x56,
    INITSLOT = 0x57, // (locals, args)
    LDSFLD = 0x5F,
    STSFLD = 0x67,
    LDLOC = 0x6F,
    STLOC = 0x77,
    LDARG = 0x7F,
    STARG = 0x87,

    // ========================================
    // Splice
    // ========================================
    NEWBUFFER = 0x88,
    CAT = 0x8B,
    SUBSTR = 0x8C,
    LEFT = 0x8D,

    // ========================================
    // Bitwise / Arithmetic
    // ========================================
    AND = 0x91,
    OR = 0x92,
    XOR = 0x93,
    EQUAL = 0x97,
    NOTEQUAL = 0x98,
    ADD = 0x9E,
    SUB = 0x9F,
    MUL = 0xA0,
    DIV = 0xA1,
    MOD = 0xA2,
    NOT = 0xAA,
    BOOLAND = 0xAB,
    BOOLOR = 0xAC,
    NZ = 0xB1,
    NUMEQUAL = 0xB3,
    NUMNOTEQUAL = 0xB4,
    LT = 0xB5,
    LE = 0xB6,
    GT = 0xB7,
    GE = 0xB8,

    // ========================================
    // Compound Types
    // ========================================
    PACK = 0xC0,
    NEWARRAY0 = 0xC2,
    SIZE = 0xCA,
    PICKITEM = 0xCE,
    APPEND = 0xCF,
    SETITEM = 0xD0,

    // ========================================
    // Types
    // ========================================
    ISNULL = 0xD8,
    CONVERT = 0xDB, // u8 target stack item type

    // ========================================
    // Extensions
    // ========================================
    ABORTMSG = 0xE0,
    ASSERTMSG = 0xE1,
}

impl Opcode {
    pub fn from_u8(b: u8) -> Option<Opcode> {
        use Opcode::*;
        let op = match b {
            0x00 => PUSHINT8,
            0x01 => PUSHINT16,
            0x02 => PUSHINT32,
            0x03 => PUSHINT64,
            0x08 => PUSHT,
            0x09 => PUSHF,
            0x0B => PUSHNULL,
            0x0C => PUSHDATA1,
            0x0D => PUSHDATA2,
            0x0E => PUSHDATA4,
            0x0F => PUSHM1,
            0x10 => PUSH0,
            0x11 => PUSH1,
            0x12 => PUSH2,
            0x13 => PUSH3,
            0x14 => PUSH4,
            0x15 => PUSH5,
            0x16 => PUSH6,
            0x17 => PUSH7,
            0x18 => PUSH8,
            0x19 => PUSH9,
            0x1A => PUSH10,
            0x1B => PUSH11,
            0x1C => PUSH12,
            0x1D => PUSH13,
            0x1E => PUSH14,
            0x1F => PUSH15,
            0x20 => PUSH16,
            0x21 => NOP,
            0x22 => JMP,
            0x23 => JMP_L,
            0x24 => JMPIF,
            0x25 => JMPIF_L,
            0x26 => JMPIFNOT,
            0x27 => JMPIFNOT_L,
            0x34 => CALL,
            0x35 => CALL_L,
            0x37 => CALLT,
            0x38 => ABORT,
            0x39 => ASSERT,
            0x3A => THROW,
            0x40 => RET,
            0x41 => SYSCALL,
            0x45 => DROP,
            0x46 => NIP,
            0x4A => DUP,
            0x4B => OVER,
            0x50 => SWAP,
            0x51 => ROT,
            0x56 => INITSSLOT,
            0x57 => INITSLOT,
            0x5F => LDSFLD,
            0x67 => STSFLD,
            0x6F => LDLOC,
            0x77 => STLOC,
            0x7F => LDARG,
            0x87 => STARG,
            0x88 => NEWBUFFER,
            0x8B => CAT,
            0x8C => SUBSTR,
            0x8D => LEFT,
            0x91 => AND,
            0x92 => OR,
            0x93 => XOR,
            0x97 => EQUAL,
            0x98 => NOTEQUAL,
            0x9E => ADD,
            0x9F => SUB,
            0xA0 => MUL,
            0xA1 => DIV,
            0xA2 => MOD,
            0xAA => NOT,
            0xAB => BOOLAND,
            0xAC => BOOLOR,
            0xB1 => NZ,
            0xB3 => NUMEQUAL,
            0xB4 => NUMNOTEQUAL,
            0xB5 => LT,
            0xB6 => LE,
            0xB7 => GT,
            0xB8 => GE,
            0xC0 => PACK,
            0xC2 => NEWARRAY0,
            0xCA => SIZE,
            0xCE => PICKITEM,
            0xCF => APPEND,
            0xD0 => SETITEM,
            0xD8 => ISNULL,
            0xDB => CONVERT,
            0xE0 => ABORTMSG,
            0xE1 => ASSERTMSG,
            _ => return None,
        };
        Some(op)
    }

    /// Size of the fixed operand following the opcode byte.
    ///
    /// For `PUSHDATAn` this is the size of the length prefix; the data itself
    /// follows it.
    pub fn operand_size(self) -> usize {
        use Opcode::*;
        match self {
            PUSHINT8 | JMP | JMPIF | JMPIFNOT | CALL | INITSSLOT | LDSFLD | STSFLD | LDLOC
            | STLOC | LDARG | STARG | CONVERT | PUSHDATA1 => 1,
            PUSHINT16 | CALLT | INITSLOT | PUSHDATA2 => 2,
            PUSHINT32 | JMP_L | JMPIF_L | JMPIFNOT_L | CALL_L | SYSCALL | PUSHDATA4 => 4,
            PUSHINT64 => 8,
            _ => 0,
        }
    }

    pub fn is_pushdata(self) -> bool {
        matches!(self, Opcode::PUSHDATA1 | Opcode::PUSHDATA2 | Opcode::PUSHDATA4)
    }

    /// `PUSHn` opcode for a small integer in `-1..=16`.
    pub fn small_int(n: i64) -> Option<Opcode> {
        match n {
            -1 => Some(Opcode::PUSHM1),
            0..=16 => Opcode::from_u8(Opcode::PUSH0 as u8 + n as u8),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_matches_discriminant() {
        for b in 0..=u8::MAX {
            if let Some(op) = Opcode::from_u8(b) {
                assert_eq!(op as u8, b, "{:?}", op);
            }
        }
    }

    #[test]
    fn test_small_int() {
        assert_eq!(Opcode::small_int(-1), Some(Opcode::PUSHM1));
        assert_eq!(Opcode::small_int(0), Some(Opcode::PUSH0));
        assert_eq!(Opcode::small_int(16), Some(Opcode::PUSH16));
        assert_eq!(Opcode::small_int(17), None);
    }
}
