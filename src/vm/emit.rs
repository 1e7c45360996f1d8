//! Low-level instruction writer.

use super::interop::Syscall;
use super::ops::Opcode;
use super::value::StackItemType;

/// Appends encoded instructions to a script buffer.
#[derive(Debug, Default, Clone)]
pub struct Emitter {
    buf: Vec<u8>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset, i.e. the position of the next instruction.
    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn last_opcode_is(&self, op: Opcode) -> bool {
        self.buf.last() == Some(&(op as u8))
    }

    pub fn op(&mut self, op: Opcode) {
        self.buf.push(op as u8);
    }

    pub fn op_with(&mut self, op: Opcode, operand: &[u8]) {
        self.buf.push(op as u8);
        self.buf.extend_from_slice(operand);
    }

    pub fn push_int(&mut self, n: i64) {
        if let Some(op) = Opcode::small_int(n) {
            self.op(op);
        } else if let Ok(v) = i8::try_from(n) {
            self.op_with(Opcode::PUSHINT8, &v.to_le_bytes());
        } else if let Ok(v) = i16::try_from(n) {
            self.op_with(Opcode::PUSHINT16, &v.to_le_bytes());
        } else if let Ok(v) = i32::try_from(n) {
            self.op_with(Opcode::PUSHINT32, &v.to_le_bytes());
        } else {
            self.op_with(Opcode::PUSHINT64, &n.to_le_bytes());
        }
    }

    pub fn push_bool(&mut self, b: bool) {
        self.op(if b { Opcode::PUSHT } else { Opcode::PUSHF });
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        let len = data.len();
        if len <= u8::MAX as usize {
            self.op_with(Opcode::PUSHDATA1, &[len as u8]);
        } else if len <= u16::MAX as usize {
            self.op_with(Opcode::PUSHDATA2, &(len as u16).to_le_bytes());
        } else {
            self.op_with(Opcode::PUSHDATA4, &(len as u32).to_le_bytes());
        }
        self.buf.extend_from_slice(data);
    }

    pub fn push_string(&mut self, s: &str) {
        self.push_bytes(s.as_bytes());
    }

    pub fn syscall(&mut self, syscall: Syscall) {
        self.op_with(Opcode::SYSCALL, &syscall.id().to_le_bytes());
    }

    pub fn convert(&mut self, ty: StackItemType) {
        self.op_with(Opcode::CONVERT, &[ty as u8]);
    }

    pub fn callt(&mut self, token: u16) {
        self.op_with(Opcode::CALLT, &token.to_le_bytes());
    }

    /// `ASSERTMSG` on the value currently on top of the stack.
    pub fn assert_msg(&mut self, msg: &str) {
        self.push_string(msg);
        self.op(Opcode::ASSERTMSG);
    }

    /// Emit a long-form jump with a placeholder offset, returning its position.
    pub fn jump(&mut self, op: Opcode) -> usize {
        let at = self.offset();
        self.op_with(op, &[0, 0, 0, 0]);
        at
    }

    /// Point the long-form jump at `at` to `target`.
    pub fn patch_jump(&mut self, at: usize, target: usize) {
        let rel = (target as i64 - at as i64) as i32;
        self.buf[at + 1..at + 5].copy_from_slice(&rel.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_int_forms() {
        let mut e = Emitter::new();
        e.push_int(5);
        e.push_int(-1);
        e.push_int(100);
        e.push_int(1000);
        e.push_int(100_000);
        e.push_int(1 << 40);
        let b = e.into_bytes();
        assert_eq!(b[0], Opcode::PUSH5 as u8);
        assert_eq!(b[1], Opcode::PUSHM1 as u8);
        assert_eq!(&b[2..4], &[Opcode::PUSHINT8 as u8, 100]);
        assert_eq!(&b[4..7], &[Opcode::PUSHINT16 as u8, 0xe8, 0x03]);
        assert_eq!(b[7], Opcode::PUSHINT32 as u8);
        assert_eq!(b[12], Opcode::PUSHINT64 as u8);
    }

    #[test]
    fn test_push_bytes_verbatim() {
        let mut e = Emitter::new();
        e.push_bytes(&[0xaa; 20]);
        let b = e.into_bytes();
        assert_eq!(&b[..2], &[Opcode::PUSHDATA1 as u8, 20]);
        assert_eq!(&b[2..], &[0xaa; 20]);
    }

    #[test]
    fn test_jump_patch() {
        let mut e = Emitter::new();
        e.op(Opcode::NOP);
        let at = e.jump(Opcode::JMP_L);
        e.op(Opcode::NOP);
        let target = e.offset();
        e.patch_jump(at, target);
        assert_eq!(&e.bytes()[2..6], &5i32.to_le_bytes());
    }
}
