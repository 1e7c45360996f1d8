use super::ops::Opcode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode {byte:#04x} at {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },
    #[error("truncated instruction at {0}")]
    Truncated(usize),
}

/// A decoded instruction borrowing its operand from the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub offset: usize,
    pub opcode: Opcode,
    pub operand: &'a [u8],
    /// Total encoded size including the opcode byte.
    pub size: usize,
}

impl<'a> Instruction<'a> {
    /// Decode the instruction starting at `offset`.
    pub fn decode(script: &'a [u8], offset: usize) -> Result<Self, DecodeError> {
        let byte = *script.get(offset).ok_or(DecodeError::Truncated(offset))?;
        let opcode = Opcode::from_u8(byte).ok_or(DecodeError::UnknownOpcode { offset, byte })?;
        let prefix = opcode.operand_size();
        let start = offset + 1;
        let fixed = script
            .get(start..start + prefix)
            .ok_or(DecodeError::Truncated(offset))?;

        let (operand_start, operand_len) = if opcode.is_pushdata() {
            let mut len = [0u8; 4];
            len[..prefix].copy_from_slice(fixed);
            (start + prefix, u32::from_le_bytes(len) as usize)
        } else {
            (start, prefix)
        };
        let operand = script
            .get(operand_start..operand_start + operand_len)
            .ok_or(DecodeError::Truncated(offset))?;

        Ok(Instruction {
            offset,
            opcode,
            operand,
            size: operand_start + operand_len - offset,
        })
    }

    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }

    pub fn operand_u8(&self) -> u8 {
        self.operand.first().copied().unwrap_or_default()
    }

    pub fn operand_u16(&self) -> u16 {
        match self.operand {
            [a, b, ..] => u16::from_le_bytes([*a, *b]),
            _ => 0,
        }
    }

    pub fn operand_u32(&self) -> u32 {
        match self.operand {
            [a, b, c, d, ..] => u32::from_le_bytes([*a, *b, *c, *d]),
            _ => 0,
        }
    }

    /// Signed integer immediate of `PUSHINTn`.
    pub fn operand_int(&self) -> i64 {
        match *self.operand {
            [a] => a as i8 as i64,
            [a, b] => i16::from_le_bytes([a, b]) as i64,
            [a, b, c, d] => i32::from_le_bytes([a, b, c, d]) as i64,
            [a, b, c, d, e, f, g, h] => i64::from_le_bytes([a, b, c, d, e, f, g, h]),
            _ => 0,
        }
    }

    /// Absolute target of a jump or call.
    pub fn jump_target(&self) -> Option<usize> {
        let rel = match self.opcode {
            Opcode::JMP | Opcode::JMPIF | Opcode::JMPIFNOT | Opcode::CALL => {
                self.operand_u8() as i8 as i64
            }
            Opcode::JMP_L | Opcode::JMPIF_L | Opcode::JMPIFNOT_L | Opcode::CALL_L => {
                self.operand_u32() as i32 as i64
            }
            _ => return None,
        };
        usize::try_from(self.offset as i64 + rel).ok()
    }
}

/// Iterate over all instructions of a script.
pub fn decode_all(script: &[u8]) -> Result<Vec<Instruction<'_>>, DecodeError> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < script.len() {
        let ins = Instruction::decode(script, offset)?;
        offset = ins.next_offset();
        out.push(ins);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pushdata() {
        let script = [Opcode::PUSHDATA1 as u8, 2, 0xaa, 0xbb, Opcode::RET as u8];
        let all = decode_all(&script).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].operand, &[0xaa, 0xbb]);
        assert_eq!(all[1].offset, 4);
    }

    #[test]
    fn test_decode_truncated() {
        let script = [Opcode::PUSHDATA1 as u8, 5, 0xaa];
        assert_eq!(decode_all(&script), Err(DecodeError::Truncated(0)));
    }

    #[test]
    fn test_jump_target_backwards() {
        let script = [Opcode::NOP as u8, Opcode::JMP as u8, (-1i8) as u8];
        let ins = Instruction::decode(&script, 1).unwrap();
        assert_eq!(ins.jump_target(), Some(0));
    }
}
