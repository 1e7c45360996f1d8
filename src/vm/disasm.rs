//! Human-readable listing of a contract script.

use super::instruction::{DecodeError, Instruction, decode_all};
use super::interop::Syscall;
use super::ops::Opcode;
use super::value::StackItemType;
use crate::crypto::hash::hash160_to_string;
use crate::smartcontract::MethodToken;

/// Disassembler for contract scripts.
pub struct Disassembler<'a> {
    script: &'a [u8],
    tokens: &'a [MethodToken],
    output: String,
}

impl<'a> Disassembler<'a> {
    pub fn new(script: &'a [u8], tokens: &'a [MethodToken]) -> Self {
        Self {
            script,
            tokens,
            output: String::new(),
        }
    }

    pub fn disassemble(&mut self) -> Result<&str, DecodeError> {
        if !self.tokens.is_empty() {
            self.output.push_str("== Method Tokens ==\n");
            for (i, t) in self.tokens.iter().enumerate() {
                self.output.push_str(&format!(
                    "  [{:04}] {}.{} (params: {}, return: {}, flags: {})\n",
                    i,
                    hash160_to_string(&t.hash),
                    t.method,
                    t.params_count,
                    t.has_return,
                    t.call_flags
                ));
            }
            self.output.push('\n');
        }

        self.output.push_str("== Script ==\n");
        for ins in decode_all(self.script)? {
            self.output.push_str(&format!("{:04}: ", ins.offset));
            self.disassemble_instruction(&ins);
            self.output.push('\n');
        }
        Ok(&self.output)
    }

    fn disassemble_instruction(&mut self, ins: &Instruction<'_>) {
        let mnemonic = format!("{:?}", ins.opcode);
        let text = match ins.opcode {
            Opcode::PUSHINT8 | Opcode::PUSHINT16 | Opcode::PUSHINT32 | Opcode::PUSHINT64 => {
                format!("{} {}", mnemonic, ins.operand_int())
            }
            Opcode::PUSHDATA1 | Opcode::PUSHDATA2 | Opcode::PUSHDATA4 => {
                format!("{} {}{}", mnemonic, hex::encode(ins.operand), printable(ins.operand))
            }
            Opcode::JMP
            | Opcode::JMP_L
            | Opcode::JMPIF
            | Opcode::JMPIF_L
            | Opcode::JMPIFNOT
            | Opcode::JMPIFNOT_L
            | Opcode::CALL
            | Opcode::CALL_L => match ins.jump_target() {
                Some(target) => format!("{} {:04}", mnemonic, target),
                None => format!("{} <?>", mnemonic),
            },
            Opcode::CALLT => {
                let idx = ins.operand_u16();
                let name = self
                    .tokens
                    .get(idx as usize)
                    .map(|t| t.method.as_str())
                    .unwrap_or("<?>");
                format!("{} {} ; {}", mnemonic, idx, name)
            }
            Opcode::SYSCALL => {
                let id = ins.operand_u32();
                let name = Syscall::from_id(id).map(Syscall::name).unwrap_or("<?>");
                format!("{} {:#010x} ; {}", mnemonic, id, name)
            }
            Opcode::CONVERT => match StackItemType::from_u8(ins.operand_u8()) {
                Some(ty) => format!("{} {:?}", mnemonic, ty),
                None => format!("{} {:#04x}", mnemonic, ins.operand_u8()),
            },
            Opcode::INITSLOT => format!(
                "{} {} local, {} arg",
                mnemonic,
                ins.operand[0],
                ins.operand[1]
            ),
            Opcode::INITSSLOT
            | Opcode::LDSFLD
            | Opcode::STSFLD
            | Opcode::LDLOC
            | Opcode::STLOC
            | Opcode::LDARG
            | Opcode::STARG => format!("{} {}", mnemonic, ins.operand_u8()),
            _ => mnemonic,
        };
        self.output.push_str(&text);
    }
}

/// ` ; "text"` when the data is printable ASCII.
fn printable(data: &[u8]) -> String {
    if !data.is_empty() && data.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!(" ; \"{}\"", String::from_utf8_lossy(data))
    } else {
        String::new()
    }
}

pub fn format_script(script: &[u8], tokens: &[MethodToken]) -> Result<String, DecodeError> {
    let mut d = Disassembler::new(script, tokens);
    d.disassemble().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::emit::Emitter;

    #[test]
    fn test_listing() {
        let mut e = Emitter::new();
        e.push_string("transfer");
        e.syscall(Syscall::RuntimeNotify);
        e.convert(StackItemType::ByteString);
        e.op(Opcode::RET);
        let text = format_script(e.bytes(), &[]).unwrap();
        assert!(text.contains("0000: PUSHDATA1 7472616e73666572 ; \"transfer\""));
        assert!(text.contains("SYSCALL 0x616f0195 ; System.Runtime.Notify"));
        assert!(text.contains("CONVERT ByteString"));
        assert!(text.contains("RET"));
    }
}
