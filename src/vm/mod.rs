pub mod disasm;
pub mod emit;
pub mod engine;
pub mod instruction;
pub mod interop;
mod ops;
mod value;

pub use emit::Emitter;
pub use engine::{Engine, Notification, VmError};
pub use instruction::{DecodeError, Instruction};
pub use interop::Syscall;
pub use ops::Opcode;
pub use value::{ConvertError, StackItem, StackItemType, bytes_to_int, int_to_bytes};
