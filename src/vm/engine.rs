//! Reference executor for compiled contracts.
//!
//! Runs the instruction subset the compiler emits against an in-memory
//! contract registry. Each invocation gets its own evaluation stack; `CALL_L`
//! frames within one invocation share it. Arguments are passed in push
//! order: the last argument is on top when the callee starts, and `INITSLOT`
//! assigns them back to declaration order.

use std::collections::HashMap;
use std::rc::Rc;

use super::instruction::{DecodeError, Instruction};
use super::interop::Syscall;
use super::ops::Opcode;
use super::value::{ConvertError, StackItem, StackItemType};
use crate::crypto::hash::{HASH160_LEN, hash160, hash160_to_string};
use crate::encoding::base58;
use crate::smartcontract::manifest::{INITIALIZE_METHOD, Method};
use crate::smartcontract::native::{
    BASE58_CHECK_DECODE, BASE58_CHECK_ENCODE, GET_CONTRACT, MANAGEMENT_HASH, STDLIB_HASH,
};
use crate::smartcontract::{CallFlags, Manifest, Nef, ParamType};

pub const MAX_INVOCATION_DEPTH: usize = 64;
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;
pub const MAX_EVENT_NAME_LENGTH: usize = 32;

pub type Hash160 = [u8; HASH160_LEN];

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("ABORT is executed")]
    Abort,
    #[error("ABORTMSG is executed: {0}")]
    AbortMsg(String),
    #[error("ASSERT is executed with false result")]
    AssertFailed,
    #[error("ASSERTMSG is executed with false result: {0}")]
    AssertMsg(String),
    #[error("unhandled exception: {0}")]
    Throw(String),
    #[error("stack underflow")]
    StackUnderflow,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("unknown syscall {0:#010x}")]
    UnknownSyscall(u32),
    #[error("missing call flags: required {required}, have {actual}")]
    MissingFlags {
        required: CallFlags,
        actual: CallFlags,
    },
    #[error("invalid call flags: {0}")]
    InvalidCallFlags(i64),
    #[error("called contract {0} not found")]
    ContractNotFound(String),
    #[error("contract {0} already exists")]
    ContractExists(String),
    #[error("method {method}/{argc} not found in {contract}")]
    MethodNotFound {
        contract: String,
        method: String,
        argc: usize,
    },
    #[error("cannot call method {method} of contract {contract}")]
    PermissionDenied { contract: String, method: String },
    #[error("native call failed: {0}")]
    Native(String),
    #[error("invocation depth exceeded")]
    DepthExceeded,
    #[error("step limit exceeded")]
    StepLimit,
    #[error("{0}")]
    Fault(String),
}

fn fault(msg: impl Into<String>) -> VmError {
    VmError::Fault(msg.into())
}

/// A deployed contract.
#[derive(Debug, Clone)]
pub struct Contract {
    pub id: i32,
    pub update_counter: u16,
    pub hash: Hash160,
    pub nef: Nef,
    pub manifest: Manifest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub script_hash: Hash160,
    pub name: String,
    pub state: Vec<StackItem>,
}

/// How the callee's return value reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    /// `System.Contract.Call`: always exactly one value, `Null` for void.
    Dynamic,
    /// `CALLT`: the token decides whether a value is pushed.
    Token { has_return: bool },
}

#[derive(Debug)]
struct Frame {
    pc: usize,
    locals: Vec<StackItem>,
    args: Vec<StackItem>,
}

impl Frame {
    fn at(pc: usize) -> Self {
        Self {
            pc,
            locals: Vec::new(),
            args: Vec::new(),
        }
    }
}

/// Execution state of one contract invocation.
struct Context {
    contract: Rc<Contract>,
    flags: CallFlags,
    stack: Vec<StackItem>,
    statics: Option<Vec<StackItem>>,
    frames: Vec<Frame>,
}

impl Context {
    fn frame(&mut self) -> Result<&mut Frame, VmError> {
        self.frames.last_mut().ok_or_else(|| fault("no active frame"))
    }

    fn push(&mut self, item: StackItem) {
        self.stack.push(item);
    }

    fn pop(&mut self) -> Result<StackItem, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn pop_int(&mut self) -> Result<i64, VmError> {
        Ok(self.pop()?.as_int()?)
    }

    fn pop_bool(&mut self) -> Result<bool, VmError> {
        Ok(self.pop()?.as_bool()?)
    }

    fn pop_bytes(&mut self) -> Result<Vec<u8>, VmError> {
        let item = self.pop()?;
        item.span()
            .ok_or_else(|| fault(format!("expected a primitive item, got {:?}", item.item_type())))
    }

    fn pop_string(&mut self) -> Result<String, VmError> {
        String::from_utf8(self.pop_bytes()?).map_err(|_| fault("invalid UTF-8 string"))
    }

    fn pop_items(&mut self) -> Result<Vec<StackItem>, VmError> {
        match self.pop()? {
            StackItem::Array(items) | StackItem::Struct(items) => Ok(items.borrow().clone()),
            other => Err(fault(format!("expected an array, got {:?}", other.item_type()))),
        }
    }

    /// Pop `n` items and return them in push order.
    fn pop_n(&mut self, n: usize) -> Result<Vec<StackItem>, VmError> {
        if self.stack.len() < n {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn peek(&self, depth: usize) -> Result<&StackItem, VmError> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.stack.get(i))
            .ok_or(VmError::StackUnderflow)
    }

    fn jump(&mut self, ins: &Instruction<'_>) -> Result<(), VmError> {
        let target = ins
            .jump_target()
            .ok_or_else(|| fault(format!("invalid jump at {}", ins.offset)))?;
        self.frame()?.pc = target;
        Ok(())
    }
}

/// The reference engine and its contract registry.
pub struct Engine {
    contracts: HashMap<Hash160, Rc<Contract>>,
    next_id: i32,
    address_version: u8,
    max_steps: usize,
    steps: usize,
    depth: usize,
    notifications: Vec<Notification>,
    logs: Vec<String>,
}

impl Engine {
    pub fn new(address_version: u8) -> Self {
        Self {
            contracts: HashMap::new(),
            next_id: 1,
            address_version,
            max_steps: DEFAULT_MAX_STEPS,
            steps: 0,
            depth: 0,
            notifications: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps;
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn contract(&self, hash: &Hash160) -> Option<&Contract> {
        self.contracts.get(hash).map(|c| c.as_ref())
    }

    /// Register a contract under the script hash of its script.
    pub fn deploy(&mut self, nef: Nef, manifest: Manifest) -> Result<Hash160, VmError> {
        let hash = hash160(&nef.script);
        if self.contracts.contains_key(&hash) {
            return Err(VmError::ContractExists(hash160_to_string(&hash)));
        }
        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(contract = %hash160_to_string(&hash), id, name = %manifest.name, "deploy");
        self.contracts.insert(
            hash,
            Rc::new(Contract {
                id,
                update_counter: 0,
                hash,
                nef,
                manifest,
            }),
        );
        Ok(hash)
    }

    /// Replace the code of a deployed contract, keeping its hash.
    pub fn update(&mut self, hash: &Hash160, nef: Nef, manifest: Manifest) -> Result<(), VmError> {
        let old = self
            .contracts
            .get(hash)
            .ok_or_else(|| VmError::ContractNotFound(hash160_to_string(hash)))?;
        let updated = Contract {
            id: old.id,
            update_counter: old.update_counter + 1,
            hash: *hash,
            nef,
            manifest,
        };
        self.contracts.insert(*hash, Rc::new(updated));
        Ok(())
    }

    /// Invoke a method with all call flags, as an external transaction would.
    pub fn call(&mut self, hash: &Hash160, method: &str, args: Vec<StackItem>) -> Result<StackItem, VmError> {
        self.steps = 0;
        let result = self.call_internal(None, CallFlags::ALL, hash, method, CallFlags::ALL, args, CallKind::Dynamic)?;
        Ok(result.unwrap_or(StackItem::Null))
    }

    #[allow(clippy::too_many_arguments)]
    fn call_internal(
        &mut self,
        caller: Option<&Contract>,
        caller_flags: CallFlags,
        hash: &Hash160,
        method: &str,
        requested: CallFlags,
        args: Vec<StackItem>,
        kind: CallKind,
    ) -> Result<Option<StackItem>, VmError> {
        if self.depth >= MAX_INVOCATION_DEPTH {
            return Err(VmError::DepthExceeded);
        }
        if method.starts_with('_') {
            return Err(fault(format!("method name cannot start with underscore: {}", method)));
        }
        let flags = requested.intersection(caller_flags);
        tracing::debug!(
            contract = %hash160_to_string(hash),
            method,
            argc = args.len(),
            flags = %flags,
            "contract call"
        );

        if *hash == STDLIB_HASH || *hash == MANAGEMENT_HASH {
            let result = self.call_native(hash, method, flags, &args)?;
            return match kind {
                CallKind::Token { has_return: false } => Ok(None),
                _ => Ok(Some(result)),
            };
        }

        let contract = self
            .contracts
            .get(hash)
            .cloned()
            .ok_or_else(|| VmError::ContractNotFound(hash160_to_string(hash)))?;
        let md = contract
            .manifest
            .abi
            .method(method, Some(args.len()))
            .cloned()
            .ok_or_else(|| VmError::MethodNotFound {
                contract: hash160_to_string(hash),
                method: method.to_string(),
                argc: args.len(),
            })?;

        let mut flags = flags;
        if md.safe {
            flags = flags.difference(CallFlags::WRITE_STATES | CallFlags::ALLOW_NOTIFY);
        } else if let Some(caller) = caller
            && !caller.manifest.can_call(hash, method)
        {
            return Err(VmError::PermissionDenied {
                contract: hash160_to_string(hash),
                method: method.to_string(),
            });
        }

        self.depth += 1;
        let result = self.invoke(contract, &md, flags, args);
        self.depth -= 1;
        let result = result?;

        Ok(match kind {
            CallKind::Dynamic | CallKind::Token { has_return: true } => Some(result.unwrap_or(StackItem::Null)),
            CallKind::Token { has_return: false } => None,
        })
    }

    fn invoke(
        &mut self,
        contract: Rc<Contract>,
        md: &Method,
        flags: CallFlags,
        args: Vec<StackItem>,
    ) -> Result<Option<StackItem>, VmError> {
        let init = contract.manifest.abi.method(INITIALIZE_METHOD, Some(0)).map(|m| m.offset);
        let mut ctx = Context {
            contract,
            flags,
            stack: Vec::new(),
            statics: None,
            frames: Vec::new(),
        };

        if let Some(offset) = init {
            ctx.frames.push(Frame::at(offset));
            self.execute(&mut ctx)?;
            ctx.stack.clear();
        }

        ctx.stack.extend(args);
        ctx.frames.push(Frame::at(md.offset));
        self.execute(&mut ctx)?;

        if md.return_type == ParamType::Void {
            if !ctx.stack.is_empty() {
                return Err(fault(format!("void method {} left {} items", md.name, ctx.stack.len())));
            }
            return Ok(None);
        }
        if ctx.stack.len() != 1 {
            return Err(fault(format!(
                "method {} must return exactly one item, got {}",
                md.name,
                ctx.stack.len()
            )));
        }
        Ok(ctx.stack.pop())
    }

    fn call_native(
        &mut self,
        hash: &Hash160,
        method: &str,
        flags: CallFlags,
        args: &[StackItem],
    ) -> Result<StackItem, VmError> {
        let not_found = || VmError::MethodNotFound {
            contract: hash160_to_string(hash),
            method: method.to_string(),
            argc: args.len(),
        };
        let arg_bytes = |item: &StackItem| {
            item.span()
                .ok_or_else(|| VmError::Native(format!("{}: expected bytes", method)))
        };

        match (*hash == STDLIB_HASH, method, args) {
            (true, BASE58_CHECK_ENCODE, [data]) => {
                let encoded = base58::check_encode(&arg_bytes(data)?);
                Ok(StackItem::ByteString(encoded.into_bytes()))
            }
            (true, BASE58_CHECK_DECODE, [s]) => {
                let s = String::from_utf8(arg_bytes(s)?)
                    .map_err(|_| VmError::Native("invalid UTF-8 string".to_string()))?;
                let decoded = base58::check_decode(&s).map_err(|e| VmError::Native(e.to_string()))?;
                Ok(StackItem::ByteString(decoded))
            }
            (false, GET_CONTRACT, [h]) => {
                if !flags.contains(CallFlags::READ_STATES) {
                    return Err(VmError::MissingFlags {
                        required: CallFlags::READ_STATES,
                        actual: flags,
                    });
                }
                let h: Hash160 = arg_bytes(h)?
                    .try_into()
                    .map_err(|_| VmError::Native("invalid script hash length".to_string()))?;
                Ok(match self.contracts.get(&h) {
                    Some(c) => StackItem::array(vec![
                        StackItem::Integer(c.id as i64),
                        StackItem::Integer(c.update_counter as i64),
                        StackItem::bytes(&c.hash),
                    ]),
                    None => StackItem::Null,
                })
            }
            _ => Err(not_found()),
        }
    }

    fn execute(&mut self, ctx: &mut Context) -> Result<(), VmError> {
        let contract = Rc::clone(&ctx.contract);
        let script = &contract.nef.script;

        while let Some(frame) = ctx.frames.last_mut() {
            self.steps += 1;
            if self.steps > self.max_steps {
                return Err(VmError::StepLimit);
            }
            if frame.pc >= script.len() {
                ctx.frames.pop();
                continue;
            }
            let ins = Instruction::decode(script, frame.pc)?;
            frame.pc = ins.next_offset();
            tracing::trace!(offset = ins.offset, op = ?ins.opcode, depth = ctx.stack.len(), "step");
            self.execute_instruction(ctx, &ins)?;
        }
        Ok(())
    }

    fn execute_instruction(&mut self, ctx: &mut Context, ins: &Instruction<'_>) -> Result<(), VmError> {
        use Opcode::*;
        match ins.opcode {
            PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 => ctx.push(StackItem::Integer(ins.operand_int())),
            PUSHT => ctx.push(StackItem::Boolean(true)),
            PUSHF => ctx.push(StackItem::Boolean(false)),
            PUSHNULL => ctx.push(StackItem::Null),
            PUSHDATA1 | PUSHDATA2 | PUSHDATA4 => ctx.push(StackItem::bytes(ins.operand)),
            PUSHM1 => ctx.push(StackItem::Integer(-1)),
            PUSH0 | PUSH1 | PUSH2 | PUSH3 | PUSH4 | PUSH5 | PUSH6 | PUSH7 | PUSH8 | PUSH9 | PUSH10
            | PUSH11 | PUSH12 | PUSH13 | PUSH14 | PUSH15 | PUSH16 => {
                ctx.push(StackItem::Integer(ins.opcode as i64 - PUSH0 as i64))
            }

            NOP => {}
            JMP | JMP_L => ctx.jump(ins)?,
            JMPIF | JMPIF_L => {
                if ctx.pop_bool()? {
                    ctx.jump(ins)?;
                }
            }
            JMPIFNOT | JMPIFNOT_L => {
                if !ctx.pop_bool()? {
                    ctx.jump(ins)?;
                }
            }
            CALL | CALL_L => {
                let target = ins
                    .jump_target()
                    .ok_or_else(|| fault(format!("invalid call at {}", ins.offset)))?;
                ctx.frames.push(Frame::at(target));
            }
            CALLT => self.call_token(ctx, ins.operand_u16())?,
            ABORT => return Err(VmError::Abort),
            ABORTMSG => return Err(VmError::AbortMsg(ctx.pop_string()?)),
            ASSERT => {
                if !ctx.pop_bool()? {
                    return Err(VmError::AssertFailed);
                }
            }
            ASSERTMSG => {
                let msg = ctx.pop_string()?;
                if !ctx.pop_bool()? {
                    return Err(VmError::AssertMsg(msg));
                }
            }
            THROW => {
                let item = ctx.pop()?;
                let msg = item
                    .span()
                    .map(|b| String::from_utf8_lossy(&b).into_owned())
                    .unwrap_or_else(|| format!("{:?}", item));
                return Err(VmError::Throw(msg));
            }
            RET => {
                ctx.frames.pop();
            }
            SYSCALL => self.syscall(ctx, ins.operand_u32())?,

            DROP => {
                ctx.pop()?;
            }
            NIP => {
                let top = ctx.pop()?;
                ctx.pop()?;
                ctx.push(top);
            }
            DUP => {
                let item = ctx.peek(0)?.clone();
                ctx.push(item);
            }
            OVER => {
                let item = ctx.peek(1)?.clone();
                ctx.push(item);
            }
            SWAP => {
                let a = ctx.pop()?;
                let b = ctx.pop()?;
                ctx.push(a);
                ctx.push(b);
            }
            ROT => {
                ctx.peek(2)?;
                let item = ctx.stack.remove(ctx.stack.len() - 3);
                ctx.push(item);
            }

            INITSSLOT => {
                if ctx.statics.is_some() {
                    return Err(fault("static slot already initialized"));
                }
                ctx.statics = Some(vec![StackItem::Null; ins.operand_u8() as usize]);
            }
            INITSLOT => {
                let locals = ins.operand[0] as usize;
                let argc = ins.operand[1] as usize;
                let args = ctx.pop_n(argc)?;
                let frame = ctx.frame()?;
                frame.locals = vec![StackItem::Null; locals];
                frame.args = args;
            }
            LDSFLD => {
                let idx = ins.operand_u8() as usize;
                let item = ctx
                    .statics
                    .as_ref()
                    .and_then(|s| s.get(idx))
                    .cloned()
                    .ok_or_else(|| fault(format!("static slot {} not initialized", idx)))?;
                ctx.push(item);
            }
            STSFLD => {
                let idx = ins.operand_u8() as usize;
                let item = ctx.pop()?;
                let slot = ctx
                    .statics
                    .as_mut()
                    .and_then(|s| s.get_mut(idx))
                    .ok_or_else(|| fault(format!("static slot {} not initialized", idx)))?;
                *slot = item;
            }
            LDLOC | LDARG => {
                let idx = ins.operand_u8() as usize;
                let frame = ctx.frame()?;
                let slots = if ins.opcode == LDLOC { &frame.locals } else { &frame.args };
                let item = slots
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| fault(format!("slot {} not initialized", idx)))?;
                ctx.push(item);
            }
            STLOC | STARG => {
                let idx = ins.operand_u8() as usize;
                let item = ctx.pop()?;
                let is_local = ins.opcode == STLOC;
                let frame = ctx.frame()?;
                let slots = if is_local { &mut frame.locals } else { &mut frame.args };
                let slot = slots
                    .get_mut(idx)
                    .ok_or_else(|| fault(format!("slot {} not initialized", idx)))?;
                *slot = item;
            }

            NEWBUFFER => {
                let n = ctx.pop_int()?;
                let n = usize::try_from(n).map_err(|_| fault(format!("invalid buffer size {}", n)))?;
                ctx.push(StackItem::buffer(vec![0; n]));
            }
            CAT => {
                let b = ctx.pop_bytes()?;
                let mut a = ctx.pop_bytes()?;
                a.extend_from_slice(&b);
                ctx.push(StackItem::buffer(a));
            }
            SUBSTR => {
                let count = ctx.pop_int()?;
                let index = ctx.pop_int()?;
                let data = ctx.pop_bytes()?;
                let range = checked_range(index, count, data.len())?;
                ctx.push(StackItem::buffer(data[range].to_vec()));
            }
            LEFT => {
                let count = ctx.pop_int()?;
                let data = ctx.pop_bytes()?;
                let range = checked_range(0, count, data.len())?;
                ctx.push(StackItem::buffer(data[range].to_vec()));
            }

            AND | OR | XOR | ADD | SUB | MUL | DIV | MOD => {
                let b = ctx.pop_int()?;
                let a = ctx.pop_int()?;
                ctx.push(StackItem::Integer(arith(ins.opcode, a, b)?));
            }
            EQUAL | NOTEQUAL => {
                let b = ctx.pop()?;
                let a = ctx.pop()?;
                let eq = a.vm_equals(&b);
                ctx.push(StackItem::Boolean(if ins.opcode == EQUAL { eq } else { !eq }));
            }
            NOT => {
                let b = ctx.pop_bool()?;
                ctx.push(StackItem::Boolean(!b));
            }
            BOOLAND | BOOLOR => {
                let b = ctx.pop_bool()?;
                let a = ctx.pop_bool()?;
                ctx.push(StackItem::Boolean(if ins.opcode == BOOLAND { a && b } else { a || b }));
            }
            NZ => {
                let n = ctx.pop_int()?;
                ctx.push(StackItem::Boolean(n != 0));
            }
            NUMEQUAL | NUMNOTEQUAL | LT | LE | GT | GE => {
                let b = ctx.pop_int()?;
                let a = ctx.pop_int()?;
                let r = match ins.opcode {
                    NUMEQUAL => a == b,
                    NUMNOTEQUAL => a != b,
                    LT => a < b,
                    LE => a <= b,
                    GT => a > b,
                    _ => a >= b,
                };
                ctx.push(StackItem::Boolean(r));
            }

            PACK => {
                let n = ctx.pop_int()?;
                let n = usize::try_from(n).map_err(|_| fault(format!("invalid PACK size {}", n)))?;
                let mut items = ctx.pop_n(n)?;
                items.reverse();
                ctx.push(StackItem::array(items));
            }
            NEWARRAY0 => ctx.push(StackItem::array(Vec::new())),
            SIZE => {
                let size = match ctx.pop()? {
                    StackItem::Array(items) | StackItem::Struct(items) => items.borrow().len(),
                    other => other
                        .span()
                        .ok_or_else(|| fault(format!("SIZE of {:?}", other.item_type())))?
                        .len(),
                };
                ctx.push(StackItem::Integer(size as i64));
            }
            PICKITEM => {
                let key = ctx.pop_int()?;
                let container = ctx.pop()?;
                let idx = usize::try_from(key).map_err(|_| fault(format!("index {} out of range", key)))?;
                let item = match &container {
                    StackItem::Array(items) | StackItem::Struct(items) => items.borrow().get(idx).cloned(),
                    other => other
                        .span()
                        .and_then(|b| b.get(idx).map(|byte| StackItem::Integer(*byte as i64))),
                };
                ctx.push(item.ok_or_else(|| fault(format!("index {} out of range", key)))?);
            }
            APPEND => {
                let item = ctx.pop()?;
                match ctx.pop()? {
                    StackItem::Array(items) | StackItem::Struct(items) => items.borrow_mut().push(item),
                    other => return Err(fault(format!("APPEND to {:?}", other.item_type()))),
                }
            }
            SETITEM => {
                let value = ctx.pop()?;
                let key = ctx.pop_int()?;
                let container = ctx.pop()?;
                let idx = usize::try_from(key).map_err(|_| fault(format!("index {} out of range", key)))?;
                match container {
                    StackItem::Array(items) | StackItem::Struct(items) => {
                        let mut items = items.borrow_mut();
                        let slot = items
                            .get_mut(idx)
                            .ok_or_else(|| fault(format!("index {} out of range", key)))?;
                        *slot = value;
                    }
                    StackItem::Buffer(bytes) => {
                        let n = value.as_int()?;
                        let byte = if (-128..=255).contains(&n) {
                            n as u8
                        } else {
                            return Err(fault(format!("value {} does not fit a byte", n)));
                        };
                        let mut bytes = bytes.borrow_mut();
                        let slot = bytes
                            .get_mut(idx)
                            .ok_or_else(|| fault(format!("index {} out of range", key)))?;
                        *slot = byte;
                    }
                    other => return Err(fault(format!("SETITEM on {:?}", other.item_type()))),
                }
            }

            ISNULL => {
                let item = ctx.pop()?;
                ctx.push(StackItem::Boolean(item.is_null()));
            }
            CONVERT => {
                let ty = StackItemType::from_u8(ins.operand_u8())
                    .ok_or_else(|| fault(format!("invalid stack item type {:#04x}", ins.operand_u8())))?;
                let item = ctx.pop()?;
                ctx.push(item.convert(ty)?);
            }
        }
        Ok(())
    }

    fn call_token(&mut self, ctx: &mut Context, idx: u16) -> Result<(), VmError> {
        let required = CallFlags::READ_STATES | CallFlags::ALLOW_CALL;
        if !ctx.flags.contains(required) {
            return Err(VmError::MissingFlags {
                required,
                actual: ctx.flags,
            });
        }
        let contract = Rc::clone(&ctx.contract);
        let token = contract
            .nef
            .tokens
            .get(idx as usize)
            .ok_or_else(|| fault(format!("method token {} not found", idx)))?;
        let args = ctx.pop_n(token.params_count as usize)?;
        let result = self.call_internal(
            Some(&contract),
            ctx.flags,
            &token.hash,
            &token.method,
            token.call_flags,
            args,
            CallKind::Token {
                has_return: token.has_return,
            },
        )?;
        if let Some(item) = result {
            ctx.push(item);
        }
        Ok(())
    }

    fn syscall(&mut self, ctx: &mut Context, id: u32) -> Result<(), VmError> {
        let syscall = Syscall::from_id(id).ok_or(VmError::UnknownSyscall(id))?;
        let required = syscall.required_flags();
        if !ctx.flags.contains(required) {
            return Err(VmError::MissingFlags {
                required,
                actual: ctx.flags,
            });
        }

        match syscall {
            Syscall::ContractCall => {
                let hash: Hash160 = ctx
                    .pop_bytes()?
                    .try_into()
                    .map_err(|_| fault("invalid script hash length"))?;
                let method = ctx.pop_string()?;
                let bits = ctx.pop_int()?;
                let flags = CallFlags::from_bits(bits).ok_or(VmError::InvalidCallFlags(bits))?;
                let args = ctx.pop_items()?;
                let contract = Rc::clone(&ctx.contract);
                let result = self.call_internal(
                    Some(&contract),
                    ctx.flags,
                    &hash,
                    &method,
                    flags,
                    args,
                    CallKind::Dynamic,
                )?;
                if let Some(item) = result {
                    ctx.push(item);
                }
            }
            Syscall::RuntimeNotify => {
                let name = ctx.pop_string()?;
                if name.len() > MAX_EVENT_NAME_LENGTH {
                    return Err(fault(format!("event name too long: {}", name)));
                }
                let state: Vec<StackItem> = ctx.pop_items()?.iter().map(immutable_copy).collect();
                tracing::info!(contract = %hash160_to_string(&ctx.contract.hash), event = %name, "notification");
                self.notifications.push(Notification {
                    script_hash: ctx.contract.hash,
                    name,
                    state,
                });
            }
            Syscall::RuntimeGetAddressVersion => {
                ctx.push(StackItem::Integer(self.address_version as i64));
            }
            Syscall::RuntimeLog => {
                let msg = ctx.pop_string()?;
                tracing::info!(contract = %hash160_to_string(&ctx.contract.hash), "log: {}", msg);
                self.logs.push(msg);
            }
        }
        Ok(())
    }
}

/// Deep copy used for notification state; buffers become byte strings.
fn immutable_copy(item: &StackItem) -> StackItem {
    match item {
        StackItem::Buffer(b) => StackItem::ByteString(b.borrow().clone()),
        StackItem::Array(items) => StackItem::array(items.borrow().iter().map(immutable_copy).collect()),
        StackItem::Struct(items) => StackItem::Struct(Rc::new(std::cell::RefCell::new(
            items.borrow().iter().map(immutable_copy).collect(),
        ))),
        other => other.clone(),
    }
}

fn checked_range(index: i64, count: i64, len: usize) -> Result<std::ops::Range<usize>, VmError> {
    let start = usize::try_from(index).map_err(|_| fault("negative index"))?;
    let count = usize::try_from(count).map_err(|_| fault("negative count"))?;
    let end = start
        .checked_add(count)
        .filter(|end| *end <= len)
        .ok_or_else(|| fault("range out of bounds"))?;
    Ok(start..end)
}

fn arith(op: Opcode, a: i64, b: i64) -> Result<i64, VmError> {
    let r = match op {
        Opcode::AND => Some(a & b),
        Opcode::OR => Some(a | b),
        Opcode::XOR => Some(a ^ b),
        Opcode::ADD => a.checked_add(b),
        Opcode::SUB => a.checked_sub(b),
        Opcode::MUL => a.checked_mul(b),
        Opcode::DIV | Opcode::MOD if b == 0 => return Err(fault("division by zero")),
        Opcode::DIV => a.checked_div(b),
        Opcode::MOD => a.checked_rem(b),
        _ => return Err(fault(format!("not an arithmetic opcode: {:?}", op))),
    };
    r.ok_or_else(|| fault("integer overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smartcontract::Permission;
    use crate::smartcontract::manifest::Parameter;
    use crate::vm::emit::Emitter;

    fn deploy(engine: &mut Engine, script: Vec<u8>, methods: Vec<Method>) -> Hash160 {
        let mut manifest = Manifest::new("test");
        manifest.abi.methods = methods;
        manifest.permissions.push(Permission::wildcard());
        let nef = Nef::new("test", "", Vec::new(), script).unwrap();
        engine.deploy(nef, manifest).unwrap()
    }

    fn method(name: &str, offset: usize, params: usize, ret: ParamType) -> Method {
        Method {
            name: name.to_string(),
            offset,
            parameters: (0..params).map(|i| Parameter::new(format!("a{}", i), ParamType::Any)).collect(),
            return_type: ret,
            safe: false,
        }
    }

    #[test]
    fn test_args_in_push_order() {
        // sub(a, b) = a - b
        let mut e = Emitter::new();
        e.op_with(Opcode::INITSLOT, &[0, 2]);
        e.op_with(Opcode::LDARG, &[0]);
        e.op_with(Opcode::LDARG, &[1]);
        e.op(Opcode::SUB);
        e.op(Opcode::RET);
        let mut engine = Engine::new(0x35);
        let h = deploy(&mut engine, e.into_bytes(), vec![method("sub", 0, 2, ParamType::Integer)]);
        let r = engine
            .call(&h, "sub", vec![StackItem::Integer(10), StackItem::Integer(3)])
            .unwrap();
        assert_eq!(r, StackItem::Integer(7));
    }

    #[test]
    fn test_assertmsg_fault() {
        let mut e = Emitter::new();
        e.push_bool(false);
        e.assert_msg("boom");
        e.op(Opcode::RET);
        let mut engine = Engine::new(0x35);
        let h = deploy(&mut engine, e.into_bytes(), vec![method("main", 0, 0, ParamType::Void)]);
        let err = engine.call(&h, "main", vec![]).unwrap_err();
        assert!(matches!(err, VmError::AssertMsg(ref m) if m == "boom"));
    }

    #[test]
    fn test_notify_requires_flag_and_records() {
        let mut e = Emitter::new();
        e.op(Opcode::NEWARRAY0);
        e.op(Opcode::DUP);
        e.push_int(5);
        e.op(Opcode::APPEND);
        e.push_string("ev");
        e.syscall(Syscall::RuntimeNotify);
        e.op(Opcode::RET);
        let mut engine = Engine::new(0x35);
        let h = deploy(&mut engine, e.into_bytes(), vec![method("main", 0, 0, ParamType::Void)]);
        assert_eq!(engine.call(&h, "main", vec![]).unwrap(), StackItem::Null);
        assert_eq!(engine.notifications().len(), 1);
        assert_eq!(engine.notifications()[0].name, "ev");
        assert_eq!(engine.notifications()[0].state, vec![StackItem::Integer(5)]);
    }

    #[test]
    fn test_unknown_contract() {
        let mut engine = Engine::new(0x35);
        assert!(matches!(
            engine.call(&[1u8; 20], "main", vec![]),
            Err(VmError::ContractNotFound(_))
        ));
    }

    #[test]
    fn test_stdlib_roundtrip() {
        let mut engine = Engine::new(0x35);
        let encoded = engine
            .call_native(&STDLIB_HASH, BASE58_CHECK_ENCODE, CallFlags::ALL, &[StackItem::bytes(b"abc")])
            .unwrap();
        let decoded = engine
            .call_native(&STDLIB_HASH, BASE58_CHECK_DECODE, CallFlags::ALL, &[encoded])
            .unwrap();
        assert_eq!(decoded, StackItem::bytes(b"abc"));
    }

    #[test]
    fn test_step_limit() {
        let mut e = Emitter::new();
        let at = e.jump(Opcode::JMP_L);
        e.patch_jump(at, 0);
        let mut engine = Engine::new(0x35);
        engine.set_max_steps(100);
        let h = deploy(&mut engine, e.into_bytes(), vec![method("spin", 0, 0, ParamType::Void)]);
        assert!(matches!(engine.call(&h, "spin", vec![]), Err(VmError::StepLimit)));
    }
}
