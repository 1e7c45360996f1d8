//! Lowering of inter-contract calls.
//!
//! A call site is lowered either through the method-token table (`CALLT`)
//! when its target is fully known at compile time, or through
//! `System.Contract.Call` with the target computed at runtime. Either way
//! the callee receives its arguments in declaration order.

use crate::compiler::ast::Expr;
use crate::compiler::builtins::{BuiltinDescriptor, MANAGEMENT_GET_CONTRACT, NativeMethod};
use crate::compiler::constant::{ConstValue, Constancy};
use crate::compiler::error::CompileError;
use crate::compiler::types::Type;
use crate::crypto::hash::HASH160_LEN;
use crate::smartcontract::native::CONTRACT_STATE_UPDATE_COUNTER;
use crate::smartcontract::{CallFlags, MethodToken};
use crate::vm::{Emitter, Opcode, Syscall};

/// What call lowering needs from the code generator.
pub trait Lowering {
    fn code(&mut self) -> &mut Emitter;
    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CompileError>;
    fn constancy(&mut self, expr: &Expr) -> Result<Constancy, CompileError>;
    fn static_type(&self, expr: &Expr) -> Type;
    /// Index of `token` in the method-token table, adding it if needed.
    fn method_token(&mut self, token: MethodToken) -> Result<u16, CompileError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallForm {
    Token {
        hash: [u8; HASH160_LEN],
        method: String,
        flags: CallFlags,
    },
    Dynamic,
}

/// Pick the token form when hash, method and flags are all constant and valid.
pub fn select_form(hash: &Constancy, method: &Constancy, flags: &Constancy) -> CallForm {
    let hash = hash
        .value()
        .and_then(ConstValue::as_bytes)
        .and_then(|b| <[u8; HASH160_LEN]>::try_from(b).ok());
    let method = method.value().and_then(ConstValue::as_str).filter(|m| !m.is_empty());
    let flags = flags.value().and_then(ConstValue::as_int).and_then(CallFlags::from_bits);
    match (hash, method, flags) {
        (Some(hash), Some(method), Some(flags)) => CallForm::Token {
            hash,
            method: method.to_string(),
            flags,
        },
        _ => CallForm::Dynamic,
    }
}

/// `contract.Call(hash, method, flags, args...)`.
pub fn lower_contract_call(cx: &mut dyn Lowering, args: &[Expr], spread: bool) -> Result<(), CompileError> {
    let (hash, method, flags, rest) = split_target(args)?;
    let form = if spread {
        CallForm::Dynamic
    } else {
        let h = cx.constancy(hash)?;
        let m = cx.constancy(method)?;
        let f = cx.constancy(flags)?;
        select_form(&h, &m, &f)
    };
    tracing::debug!(form = ?form, argc = rest.len(), spread, "lower contract call");

    match form {
        CallForm::Token { hash, method, flags } => emit_token_call(cx, hash, method, flags, rest, true),
        CallForm::Dynamic => {
            emit_args_array(cx, rest, spread)?;
            cx.emit_expr(flags)?;
            cx.emit_expr(method)?;
            cx.emit_expr(hash)?;
            cx.code().syscall(Syscall::ContractCall);
            Ok(())
        }
    }
}

/// `neogointernal.CallWithToken` and `CallWithTokenNoRet`.
///
/// Hash and method must be constant. Flags must be constant for the
/// no-return variant; the returning variant falls back to a dynamic call.
pub fn lower_token_call(
    cx: &mut dyn Lowering,
    builtin: &BuiltinDescriptor,
    args: &[Expr],
    spread: bool,
) -> Result<(), CompileError> {
    let name = builtin.qualified_name();
    if spread {
        return Err(CompileError::usage(&name, "arguments cannot be spread"));
    }
    let (hash, method, flags, rest) = split_target(args)?;

    let hash = match cx.constancy(hash)? {
        Constancy::Dynamic => return Err(CompileError::constancy(&name, "script hash")),
        Constancy::Const(v) => {
            let bytes = v
                .as_bytes()
                .ok_or_else(|| CompileError::argument(&name, "script hash must be a byte string"))?;
            <[u8; HASH160_LEN]>::try_from(bytes).map_err(|_| {
                CompileError::argument(&name, format!("invalid script hash length {}", bytes.len()))
            })?
        }
    };
    let method = match cx.constancy(method)? {
        Constancy::Dynamic => return Err(CompileError::constancy(&name, "method")),
        Constancy::Const(v) => match v.as_str() {
            Some("") => return Err(CompileError::argument(&name, "empty method name")),
            Some(m) => m.to_string(),
            None => return Err(CompileError::argument(&name, "method must be a string")),
        },
    };
    let flags_expr = flags;
    let flags = match cx.constancy(flags_expr)? {
        Constancy::Const(v) => {
            let bits = v
                .as_int()
                .ok_or_else(|| CompileError::argument(&name, "call flags must be an integer"))?;
            Some(
                CallFlags::from_bits(bits)
                    .ok_or_else(|| CompileError::argument(&name, format!("invalid call flags {}", bits)))?,
            )
        }
        Constancy::Dynamic if builtin.returns => None,
        Constancy::Dynamic => return Err(CompileError::constancy(&name, "call flags")),
    };

    match flags {
        Some(flags) => emit_token_call(cx, hash, method, flags, rest, builtin.returns),
        None => {
            tracing::debug!(builtin = %name, "runtime call flags, using dynamic call");
            emit_args_array(cx, rest, false)?;
            cx.emit_expr(flags_expr)?;
            let code = cx.code();
            code.push_string(&method);
            code.push_bytes(&hash);
            code.syscall(Syscall::ContractCall);
            Ok(())
        }
    }
}

/// `contract.CallWithVersion(hash, version, method, flags, args...)`.
///
/// Fails at runtime with "unknown contract" or "contract version mismatch"
/// before the call is made.
pub fn lower_versioned_call(cx: &mut dyn Lowering, args: &[Expr], spread: bool) -> Result<(), CompileError> {
    let [hash, version, method, flags, rest @ ..] = args else {
        return Err(CompileError::usage(
            "contract.CallWithVersion",
            format!("expected at least 4 arguments, got {}", args.len()),
        ));
    };
    emit_args_array(cx, rest, spread)?;
    cx.emit_expr(flags)?;
    cx.emit_expr(method)?;
    cx.emit_expr(hash)?;

    cx.code().op(Opcode::DUP);
    call_native(cx, &MANAGEMENT_GET_CONTRACT)?;
    let code = cx.code();
    code.op(Opcode::DUP);
    code.op(Opcode::ISNULL);
    code.op(Opcode::NOT);
    code.assert_msg("unknown contract");
    code.push_int(CONTRACT_STATE_UPDATE_COUNTER);
    code.op(Opcode::PICKITEM);
    cx.emit_expr(version)?;
    let code = cx.code();
    code.op(Opcode::NUMEQUAL);
    code.assert_msg("contract version mismatch");
    code.syscall(Syscall::ContractCall);
    Ok(())
}

/// `CALLT` to a native method whose arguments are already on the stack.
pub fn call_native(cx: &mut dyn Lowering, native: &NativeMethod) -> Result<(), CompileError> {
    let idx = cx.method_token(MethodToken {
        hash: *native.hash,
        method: native.method.to_string(),
        params_count: native.params,
        has_return: native.returns,
        call_flags: native.flags,
    })?;
    cx.code().callt(idx);
    Ok(())
}

fn split_target(args: &[Expr]) -> Result<(&Expr, &Expr, &Expr, &[Expr]), CompileError> {
    match args {
        [hash, method, flags, rest @ ..] => Ok((hash, method, flags, rest)),
        _ => Err(CompileError::Unsupported(format!(
            "contract call needs hash, method and flags, got {} arguments",
            args.len()
        ))),
    }
}

fn emit_token_call(
    cx: &mut dyn Lowering,
    hash: [u8; HASH160_LEN],
    method: String,
    flags: CallFlags,
    args: &[Expr],
    has_return: bool,
) -> Result<(), CompileError> {
    let params_count = u16::try_from(args.len())
        .map_err(|_| CompileError::Unsupported(format!("too many call arguments: {}", args.len())))?;
    for arg in args {
        cx.emit_expr(arg)?;
    }
    let idx = cx.method_token(MethodToken {
        hash,
        method,
        params_count,
        has_return,
        call_flags: flags,
    })?;
    cx.code().callt(idx);
    Ok(())
}

/// Argument array for `System.Contract.Call`, in declaration order.
fn emit_args_array(cx: &mut dyn Lowering, args: &[Expr], spread: bool) -> Result<(), CompileError> {
    if spread {
        return match args {
            [array] => cx.emit_expr(array),
            _ => Err(CompileError::Unsupported(
                "only a single slice can be spread into call arguments".to_string(),
            )),
        };
    }
    cx.code().op(Opcode::NEWARRAY0);
    for arg in args {
        cx.code().op(Opcode::DUP);
        cx.emit_expr(arg)?;
        cx.code().op(Opcode::APPEND);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(n: usize) -> Constancy {
        Constancy::Const(ConstValue::Bytes(vec![7; n]))
    }

    fn str(s: &str) -> Constancy {
        Constancy::Const(ConstValue::Str(s.to_string()))
    }

    fn int(n: i64) -> Constancy {
        Constancy::Const(ConstValue::Int(n))
    }

    #[test]
    fn test_token_form_needs_everything_constant() {
        let form = select_form(&bytes(20), &str("append"), &int(15));
        assert_eq!(
            form,
            CallForm::Token {
                hash: [7; 20],
                method: "append".to_string(),
                flags: CallFlags::ALL,
            }
        );
        assert_eq!(select_form(&Constancy::Dynamic, &str("m"), &int(15)), CallForm::Dynamic);
        assert_eq!(select_form(&bytes(20), &Constancy::Dynamic, &int(15)), CallForm::Dynamic);
        assert_eq!(select_form(&bytes(20), &str("m"), &Constancy::Dynamic), CallForm::Dynamic);
    }

    #[test]
    fn test_invalid_constants_fall_back_to_dynamic() {
        assert_eq!(select_form(&bytes(19), &str("m"), &int(15)), CallForm::Dynamic);
        assert_eq!(select_form(&bytes(20), &str(""), &int(15)), CallForm::Dynamic);
        assert_eq!(select_form(&bytes(20), &str("m"), &int(16)), CallForm::Dynamic);
    }

    #[test]
    fn test_string_hash_is_accepted() {
        let hash = Constancy::Const(ConstValue::Str("a".repeat(20)));
        assert!(matches!(select_form(&hash, &str("m"), &int(0)), CallForm::Token { .. }));
    }
}
