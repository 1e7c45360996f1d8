//! Lowering of `runtime.Notify` with argument coercion.
//!
//! Arguments of a notification are converted to the stack item type the
//! declared event parameter expects, so that observers see the same item
//! types as the manifest advertises.

use crate::compiler::ast::Expr;
use crate::compiler::call::Lowering;
use crate::compiler::constant::Constancy;
use crate::compiler::error::{CompileError, EventSignatureError};
use crate::config::CompilerOptions;
use crate::smartcontract::{Event, ParamType};
use crate::vm::{Opcode, StackItemType, Syscall};

const NOTIFY: &str = "runtime.Notify";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCoercionRule {
    /// Leave the argument as it is.
    Preserve,
    Convert(StackItemType),
}

impl StackCoercionRule {
    pub fn for_param(ty: ParamType) -> Self {
        match ty {
            ParamType::Any => StackCoercionRule::Preserve,
            ParamType::Boolean => StackCoercionRule::Convert(StackItemType::Boolean),
            ParamType::Integer => StackCoercionRule::Convert(StackItemType::Integer),
            ParamType::ByteArray
            | ParamType::String
            | ParamType::Hash160
            | ParamType::Hash256
            | ParamType::PublicKey
            | ParamType::Signature => StackCoercionRule::Convert(StackItemType::ByteString),
            ParamType::Array => StackCoercionRule::Convert(StackItemType::Array),
            ParamType::Map => StackCoercionRule::Convert(StackItemType::Map),
            ParamType::InteropInterface => StackCoercionRule::Preserve,
            ParamType::Void => StackCoercionRule::Preserve,
        }
    }

    /// `CONVERT` target for a value whose static stack type is `native`.
    ///
    /// `native` is `Any` when the representation is unknown, in which case a
    /// conversion is always emitted.
    pub fn conversion_for(self, native: StackItemType) -> Option<StackItemType> {
        match self {
            StackCoercionRule::Preserve => None,
            StackCoercionRule::Convert(target) if target == native => None,
            StackCoercionRule::Convert(target) => Some(target),
        }
    }
}

/// `runtime.Notify(name, args...)`.
pub fn lower_notify(
    cx: &mut dyn Lowering,
    args: &[Expr],
    spread: bool,
    options: &CompilerOptions,
) -> Result<(), CompileError> {
    let [name_expr, rest @ ..] = args else {
        return Err(CompileError::usage(NOTIFY, "missing event name"));
    };
    let name = match cx.constancy(name_expr)? {
        Constancy::Const(v) => v.as_str().map(str::to_string),
        Constancy::Dynamic => None,
    };
    let checked = !options.no_events_check;
    let event = match (&name, checked) {
        (_, false) => None,
        (None, true) => return Err(CompileError::constancy(NOTIFY, "event name")),
        (Some(name), true) => Some(
            options
                .event(name)
                .ok_or_else(|| EventSignatureError::Unknown(name.clone()))?,
        ),
    };

    if spread {
        let [array] = rest else {
            return Err(CompileError::usage(NOTIFY, "only a single slice can be spread"));
        };
        tracing::debug!(event = ?name, "spread notification, arguments left as is");
        cx.emit_expr(array)?;
    } else {
        let rules = coercion_rules(event, rest.len())?;
        cx.code().op(Opcode::NEWARRAY0);
        for (i, arg) in rest.iter().enumerate() {
            cx.code().op(Opcode::DUP);
            cx.emit_expr(arg)?;
            let native = cx.static_type(arg).stack_type();
            let conversion = rules.get(i).and_then(|rule| rule.conversion_for(native));
            tracing::trace!(event = ?name, arg = i, ?native, ?conversion, "notification argument");
            if let Some(target) = conversion {
                cx.code().convert(target);
            }
            cx.code().op(Opcode::APPEND);
        }
    }

    match &name {
        Some(name) => cx.code().push_string(name),
        None => cx.emit_expr(name_expr)?,
    }
    cx.code().syscall(Syscall::RuntimeNotify);
    Ok(())
}

fn coercion_rules(event: Option<&Event>, argc: usize) -> Result<Vec<StackCoercionRule>, CompileError> {
    let Some(event) = event else {
        return Ok(Vec::new());
    };
    if event.parameters.len() != argc {
        return Err(EventSignatureError::Arity {
            event: event.name.clone(),
            expected: event.parameters.len(),
            found: argc,
        }
        .into());
    }
    Ok(event
        .parameters
        .iter()
        .map(|p| StackCoercionRule::for_param(p.ty))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smartcontract::Parameter;

    #[test]
    fn test_rules() {
        use StackCoercionRule::*;
        assert_eq!(StackCoercionRule::for_param(ParamType::Any), Preserve);
        assert_eq!(StackCoercionRule::for_param(ParamType::Hash160), Convert(StackItemType::ByteString));
        assert_eq!(StackCoercionRule::for_param(ParamType::Boolean), Convert(StackItemType::Boolean));
        assert_eq!(StackCoercionRule::for_param(ParamType::InteropInterface), Preserve);
    }

    #[test]
    fn test_conversion_only_when_needed() {
        let rule = StackCoercionRule::Convert(StackItemType::Integer);
        assert_eq!(rule.conversion_for(StackItemType::Integer), None);
        assert_eq!(rule.conversion_for(StackItemType::Any), Some(StackItemType::Integer));
        let bytes = StackCoercionRule::Convert(StackItemType::ByteString);
        assert_eq!(bytes.conversion_for(StackItemType::Buffer), Some(StackItemType::ByteString));
        assert_eq!(StackCoercionRule::Preserve.conversion_for(StackItemType::Any), None);
    }

    #[test]
    fn test_arity_mismatch() {
        let event = Event {
            name: "Transfer".to_string(),
            parameters: vec![Parameter::new("amount", ParamType::Integer)],
        };
        let err = coercion_rules(Some(&event), 2).unwrap_err();
        assert_eq!(
            err,
            CompileError::EventSignature(EventSignatureError::Arity {
                event: "Transfer".to_string(),
                expected: 1,
                found: 2,
            })
        );
        assert_eq!(coercion_rules(None, 3).unwrap(), Vec::new());
    }
}
