//! Compile-time constant evaluation.
//!
//! Constancy is syntactic: literals, named constants of any package in the
//! unit, interop constants, conversions and a few integer and string
//! operators over constants, and foldable builtin calls with constant
//! arguments. Everything else, including variables initialized with a
//! constant, is `Dynamic`.

use std::collections::{HashMap, HashSet};

use crate::compiler::ast::{BinaryOp, Expr, UnaryOp};
use crate::compiler::builtins;
use crate::compiler::error::CompileError;
use crate::compiler::resolver::{FileScope, Symbol, UnitIndex};
use crate::compiler::types::Type;
use crate::encoding::address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
}

impl ConstValue {
    /// Byte content of a string or byte constant.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ConstValue::Str(s) => Some(s.as_bytes()),
            ConstValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            ConstValue::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Type a constant has when the declaration does not name one.
    pub fn default_type(&self) -> Type {
        match self {
            ConstValue::Int(_) => Type::Int,
            ConstValue::Bool(_) => Type::Bool,
            ConstValue::Str(_) => Type::String,
            ConstValue::Bytes(_) => Type::ByteSlice,
        }
    }

    fn convert(self, ty: &Type) -> Option<ConstValue> {
        match (self, ty) {
            (ConstValue::Str(s), t) if t.is_byte_like() && *t != Type::String => Some(ConstValue::Bytes(s.into_bytes())),
            (ConstValue::Bytes(b), Type::String) => String::from_utf8(b).ok().map(ConstValue::Str),
            (v @ ConstValue::Bytes(_), t) if t.is_byte_like() => Some(v),
            (v @ ConstValue::Str(_), Type::String) => Some(v),
            (v @ ConstValue::Int(_), Type::Int) => Some(v),
            (v @ ConstValue::Bool(_), Type::Bool) => Some(v),
            (v, Type::Any) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constancy {
    Const(ConstValue),
    Dynamic,
}

impl Constancy {
    pub fn value(&self) -> Option<&ConstValue> {
        match self {
            Constancy::Const(v) => Some(v),
            Constancy::Dynamic => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Constancy::Const(_))
    }
}

/// Evaluates expressions to constants, caching named constants per unit.
pub struct ConstFolder<'u> {
    index: &'u UnitIndex<'u>,
    address_version: u8,
    cache: HashMap<Symbol, ConstValue>,
    visiting: HashSet<Symbol>,
}

impl<'u> ConstFolder<'u> {
    pub fn new(index: &'u UnitIndex<'u>, address_version: u8) -> Self {
        Self {
            index,
            address_version,
            cache: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    /// Classify `expr` as seen from `scope`.
    ///
    /// `is_local` tells whether a bare identifier names a local variable or
    /// parameter, which shadows package-level names and is never constant.
    pub fn eval(
        &mut self,
        expr: &Expr,
        scope: &FileScope<'_>,
        is_local: &dyn Fn(&str) -> bool,
    ) -> Result<Constancy, CompileError> {
        let value = match expr {
            Expr::Int { value } => Some(ConstValue::Int(*value)),
            Expr::Bool { value } => Some(ConstValue::Bool(*value)),
            Expr::Str { value } => Some(ConstValue::Str(value.clone())),
            Expr::Bytes { value } => Some(ConstValue::Bytes(value.clone())),
            Expr::SliceLit { ty, .. } if ty.is_byte_like() => expr.literal_bytes().map(ConstValue::Bytes),
            Expr::Ident { name } if is_local(name) => None,
            Expr::Ident { .. } | Expr::Selector { .. } => match self.index.resolve(expr, scope) {
                Some(sym) => self.named(&sym)?,
                None => None,
            },
            Expr::Convert { ty, expr } => match self.eval(expr, scope, is_local)? {
                Constancy::Const(v) => v.convert(ty),
                Constancy::Dynamic => None,
            },
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, scope, is_local)?;
                let rhs = self.eval(rhs, scope, is_local)?;
                match (lhs, rhs) {
                    (Constancy::Const(a), Constancy::Const(b)) => binary(*op, a, b),
                    _ => None,
                }
            }
            Expr::Unary { op, expr } => match (op, self.eval(expr, scope, is_local)?) {
                (UnaryOp::Neg, Constancy::Const(ConstValue::Int(n))) => n.checked_neg().map(ConstValue::Int),
                (UnaryOp::Not, Constancy::Const(ConstValue::Bool(b))) => Some(ConstValue::Bool(!b)),
                _ => None,
            },
            Expr::Call { callee, args, spread } if !spread && args.len() == 1 => {
                self.fold_call(callee, &args[0], scope, is_local)?
            }
            _ => None,
        };
        Ok(value.map_or(Constancy::Dynamic, Constancy::Const))
    }

    fn fold_call(
        &mut self,
        callee: &Expr,
        arg: &Expr,
        scope: &FileScope<'_>,
        is_local: &dyn Fn(&str) -> bool,
    ) -> Result<Option<ConstValue>, CompileError> {
        if matches!(callee, Expr::Ident { name } if is_local(name)) {
            return Ok(None);
        }
        let Some(sym) = self.index.resolve(callee, scope) else {
            return Ok(None);
        };
        let Some(builtin) = builtins::classify(&sym.path, &sym.name) else {
            return Ok(None);
        };
        if !builtin.foldable() {
            return Ok(None);
        }
        let Constancy::Const(ConstValue::Str(s)) = self.eval(arg, scope, is_local)? else {
            return Ok(None);
        };
        let hash = address::to_hash160(&s, self.address_version).map_err(|source| CompileError::AddressDecode {
            address: s.clone(),
            source,
        })?;
        tracing::debug!(builtin = %builtin.qualified_name(), address = %s, "folded address conversion");
        Ok(Some(ConstValue::Bytes(hash.to_vec())))
    }

    /// Value of a package-level name, if it is a constant.
    fn named(&mut self, sym: &Symbol) -> Result<Option<ConstValue>, CompileError> {
        if let Some(bits) = builtins::interop_constant(&sym.path, &sym.name) {
            return Ok(Some(ConstValue::Int(bits)));
        }
        if let Some(v) = self.cache.get(sym) {
            return Ok(Some(v.clone()));
        }
        let Some(declared) = self.index.consts.get(sym).copied() else {
            return Ok(None);
        };
        if !self.visiting.insert(sym.clone()) {
            return Err(CompileError::Unsupported(format!("constant {} refers to itself", sym)));
        }
        let imports = self.index.imports(&declared.file.imports);
        let scope = FileScope {
            package: declared.package,
            file: &declared.file.name,
            imports: &imports,
        };
        let result = self.eval(&declared.decl.value, &scope, &|_| false);
        self.visiting.remove(sym);

        let value = match result? {
            Constancy::Const(v) => match &declared.decl.ty {
                Some(ty) => v.convert(ty),
                None => Some(v),
            },
            Constancy::Dynamic => None,
        };
        let value = value.ok_or_else(|| {
            CompileError::Unsupported(format!("initializer of constant {} is not a constant", sym))
        })?;
        self.cache.insert(sym.clone(), value.clone());
        Ok(Some(value))
    }
}

fn binary(op: BinaryOp, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    match (op, a, b) {
        (BinaryOp::BitOr, Int(a), Int(b)) => Some(Int(a | b)),
        (BinaryOp::BitAnd, Int(a), Int(b)) => Some(Int(a & b)),
        (BinaryOp::Add, Int(a), Int(b)) => a.checked_add(b).map(Int),
        (BinaryOp::Sub, Int(a), Int(b)) => a.checked_sub(b).map(Int),
        (BinaryOp::Mul, Int(a), Int(b)) => a.checked_mul(b).map(Int),
        (BinaryOp::Add, Str(a), Str(b)) => Some(Str(a + &b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{CompilationUnit, ConstDecl, File, Import, Package};
    use crate::compiler::builtins::{ADDRESS_PKG, CONTRACT_PKG, UTIL_PKG};
    use crate::encoding::address::DEFAULT_ADDRESS_VERSION;

    const ADDR: &str = "NQRLhCpAru9BjGsMwk67vdMwmzKMRgsnnN";

    fn unit_with(consts: Vec<ConstDecl>, imports: Vec<Import>) -> CompilationUnit {
        let file = File {
            name: "foo.go".to_string(),
            package: "foo".to_string(),
            imports,
            consts,
            ..File::default()
        };
        CompilationUnit::new(Package::new("example.com/foo", vec![file]))
    }

    fn konst(name: &str, value: Expr) -> ConstDecl {
        ConstDecl {
            name: name.to_string(),
            ty: None,
            value,
        }
    }

    fn eval_in(unit: &CompilationUnit, expr: &Expr) -> Result<Constancy, CompileError> {
        let index = UnitIndex::new(unit);
        let imports = index.imports(&unit.main.files[0].imports);
        let scope = FileScope {
            package: "example.com/foo",
            file: "foo.go",
            imports: &imports,
        };
        let mut folder = ConstFolder::new(&index, DEFAULT_ADDRESS_VERSION);
        folder.eval(expr, &scope, &|name| name == "local")
    }

    #[test]
    fn test_flags_expression() {
        let unit = unit_with(vec![], vec![Import::new(CONTRACT_PKG)]);
        let expr = Expr::binary(
            BinaryOp::BitOr,
            Expr::selector("contract", "ReadStates"),
            Expr::selector("contract", "AllowCall"),
        );
        assert_eq!(eval_in(&unit, &expr).unwrap(), Constancy::Const(ConstValue::Int(5)));
    }

    #[test]
    fn test_named_and_local() {
        let unit = unit_with(vec![konst("hash", Expr::str("abc"))], vec![]);
        let conv = Expr::convert(Type::ByteSlice, Expr::ident("hash"));
        assert_eq!(
            eval_in(&unit, &conv).unwrap(),
            Constancy::Const(ConstValue::Bytes(b"abc".to_vec()))
        );
        assert_eq!(eval_in(&unit, &Expr::ident("local")).unwrap(), Constancy::Dynamic);
    }

    #[test]
    fn test_fold_address() {
        let unit = unit_with(vec![konst("addr", Expr::str(ADDR))], vec![Import::new(ADDRESS_PKG)]);
        let call = Expr::call(Expr::selector("address", "ToHash160"), vec![Expr::ident("addr")]);
        let expected = address::to_hash160(ADDR, DEFAULT_ADDRESS_VERSION).unwrap();
        assert_eq!(
            eval_in(&unit, &call).unwrap(),
            Constancy::Const(ConstValue::Bytes(expected.to_vec()))
        );
        let dynamic = Expr::call(Expr::selector("address", "ToHash160"), vec![Expr::ident("local")]);
        assert_eq!(eval_in(&unit, &dynamic).unwrap(), Constancy::Dynamic);
    }

    #[test]
    fn test_fold_reports_bad_address() {
        let unit = unit_with(vec![], vec![Import::aliased(UTIL_PKG, "uu")]);
        let call = Expr::call(Expr::selector("uu", "FromAddress"), vec![Expr::str("not-an-address")]);
        assert!(matches!(
            eval_in(&unit, &call),
            Err(CompileError::AddressDecode { .. })
        ));
    }

    #[test]
    fn test_self_reference() {
        let unit = unit_with(vec![konst("a", Expr::ident("a"))], vec![]);
        assert!(matches!(
            eval_in(&unit, &Expr::ident("a")),
            Err(CompileError::Unsupported(_))
        ));
    }
}
