//! Script generation for a whole compilation unit.
//!
//! Every function of every non-interop package is emitted once, callable with
//! `CALL_L`. Package-level variables live in static slots filled by the
//! `_initialize` method, emitted last. Interop builtins are dispatched by
//! canonical path and lowered inline.

use std::collections::HashMap;

use crate::compiler::Program;
use crate::compiler::ast::{BinaryOp, CompilationUnit, Expr, File, FuncDecl, Package, Stmt, UnaryOp};
use crate::compiler::builtins::{self, BuiltinDescriptor, BuiltinKind, Emission, Step};
use crate::compiler::call::{self, Lowering};
use crate::compiler::constant::{ConstFolder, ConstValue, Constancy};
use crate::compiler::debug::{DebugInfo, MethodDebugInfo};
use crate::compiler::error::{CompileError, Diagnostic};
use crate::compiler::notify;
use crate::compiler::resolver::{FileScope, ImportTable, Symbol, UnitIndex};
use crate::compiler::types::Type;
use crate::config::CompilerOptions;
use crate::smartcontract::MethodToken;
use crate::vm::{Emitter, Opcode, StackItemType};

/// Guards type inference against self-referential constants.
const MAX_INFERENCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Local,
    Arg,
    Static,
}

#[derive(Debug, Clone)]
struct Slot {
    kind: SlotKind,
    index: u8,
    ty: Type,
}

impl Slot {
    fn load(&self) -> Opcode {
        match self.kind {
            SlotKind::Local => Opcode::LDLOC,
            SlotKind::Arg => Opcode::LDARG,
            SlotKind::Static => Opcode::LDSFLD,
        }
    }

    fn store(&self) -> Opcode {
        match self.kind {
            SlotKind::Local => Opcode::STLOC,
            SlotKind::Arg => Opcode::STARG,
            SlotKind::Static => Opcode::STSFLD,
        }
    }
}

/// Name scope of the function (or initializer) being emitted.
#[derive(Debug, Default)]
struct Frame<'a> {
    package: &'a str,
    file: &'a str,
    function: Option<&'a str>,
    imports: ImportTable,
    params: HashMap<&'a str, Slot>,
    scopes: Vec<HashMap<String, Slot>>,
    next_local: usize,
}

impl Frame<'_> {
    fn lookup(&self, name: &str) -> Option<&Slot> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.params.get(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continues,
    Terminated,
}

/// What a call leaves on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pushed {
    Value,
    Nothing,
    Diverges,
}

pub struct Codegen<'a> {
    unit: &'a CompilationUnit,
    index: &'a UnitIndex<'a>,
    options: &'a CompilerOptions,
    folder: ConstFolder<'a>,
    code: Emitter,
    tokens: Vec<MethodToken>,
    statics: HashMap<Symbol, Slot>,
    entries: HashMap<Symbol, usize>,
    fixups: Vec<(usize, Symbol)>,
    debug: DebugInfo,
    frame: Frame<'a>,
}

impl<'a> Codegen<'a> {
    pub fn new(unit: &'a CompilationUnit, index: &'a UnitIndex<'a>, options: &'a CompilerOptions) -> Self {
        Self {
            unit,
            index,
            options,
            folder: ConstFolder::new(index, options.address_version),
            code: Emitter::new(),
            tokens: Vec::new(),
            statics: HashMap::new(),
            entries: HashMap::new(),
            fixups: Vec::new(),
            debug: DebugInfo::new(),
            frame: Frame::default(),
        }
    }

    pub fn generate(mut self) -> Result<Program, Diagnostic> {
        let unit = self.unit;
        let compiled: Vec<&'a Package> = unit
            .packages()
            .filter(|p| !builtins::is_interop_path(&p.path))
            .collect();
        // Dependencies are initialized before the main package.
        let init_order: Vec<&'a Package> = compiled.iter().skip(1).chain(compiled.first()).copied().collect();

        for pkg in &init_order {
            for file in &pkg.files {
                self.enter(&pkg.path, file, None);
                self.allocate_statics(&pkg.path, file).map_err(|e| self.diagnostic(e))?;
            }
        }

        for pkg in &compiled {
            for file in &pkg.files {
                for func in &file.funcs {
                    self.enter(&pkg.path, file, Some(&func.name));
                    self.emit_function(pkg, func).map_err(|e| self.diagnostic(e))?;
                }
            }
        }

        if !self.statics.is_empty() {
            self.emit_initialize(&init_order)?;
        }

        for (at, sym) in std::mem::take(&mut self.fixups) {
            let target = self.entries.get(&sym).copied().ok_or_else(|| Diagnostic {
                file: String::new(),
                function: None,
                error: CompileError::UnknownIdentifier(sym.to_string()),
            })?;
            self.code.patch_jump(at, target);
        }

        self.debug.static_count = self.statics.len();
        tracing::debug!(
            size = self.code.offset(),
            tokens = self.tokens.len(),
            statics = self.statics.len(),
            "script generated"
        );
        Ok(Program {
            script: self.code.into_bytes(),
            tokens: self.tokens,
            debug: self.debug,
        })
    }

    fn enter(&mut self, package: &'a str, file: &'a File, function: Option<&'a str>) {
        self.frame = Frame {
            package,
            file: &file.name,
            function,
            imports: self.index.imports(&file.imports),
            ..Frame::default()
        };
    }

    fn diagnostic(&self, error: CompileError) -> Diagnostic {
        Diagnostic {
            file: self.frame.file.to_string(),
            function: self.frame.function.map(str::to_string),
            error,
        }
    }

    fn allocate_statics(&mut self, package: &str, file: &File) -> Result<(), CompileError> {
        for decl in &file.vars {
            let index = u8::try_from(self.statics.len())
                .map_err(|_| CompileError::Unsupported("too many package-level variables".to_string()))?;
            let ty = match (&decl.ty, &decl.value) {
                (Some(ty), _) => ty.clone(),
                (None, Some(value)) => self.static_type(value),
                (None, None) => Type::Any,
            };
            self.statics.insert(
                Symbol::new(package, decl.name.as_str()),
                Slot {
                    kind: SlotKind::Static,
                    index,
                    ty,
                },
            );
        }
        Ok(())
    }

    fn emit_function(&mut self, pkg: &'a Package, func: &'a FuncDecl) -> Result<(), CompileError> {
        let start = self.code.offset();
        let locals = count_locals(&func.body);
        let (Ok(locals), Ok(argc)) = (u8::try_from(locals), u8::try_from(func.params.len())) else {
            return Err(CompileError::Unsupported(format!("too many variables in {}", func.name)));
        };
        for (i, p) in func.params.iter().enumerate() {
            self.frame.params.insert(
                &p.name,
                Slot {
                    kind: SlotKind::Arg,
                    index: i as u8,
                    ty: p.ty.clone(),
                },
            );
        }
        if locals > 0 || argc > 0 {
            self.code.op_with(Opcode::INITSLOT, &[locals, argc]);
        }

        self.frame.scopes.push(HashMap::new());
        if self.emit_block(&func.body)? == Flow::Continues {
            self.code.op(Opcode::RET);
        }
        self.frame.scopes.pop();

        let sym = Symbol::new(pkg.path.as_str(), func.name.as_str());
        tracing::debug!(function = %sym, offset = start, locals, argc, "emitted function");
        self.entries.insert(sym, start);
        self.debug.methods.push(MethodDebugInfo {
            name: func.name.clone(),
            package: pkg.path.clone(),
            start,
            end: self.code.offset(),
            params: func.params.clone(),
            result: func.result.clone(),
            exported: pkg.path == self.unit.main.path && func.is_exported(),
        });
        Ok(())
    }

    fn emit_initialize(&mut self, init_order: &[&'a Package]) -> Result<(), Diagnostic> {
        let start = self.code.offset();
        let count = u8::try_from(self.statics.len()).map_err(|_| Diagnostic {
            file: String::new(),
            function: None,
            error: CompileError::Unsupported("too many package-level variables".to_string()),
        })?;
        self.code.op_with(Opcode::INITSSLOT, &[count]);
        for pkg in init_order {
            for file in &pkg.files {
                self.enter(&pkg.path, file, None);
                for decl in &file.vars {
                    let sym = Symbol::new(pkg.path.as_str(), decl.name.as_str());
                    let Some(slot) = self.statics.get(&sym).cloned() else {
                        continue;
                    };
                    let emitted = match &decl.value {
                        Some(value) => self.emit_expr(value),
                        None => {
                            self.push_default(&slot.ty);
                            Ok(())
                        }
                    };
                    emitted.map_err(|e| self.diagnostic(e))?;
                    self.code.op_with(slot.store(), &[slot.index]);
                }
            }
        }
        self.code.op(Opcode::RET);
        self.debug.initialize = Some(start);
        Ok(())
    }

    fn emit_block(&mut self, body: &[Stmt]) -> Result<Flow, CompileError> {
        for stmt in body {
            if self.emit_stmt(stmt)? == Flow::Terminated {
                return Ok(Flow::Terminated);
            }
        }
        Ok(Flow::Continues)
    }

    fn emit_scoped_block(&mut self, body: &[Stmt]) -> Result<Flow, CompileError> {
        self.frame.scopes.push(HashMap::new());
        let flow = self.emit_block(body);
        self.frame.scopes.pop();
        flow
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<Flow, CompileError> {
        match stmt {
            Stmt::Var(decl) => {
                let ty = match (&decl.ty, &decl.value) {
                    (Some(ty), _) => ty.clone(),
                    (None, Some(value)) => self.static_type(value),
                    (None, None) => Type::Any,
                };
                match &decl.value {
                    Some(value) => self.emit_expr(value)?,
                    None => self.push_default(&ty),
                }
                self.declare_local(&decl.name, ty)?;
            }
            Stmt::Define { name, value } => {
                let ty = self.static_type(value);
                self.emit_expr(value)?;
                self.declare_local(name, ty)?;
            }
            Stmt::Assign { name, value } => {
                self.emit_expr(value)?;
                let slot = self
                    .variable(&Expr::ident(name.as_str()))
                    .ok_or_else(|| CompileError::UnknownIdentifier(name.clone()))?;
                self.code.op_with(slot.store(), &[slot.index]);
            }
            Stmt::Expr { expr } => {
                let pushed = match expr {
                    Expr::Call { .. } => self.emit_call(expr)?,
                    _ => {
                        self.emit_expr(expr)?;
                        Pushed::Value
                    }
                };
                match pushed {
                    Pushed::Value => self.code.op(Opcode::DROP),
                    Pushed::Nothing => {}
                    Pushed::Diverges => return Ok(Flow::Terminated),
                }
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    self.emit_expr(value)?;
                }
                self.code.op(Opcode::RET);
                return Ok(Flow::Terminated);
            }
            Stmt::If { cond, then, otherwise } => {
                self.emit_expr(cond)?;
                let to_else = self.code.jump(Opcode::JMPIFNOT_L);
                let then_flow = self.emit_scoped_block(then)?;
                if otherwise.is_empty() {
                    let end = self.code.offset();
                    self.code.patch_jump(to_else, end);
                    return Ok(Flow::Continues);
                }
                let to_end = (then_flow == Flow::Continues).then(|| self.code.jump(Opcode::JMP_L));
                let else_start = self.code.offset();
                self.code.patch_jump(to_else, else_start);
                let else_flow = self.emit_scoped_block(otherwise)?;
                if let Some(at) = to_end {
                    let end = self.code.offset();
                    self.code.patch_jump(at, end);
                }
                if then_flow == Flow::Terminated && else_flow == Flow::Terminated {
                    return Ok(Flow::Terminated);
                }
            }
        }
        Ok(Flow::Continues)
    }

    fn declare_local(&mut self, name: &str, ty: Type) -> Result<(), CompileError> {
        let index = u8::try_from(self.frame.next_local)
            .map_err(|_| CompileError::Unsupported("too many local variables".to_string()))?;
        self.frame.next_local += 1;
        let slot = Slot {
            kind: SlotKind::Local,
            index,
            ty,
        };
        self.code.op_with(slot.store(), &[slot.index]);
        match self.frame.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.to_string(), slot);
                Ok(())
            }
            None => Err(CompileError::Unsupported(format!(
                "local variable {} outside of a function",
                name
            ))),
        }
    }

    /// Local, parameter or package-level variable named by `expr`.
    fn variable(&self, expr: &Expr) -> Option<Slot> {
        if let Expr::Ident { name } = expr
            && let Some(slot) = self.frame.lookup(name)
        {
            return Some(slot.clone());
        }
        let sym = self.index.resolve(expr, &self.scope())?;
        self.statics.get(&sym).cloned()
    }

    fn scope(&self) -> FileScope<'_> {
        FileScope {
            package: self.frame.package,
            file: self.frame.file,
            imports: &self.frame.imports,
        }
    }

    fn is_local(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident { name } if self.frame.lookup(name).is_some())
    }

    fn push_default(&mut self, ty: &Type) {
        match ty {
            Type::Int => self.code.push_int(0),
            Type::Bool => self.code.push_bool(false),
            Type::String => self.code.push_string(""),
            _ => self.code.op(Opcode::PUSHNULL),
        }
    }

    fn push_const(&mut self, value: &ConstValue, ty: &Type) {
        match value {
            ConstValue::Int(n) => self.code.push_int(*n),
            ConstValue::Bool(b) => self.code.push_bool(*b),
            ConstValue::Str(s) => self.code.push_string(s),
            ConstValue::Bytes(b) => self.code.push_bytes(b),
        }
        if matches!(value, ConstValue::Str(_) | ConstValue::Bytes(_)) && ty.stack_type() == StackItemType::Buffer {
            self.code.convert(StackItemType::Buffer);
        }
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        if let Some(slot) = self.frame_slot(expr) {
            self.code.op_with(slot.load(), &[slot.index]);
            return Ok(());
        }
        if let Constancy::Const(value) = self.constancy(expr)? {
            let ty = self.static_type(expr);
            self.push_const(&value, &ty);
            return Ok(());
        }

        match expr {
            Expr::Nil => self.code.op(Opcode::PUSHNULL),
            Expr::Int { .. } | Expr::Bool { .. } | Expr::Str { .. } | Expr::Bytes { .. } => {
                return Err(CompileError::Unsupported(format!("literal {:?}", expr)));
            }
            Expr::Ident { .. } | Expr::Selector { .. } => {
                let slot = self
                    .variable(expr)
                    .ok_or_else(|| CompileError::UnknownIdentifier(display_name(expr)))?;
                self.code.op_with(slot.load(), &[slot.index]);
            }
            Expr::Call { .. } => {
                if self.emit_call(expr)? != Pushed::Value {
                    return Err(CompileError::Unsupported(format!(
                        "{} does not return a value",
                        callee_name(expr)
                    )));
                }
            }
            Expr::Convert { ty, expr: inner } => {
                self.emit_expr(inner)?;
                let from = self.static_type(inner).stack_type();
                let to = ty.stack_type();
                if to != from && matches!(to, StackItemType::ByteString | StackItemType::Buffer | StackItemType::Integer | StackItemType::Boolean) {
                    self.code.convert(to);
                }
            }
            Expr::TypeAssert { expr: inner, .. } => self.emit_expr(inner)?,
            Expr::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs)?,
            Expr::Unary { op, expr: inner } => {
                self.emit_expr(inner)?;
                match op {
                    UnaryOp::Not => self.code.op(Opcode::NOT),
                    UnaryOp::Neg => {
                        self.code.push_int(0);
                        self.code.op(Opcode::SWAP);
                        self.code.op(Opcode::SUB);
                    }
                }
            }
            Expr::SliceLit { ty, elems } if ty.is_byte_like() => {
                self.emit_byte_buffer(elems)?;
                if ty.stack_type() != StackItemType::Buffer {
                    self.code.convert(ty.stack_type());
                }
            }
            Expr::SliceLit { elems, .. } => {
                self.code.op(Opcode::NEWARRAY0);
                for elem in elems {
                    self.code.op(Opcode::DUP);
                    self.emit_expr(elem)?;
                    self.code.op(Opcode::APPEND);
                }
            }
        }
        Ok(())
    }

    /// Fresh buffer with one byte per element.
    fn emit_byte_buffer(&mut self, elems: &[Expr]) -> Result<(), CompileError> {
        self.code.push_int(elems.len() as i64);
        self.code.op(Opcode::NEWBUFFER);
        for (i, elem) in elems.iter().enumerate() {
            self.code.op(Opcode::DUP);
            self.code.push_int(i as i64);
            self.emit_expr(elem)?;
            self.code.op(Opcode::SETITEM);
        }
        Ok(())
    }

    /// Slot of a local or parameter referenced by `expr`.
    fn frame_slot(&self, expr: &Expr) -> Option<Slot> {
        match expr {
            Expr::Ident { name } => self.frame.lookup(name).cloned(),
            _ => None,
        }
    }

    fn emit_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<(), CompileError> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            self.emit_expr(lhs)?;
            self.code.op(Opcode::DUP);
            let jump = if op == BinaryOp::And {
                Opcode::JMPIFNOT_L
            } else {
                Opcode::JMPIF_L
            };
            let skip = self.code.jump(jump);
            self.code.op(Opcode::DROP);
            self.emit_expr(rhs)?;
            let end = self.code.offset();
            self.code.patch_jump(skip, end);
            return Ok(());
        }

        let lt = self.static_type(lhs);
        let rt = self.static_type(rhs);
        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        let numeric = matches!(lt, Type::Int | Type::Bool) && matches!(rt, Type::Int | Type::Bool);
        let opcode = match op {
            BinaryOp::Add if lt.is_byte_like() => {
                self.code.op(Opcode::CAT);
                if lt == Type::String {
                    self.code.convert(StackItemType::ByteString);
                }
                return Ok(());
            }
            BinaryOp::Add => Opcode::ADD,
            BinaryOp::Sub => Opcode::SUB,
            BinaryOp::Mul => Opcode::MUL,
            BinaryOp::Div => Opcode::DIV,
            BinaryOp::Mod => Opcode::MOD,
            BinaryOp::Eq if numeric => Opcode::NUMEQUAL,
            BinaryOp::Ne if numeric => Opcode::NUMNOTEQUAL,
            BinaryOp::Eq => Opcode::EQUAL,
            BinaryOp::Ne => Opcode::NOTEQUAL,
            BinaryOp::Lt => Opcode::LT,
            BinaryOp::Le => Opcode::LE,
            BinaryOp::Gt => Opcode::GT,
            BinaryOp::Ge => Opcode::GE,
            BinaryOp::BitAnd => Opcode::AND,
            BinaryOp::BitOr => Opcode::OR,
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        self.code.op(opcode);
        Ok(())
    }

    fn emit_call(&mut self, expr: &Expr) -> Result<Pushed, CompileError> {
        let Expr::Call { callee, args, spread } = expr else {
            return Err(CompileError::Unsupported(format!("not a call: {:?}", expr)));
        };
        if self.is_local(callee) {
            return Err(CompileError::Unsupported("calls through function values".to_string()));
        }
        let Some(sym) = self.index.resolve(callee, &self.scope()) else {
            if let Expr::Ident { name } = callee.as_ref()
                && let Some(pushed) = self.emit_go_builtin(name, args, *spread)?
            {
                return Ok(pushed);
            }
            return Err(CompileError::UnknownIdentifier(display_name(callee)));
        };

        if let Some(builtin) = builtins::classify(&sym.path, &sym.name) {
            return self.emit_builtin(builtin, expr, args, *spread);
        }
        let Some(func) = self.index.funcs.get(&sym).map(|d| d.decl) else {
            if builtins::is_interop_path(&sym.path) {
                return Err(CompileError::Unsupported(format!("interop function {}", sym)));
            }
            return Err(CompileError::UnknownIdentifier(sym.to_string()));
        };
        if *spread {
            return Err(CompileError::Unsupported(format!("spread call of {}", sym)));
        }
        if args.len() != func.params.len() {
            return Err(CompileError::Unsupported(format!(
                "{} expects {} arguments, got {}",
                sym,
                func.params.len(),
                args.len()
            )));
        }
        for arg in args {
            self.emit_expr(arg)?;
        }
        let at = self.code.jump(Opcode::CALL_L);
        self.fixups.push((at, sym));
        Ok(if func.result == Type::Void {
            Pushed::Nothing
        } else {
            Pushed::Value
        })
    }

    fn emit_builtin(
        &mut self,
        builtin: &BuiltinDescriptor,
        expr: &Expr,
        args: &[Expr],
        spread: bool,
    ) -> Result<Pushed, CompileError> {
        let name = builtin.qualified_name();
        if !builtin.arity.accepts(args.len()) {
            return Err(CompileError::usage(
                &name,
                format!("unexpected number of arguments: {}", args.len()),
            ));
        }
        tracing::trace!(builtin = %name, kind = ?builtin.kind, "lower builtin");

        let options = self.options;
        match builtin.emission {
            Emission::Steps(steps) => {
                if spread {
                    return Err(CompileError::usage(&name, "arguments cannot be spread"));
                }
                if builtin.foldable()
                    && let Constancy::Const(value) = self.constancy(expr)?
                {
                    let ty = self.static_type(expr);
                    self.push_const(&value, &ty);
                    return Ok(Pushed::Value);
                }
                if builtin.kind == BuiltinKind::EqualsOverride {
                    let (a, b) = (self.static_type(&args[0]), self.static_type(&args[1]));
                    if !a.comparable_with(&b) {
                        return Err(CompileError::usage(&name, format!("cannot compare {} with {}", a, b)));
                    }
                }
                for arg in args {
                    self.emit_expr(arg)?;
                }
                self.emit_steps(steps)?;
            }
            Emission::ContractCall => call::lower_contract_call(self, args, spread)?,
            Emission::TokenCall => call::lower_token_call(self, builtin, args, spread)?,
            Emission::VersionedCall => call::lower_versioned_call(self, args, spread)?,
            Emission::Notify => notify::lower_notify(self, args, spread, options)?,
        }

        Ok(match builtin.kind {
            BuiltinKind::Abort => Pushed::Diverges,
            _ if builtin.returns => Pushed::Value,
            _ => Pushed::Nothing,
        })
    }

    fn emit_steps(&mut self, steps: &[Step]) -> Result<(), CompileError> {
        for step in steps {
            match step {
                Step::Op(op) => self.code.op(*op),
                Step::PushInt(n) => self.code.push_int(*n),
                Step::Syscall(s) => self.code.syscall(*s),
                Step::Convert(t) => self.code.convert(*t),
                Step::Native(native) => call::call_native(self, native)?,
                Step::AssertMsg(msg) => self.code.assert_msg(msg),
            }
        }
        Ok(())
    }

    /// `len`, `append` and `panic`. Returns `None` for other names.
    fn emit_go_builtin(&mut self, name: &str, args: &[Expr], spread: bool) -> Result<Option<Pushed>, CompileError> {
        let pushed = match (name, args) {
            ("len", [x]) if !spread => {
                self.emit_expr(x)?;
                self.code.op(Opcode::DUP);
                self.code.op(Opcode::ISNULL);
                let not_null = self.code.jump(Opcode::JMPIFNOT_L);
                self.code.op(Opcode::DROP);
                self.code.push_int(0);
                let to_end = self.code.jump(Opcode::JMP_L);
                let size = self.code.offset();
                self.code.patch_jump(not_null, size);
                self.code.op(Opcode::SIZE);
                let end = self.code.offset();
                self.code.patch_jump(to_end, end);
                Pushed::Value
            }
            ("append", [slice, rest @ ..]) => {
                let ty = self.static_type(slice);
                self.emit_expr(slice)?;
                match (ty.is_byte_like(), spread, rest) {
                    (true, true, [tail]) => {
                        self.emit_expr(tail)?;
                        self.code.op(Opcode::CAT);
                    }
                    (true, false, elems) => {
                        self.emit_byte_buffer(elems)?;
                        self.code.op(Opcode::CAT);
                    }
                    (false, false, _) => {
                        self.code.op(Opcode::DUP);
                        self.code.op(Opcode::ISNULL);
                        let not_null = self.code.jump(Opcode::JMPIFNOT_L);
                        self.code.op(Opcode::DROP);
                        self.code.op(Opcode::NEWARRAY0);
                        let end = self.code.offset();
                        self.code.patch_jump(not_null, end);
                        for elem in rest {
                            self.code.op(Opcode::DUP);
                            self.emit_expr(elem)?;
                            self.code.op(Opcode::APPEND);
                        }
                    }
                    _ => return Err(CompileError::Unsupported(format!("append to {}", ty))),
                }
                Pushed::Value
            }
            ("panic", [msg]) if !spread => {
                self.emit_expr(msg)?;
                self.code.op(Opcode::THROW);
                Pushed::Diverges
            }
            ("len" | "append" | "panic", _) => {
                return Err(CompileError::usage(
                    name,
                    format!("unexpected number of arguments: {}", args.len()),
                ));
            }
            _ => return Ok(None),
        };
        Ok(Some(pushed))
    }

    fn type_in(&self, expr: &Expr, scope: &FileScope<'_>, locals: Option<&Frame<'_>>, depth: usize) -> Type {
        if depth > MAX_INFERENCE_DEPTH {
            return Type::Any;
        }
        let local = |name: &str| locals.and_then(|f| f.lookup(name));
        match expr {
            Expr::Int { .. } => Type::Int,
            Expr::Bool { .. } => Type::Bool,
            Expr::Str { .. } => Type::String,
            Expr::Bytes { .. } => Type::ByteSlice,
            Expr::Nil => Type::Any,
            Expr::Ident { name } if local(name).is_some() => local(name).map_or(Type::Any, |s| s.ty.clone()),
            Expr::Ident { .. } | Expr::Selector { .. } => {
                let Some(sym) = self.index.resolve(expr, scope) else {
                    return Type::Any;
                };
                if builtins::interop_constant(&sym.path, &sym.name).is_some() {
                    return Type::Int;
                }
                if let Some(slot) = self.statics.get(&sym) {
                    return slot.ty.clone();
                }
                if let Some(declared) = self.index.globals.get(&sym) {
                    return declared.decl.ty.clone().unwrap_or(Type::Any);
                }
                match self.index.consts.get(&sym) {
                    Some(declared) => match &declared.decl.ty {
                        Some(ty) => ty.clone(),
                        None => {
                            let imports = self.index.imports(&declared.file.imports);
                            let scope = FileScope {
                                package: declared.package,
                                file: &declared.file.name,
                                imports: &imports,
                            };
                            self.type_in(&declared.decl.value, &scope, None, depth + 1)
                        }
                    },
                    None => Type::Any,
                }
            }
            Expr::Call { callee, args, .. } => {
                if matches!(callee.as_ref(), Expr::Ident { name } if local(name).is_some()) {
                    return Type::Any;
                }
                match self.index.resolve(callee, scope) {
                    Some(sym) => match builtins::classify(&sym.path, &sym.name) {
                        Some(builtin) => builtin_result(builtin),
                        None => self
                            .index
                            .funcs
                            .get(&sym)
                            .map_or(Type::Any, |d| d.decl.result.clone()),
                    },
                    None => match (callee.as_ref(), args.first()) {
                        (Expr::Ident { name }, _) if name == "len" => Type::Int,
                        (Expr::Ident { name }, Some(first)) if name == "append" => {
                            self.type_in(first, scope, locals, depth + 1)
                        }
                        (Expr::Ident { name }, _) if name == "panic" => Type::Void,
                        _ => Type::Any,
                    },
                }
            }
            Expr::Convert { ty, .. } | Expr::TypeAssert { ty, .. } | Expr::SliceLit { ty, .. } => ty.clone(),
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or => Type::Bool,
                _ => match self.type_in(lhs, scope, locals, depth + 1) {
                    Type::Any => self.type_in(rhs, scope, locals, depth + 1),
                    ty => ty,
                },
            },
            Expr::Unary { op: UnaryOp::Not, .. } => Type::Bool,
            Expr::Unary { op: UnaryOp::Neg, .. } => Type::Int,
        }
    }
}

impl Lowering for Codegen<'_> {
    fn code(&mut self) -> &mut Emitter {
        &mut self.code
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        Codegen::emit_expr(self, expr)
    }

    fn constancy(&mut self, expr: &Expr) -> Result<Constancy, CompileError> {
        let frame = &self.frame;
        let scope = FileScope {
            package: frame.package,
            file: frame.file,
            imports: &frame.imports,
        };
        self.folder.eval(expr, &scope, &|name| frame.lookup(name).is_some())
    }

    fn static_type(&self, expr: &Expr) -> Type {
        self.type_in(expr, &self.scope(), Some(&self.frame), 0)
    }

    fn method_token(&mut self, token: MethodToken) -> Result<u16, CompileError> {
        let idx = match self.tokens.iter().position(|t| *t == token) {
            Some(idx) => idx,
            None => {
                tracing::debug!(method = %token.method, argc = token.params_count, flags = %token.call_flags, "new method token");
                self.tokens.push(token);
                self.tokens.len() - 1
            }
        };
        u16::try_from(idx).map_err(|_| CompileError::Unsupported("too many method tokens".to_string()))
    }
}

fn builtin_result(builtin: &BuiltinDescriptor) -> Type {
    match (builtin.kind, builtin.symbol) {
        (BuiltinKind::FoldableConversion, _) => Type::Hash160,
        (BuiltinKind::EqualsOverride, _) => Type::Bool,
        (_, "FromHash160") => Type::String,
        (_, "GetAddressVersion") => Type::Int,
        _ if builtin.returns => Type::Any,
        _ => Type::Void,
    }
}

/// Slots needed for the locals declared anywhere in `body`.
fn count_locals(body: &[Stmt]) -> usize {
    body.iter()
        .map(|stmt| match stmt {
            Stmt::Var(_) | Stmt::Define { .. } => 1,
            Stmt::If { then, otherwise, .. } => count_locals(then) + count_locals(otherwise),
            _ => 0,
        })
        .sum()
}

fn display_name(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name } => name.clone(),
        Expr::Selector { package, name } => format!("{}.{}", package, name),
        other => format!("{:?}", other),
    }
}

fn callee_name(expr: &Expr) -> String {
    match expr {
        Expr::Call { callee, .. } => display_name(callee),
        other => display_name(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Param;

    #[test]
    fn test_count_locals_nested() {
        let body = vec![
            Stmt::define("a", Expr::int(1)),
            Stmt::If {
                cond: Expr::bool(true),
                then: vec![Stmt::var("b", Some(Type::Int), None)],
                otherwise: vec![Stmt::define("c", Expr::int(2)), Stmt::define("d", Expr::int(3))],
            },
            Stmt::ret(Expr::ident("a")),
        ];
        assert_eq!(count_locals(&body), 4);
    }

    #[test]
    fn test_builtin_result_types() {
        let from = builtins::classify(builtins::UTIL_PKG, "FromAddress").unwrap();
        assert_eq!(builtin_result(from), Type::Hash160);
        let call = builtins::classify(builtins::CONTRACT_PKG, "Call").unwrap();
        assert_eq!(builtin_result(call), Type::Any);
        let notify = builtins::classify(builtins::RUNTIME_PKG, "Notify").unwrap();
        assert_eq!(builtin_result(notify), Type::Void);
    }

    #[test]
    fn test_single_function_layout() {
        let main = FuncDecl {
            name: "Main".to_string(),
            params: vec![Param {
                name: "n".to_string(),
                ty: Type::Int,
            }],
            result: Type::Int,
            body: vec![Stmt::ret(Expr::binary(BinaryOp::Add, Expr::ident("n"), Expr::int(1)))],
        };
        let file = File {
            name: "foo.go".to_string(),
            package: "foo".to_string(),
            funcs: vec![main],
            ..File::default()
        };
        let unit = CompilationUnit::new(Package::new("example.com/foo", vec![file]));
        let index = UnitIndex::new(&unit);
        let options = CompilerOptions::default();
        let program = Codegen::new(&unit, &index, &options).generate().unwrap();
        assert_eq!(
            program.script,
            vec![
                Opcode::INITSLOT as u8,
                0,
                1,
                Opcode::LDARG as u8,
                0,
                Opcode::PUSH1 as u8,
                Opcode::ADD as u8,
                Opcode::RET as u8,
            ]
        );
        assert_eq!(program.debug.methods[0].end, program.script.len());
        assert!(program.debug.initialize.is_none());
    }
}
