#![allow(dead_code)]

use nefc::compiler::ast::{ConstDecl, Expr, File, FuncDecl, Import, Package, Param, Stmt, VarDecl};
use nefc::compiler::types::Type;
use nefc::compiler::{self, CompilationUnit, Diagnostics, Program};
use nefc::config::CompilerOptions;
use nefc::encoding::address::DEFAULT_ADDRESS_VERSION;
use nefc::smartcontract::Permission;
use nefc::vm::engine::{Hash160, VmError};
use nefc::vm::{Engine, StackItem};

pub const MAIN_PKG: &str = "example.com/foo";

pub fn func(name: &str, params: Vec<Param>, result: Type, body: Vec<Stmt>) -> FuncDecl {
    FuncDecl {
        name: name.to_string(),
        params,
        result,
        body,
    }
}

pub fn param(name: &str, ty: Type) -> Param {
    Param {
        name: name.to_string(),
        ty,
    }
}

pub fn konst(name: &str, value: Expr) -> ConstDecl {
    ConstDecl {
        name: name.to_string(),
        ty: None,
        value,
    }
}

pub fn global(name: &str, ty: Option<Type>, value: Option<Expr>) -> VarDecl {
    VarDecl {
        name: name.to_string(),
        ty,
        value,
    }
}

pub fn file(imports: Vec<Import>, funcs: Vec<FuncDecl>) -> File {
    File {
        name: "foo.go".to_string(),
        package: "foo".to_string(),
        imports,
        funcs,
        ..File::default()
    }
}

pub fn unit(file: File) -> CompilationUnit {
    CompilationUnit::new(Package::new(MAIN_PKG, vec![file]))
}

/// `pkg.Name(args...)`
pub fn call(pkg: &str, name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::selector(pkg, name), args)
}

/// `[]byte{...}` literal.
pub fn byte_slice(bytes: &[u8]) -> Expr {
    Expr::slice(Type::ByteSlice, bytes.iter().map(|b| Expr::int(*b as i64)).collect())
}

pub fn options() -> CompilerOptions {
    CompilerOptions {
        permissions: vec![Permission::wildcard()],
        ..CompilerOptions::default()
    }
}

pub fn compile_ok(unit: &CompilationUnit, options: &CompilerOptions) -> Program {
    match compiler::compile(unit, options) {
        Ok(program) => program,
        Err(diags) => panic!("compilation should succeed:\n{}", diags),
    }
}

pub fn compile_err(unit: &CompilationUnit, options: &CompilerOptions) -> Diagnostics {
    match compiler::compile(unit, options) {
        Ok(_) => panic!("compilation should fail"),
        Err(diags) => diags,
    }
}

pub fn deploy_with(engine: &mut Engine, unit: &CompilationUnit, options: &CompilerOptions) -> Hash160 {
    let program = compile_ok(unit, options);
    let nef = program.to_nef("").unwrap();
    engine.deploy(nef, program.manifest(options)).unwrap()
}

pub fn deploy(engine: &mut Engine, unit: &CompilationUnit) -> Hash160 {
    deploy_with(engine, unit, &options())
}

pub fn engine() -> Engine {
    Engine::new(DEFAULT_ADDRESS_VERSION)
}

/// Compile, deploy and invoke `method` on a fresh engine.
pub fn run(unit: &CompilationUnit, method: &str, args: Vec<StackItem>) -> Result<StackItem, VmError> {
    let mut engine = engine();
    let hash = deploy(&mut engine, unit);
    engine.call(&hash, method, args)
}

/// Single-file contract with an exported `Main`.
pub fn run_main(imports: Vec<Import>, result: Type, body: Vec<Stmt>) -> Result<StackItem, VmError> {
    run(&unit(file(imports, vec![func("Main", vec![], result, body)])), "main", vec![])
}
