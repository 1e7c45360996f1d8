pub mod ast;
pub mod builtins;
pub mod call;
mod codegen;
pub mod constant;
pub mod debug;
pub mod error;
pub mod fixed_width;
pub mod notify;
pub mod resolver;
pub mod types;

pub use ast::CompilationUnit;
pub use codegen::Codegen;
pub use debug::DebugInfo;
pub use error::{CompileError, Diagnostic, Diagnostics};

use std::path::Path;

use crate::config::CompilerOptions;
use crate::smartcontract::nef::NefError;
use crate::smartcontract::{Manifest, MethodToken, Nef};
use resolver::UnitIndex;

/// Compiler identification written to NEF headers.
pub const COMPILER_NAME: &str = concat!("nefc-", env!("CARGO_PKG_VERSION"));

/// Output of a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub script: Vec<u8>,
    pub tokens: Vec<MethodToken>,
    pub debug: DebugInfo,
}

impl Program {
    pub fn to_nef(&self, source_url: &str) -> Result<Nef, NefError> {
        Nef::new(COMPILER_NAME, source_url, self.tokens.clone(), self.script.clone())
    }

    pub fn manifest(&self, options: &CompilerOptions) -> Manifest {
        self.debug.to_manifest(options)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid compilation unit: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a compilation unit produced by the front-end.
pub fn load_unit(path: &Path) -> Result<CompilationUnit, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Compile a unit to a script.
///
/// Fixed-width literal checks run over the whole unit first and report every
/// violation; after that the first error stops compilation.
pub fn compile(unit: &CompilationUnit, options: &CompilerOptions) -> Result<Program, Diagnostics> {
    let _span = tracing::debug_span!("compile", package = %unit.main.path).entered();

    // Literal validation
    let violations = fixed_width::validate(unit);
    if !violations.is_empty() {
        return Err(Diagnostics(violations));
    }

    // Declarations
    let index = UnitIndex::new(unit);

    // Code generation
    let program = Codegen::new(unit, &index, options)
        .generate()
        .map_err(|d| Diagnostics(vec![d]))?;
    tracing::info!(
        package = %unit.main.path,
        size = program.script.len(),
        tokens = program.tokens.len(),
        "compiled"
    );
    Ok(program)
}

/// Compile without producing output.
pub fn check(unit: &CompilationUnit, options: &CompilerOptions) -> Result<(), Diagnostics> {
    compile(unit, options).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{File, FuncDecl, Package, Stmt};
    use crate::compiler::types::Type;

    #[test]
    fn test_nef_carries_compiler_name() {
        let file = File {
            name: "foo.go".to_string(),
            package: "foo".to_string(),
            funcs: vec![FuncDecl {
                name: "Main".to_string(),
                params: vec![],
                result: Type::Int,
                body: vec![Stmt::ret(ast::Expr::int(42))],
            }],
            ..File::default()
        };
        let unit = CompilationUnit::new(Package::new("example.com/foo", vec![file]));
        let program = compile(&unit, &CompilerOptions::default()).unwrap();
        let nef = program.to_nef("foo.go").unwrap();
        assert!(nef.compiler.starts_with("nefc-"));
        assert_eq!(nef.script, program.script);
        let manifest = program.manifest(&CompilerOptions::default());
        assert!(manifest.abi.method("main", Some(0)).is_some());
    }
}
