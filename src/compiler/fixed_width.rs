//! Length checks for literals of fixed-width interop types.

use crate::compiler::ast::{CompilationUnit, Expr, File, Stmt};
use crate::compiler::builtins;
use crate::compiler::error::{CompileError, Diagnostic};
use crate::compiler::types::Type;

/// Check every fixed-width literal in the unit, returning all violations.
pub fn validate(unit: &CompilationUnit) -> Vec<Diagnostic> {
    let mut checker = Checker::default();
    for pkg in unit.packages().filter(|p| !builtins::is_interop_path(&p.path)) {
        for file in &pkg.files {
            checker.file(file);
        }
    }
    checker.diagnostics
}

#[derive(Default)]
struct Checker {
    diagnostics: Vec<Diagnostic>,
}

struct Place<'a> {
    file: &'a str,
    function: Option<&'a str>,
}

impl Checker {
    fn file(&mut self, file: &File) {
        let top = Place {
            file: &file.name,
            function: None,
        };
        for decl in &file.consts {
            self.declared(&top, decl.ty.as_ref(), Some(&decl.value));
            self.expr(&top, &decl.value);
        }
        for decl in &file.vars {
            self.declared(&top, decl.ty.as_ref(), decl.value.as_ref());
            if let Some(value) = &decl.value {
                self.expr(&top, value);
            }
        }
        for func in &file.funcs {
            let place = Place {
                file: &file.name,
                function: Some(&func.name),
            };
            self.block(&place, &func.body);
        }
    }

    fn block(&mut self, place: &Place<'_>, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::Var(decl) => {
                    self.declared(place, decl.ty.as_ref(), decl.value.as_ref());
                    if let Some(value) = &decl.value {
                        self.expr(place, value);
                    }
                }
                Stmt::Define { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr { expr: value } => {
                    self.expr(place, value)
                }
                Stmt::Return { value } => {
                    if let Some(value) = value {
                        self.expr(place, value);
                    }
                }
                Stmt::If { cond, then, otherwise } => {
                    self.expr(place, cond);
                    self.block(place, then);
                    self.block(place, otherwise);
                }
            }
        }
    }

    /// A declaration with an explicit fixed-width type and a bare literal.
    ///
    /// Typed literals such as `interop.Hash160{...}` are checked by `expr`.
    fn declared(&mut self, place: &Place<'_>, ty: Option<&Type>, value: Option<&Expr>) {
        let (Some(ty), Some(value)) = (ty, value) else {
            return;
        };
        let typed_literal = match value {
            Expr::Convert { ty, .. } | Expr::SliceLit { ty, .. } => ty.fixed_width().is_some(),
            _ => false,
        };
        if !typed_literal {
            self.check(place, ty, value);
        }
    }

    fn expr(&mut self, place: &Place<'_>, expr: &Expr) {
        match expr {
            Expr::Convert { ty, expr: inner } => {
                self.check(place, ty, expr);
                self.expr(place, inner);
            }
            Expr::SliceLit { ty, elems } => {
                self.check(place, ty, expr);
                for e in elems {
                    self.expr(place, e);
                }
            }
            Expr::Call { callee, args, .. } => {
                self.expr(place, callee);
                for a in args {
                    self.expr(place, a);
                }
            }
            Expr::TypeAssert { expr, .. } | Expr::Unary { expr, .. } => self.expr(place, expr),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(place, lhs);
                self.expr(place, rhs);
            }
            _ => {}
        }
    }

    fn check(&mut self, place: &Place<'_>, ty: &Type, value: &Expr) {
        let Some(expected) = ty.fixed_width() else {
            return;
        };
        let found = match value {
            Expr::SliceLit { ty, elems } if ty.is_byte_like() => elems.len(),
            _ => match value.literal_bytes() {
                Some(bytes) => bytes.len(),
                None => return,
            },
        };
        if found == expected {
            return;
        }
        let name = match ty {
            Type::Hash160 => "Hash160",
            _ => "Hash256",
        };
        tracing::debug!(file = place.file, ty = name, found, "fixed-width literal rejected");
        self.diagnostics.push(Diagnostic {
            file: place.file.to_string(),
            function: place.function.map(str::to_string),
            error: CompileError::FixedWidthLength {
                ty: name,
                expected,
                found,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{FuncDecl, Package, VarDecl};

    fn unit(file: File) -> CompilationUnit {
        CompilationUnit::new(Package::new("example.com/foo", vec![file]))
    }

    fn main_returning(value: Expr) -> FuncDecl {
        FuncDecl {
            name: "Main".to_string(),
            params: vec![],
            result: Type::Any,
            body: vec![Stmt::ret(value)],
        }
    }

    fn zeros(ty: Type, n: usize) -> Expr {
        Expr::slice(ty, vec![Expr::int(0); n])
    }

    #[test]
    fn test_typed_literal_lengths() {
        for (ty, good, bad) in [(Type::Hash160, 20, 19), (Type::Hash256, 32, 31)] {
            let ok = File {
                name: "foo.go".to_string(),
                funcs: vec![main_returning(zeros(ty.clone(), good))],
                ..File::default()
            };
            assert!(validate(&unit(ok)).is_empty());

            let wrong = File {
                name: "foo.go".to_string(),
                funcs: vec![main_returning(zeros(ty.clone(), bad))],
                ..File::default()
            };
            let diags = validate(&unit(wrong));
            assert_eq!(diags.len(), 1);
            assert_eq!(diags[0].function.as_deref(), Some("Main"));
            assert!(matches!(
                diags[0].error,
                CompileError::FixedWidthLength { expected, found, .. } if expected == good && found == bad
            ));
        }
    }

    #[test]
    fn test_reports_all_violations() {
        let file = File {
            name: "foo.go".to_string(),
            vars: vec![
                VarDecl {
                    name: "a".to_string(),
                    ty: Some(Type::Hash160),
                    value: Some(Expr::str("short")),
                },
                VarDecl {
                    name: "b".to_string(),
                    ty: Some(Type::Hash160),
                    value: None,
                },
            ],
            funcs: vec![FuncDecl {
                name: "Main".to_string(),
                params: vec![],
                result: Type::Void,
                body: vec![Stmt::var(
                    "h",
                    Some(Type::Hash256),
                    Some(Expr::convert(Type::Hash256, Expr::bytes(vec![1; 3]))),
                )],
            }],
            ..File::default()
        };
        let diags = validate(&unit(file));
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].function, None);
        assert_eq!(diags[1].function.as_deref(), Some("Main"));
    }

    #[test]
    fn test_non_literal_is_not_checked() {
        let file = File {
            name: "foo.go".to_string(),
            vars: vec![VarDecl {
                name: "a".to_string(),
                ty: Some(Type::Hash160),
                value: Some(Expr::ident("other")),
            }],
            ..File::default()
        };
        assert!(validate(&unit(file)).is_empty());
    }
}
