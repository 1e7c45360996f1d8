//! Syntax tree handed over by the front-end.
//!
//! Types are already resolved by the front-end; the tree is read as JSON.

use serde::{Deserialize, Serialize};

use crate::compiler::types::Type;

/// A main package together with the packages it depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub main: Package,
    #[serde(default)]
    pub dependencies: Vec<Package>,
}

impl CompilationUnit {
    pub fn new(main: Package) -> Self {
        Self {
            main,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, package: Package) -> Self {
        self.dependencies.push(package);
        self
    }

    /// Main package first, then dependencies in declaration order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        std::iter::once(&self.main).chain(self.dependencies.iter())
    }

    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages().find(|p| p.path == path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Full import path.
    pub path: String,
    pub files: Vec<File>,
}

impl Package {
    pub fn new(path: impl Into<String>, files: Vec<File>) -> Self {
        Self {
            path: path.into(),
            files,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    /// Declared package name.
    pub package: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub consts: Vec<ConstDecl>,
    #[serde(default)]
    pub vars: Vec<VarDecl>,
    #[serde(default)]
    pub funcs: Vec<FuncDecl>,
}

/// An import declaration.
///
/// `alias` is `None` for a default import, `Some(".")` for a dot-import and
/// `Some(name)` for a renamed import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub path: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Import {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: None,
        }
    }

    pub fn aliased(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: Some(alias.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    #[serde(default)]
    pub ty: Option<Type>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    #[serde(default)]
    pub ty: Option<Type>,
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "void")]
    pub result: Type,
    pub body: Vec<Stmt>,
}

fn void() -> Type {
    Type::Void
}

impl FuncDecl {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Int {
        value: i64,
    },
    Bool {
        value: bool,
    },
    Str {
        value: String,
    },
    Bytes {
        value: Vec<u8>,
    },
    Nil,
    Ident {
        name: String,
    },
    /// `pkg.Name`
    Selector {
        package: String,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
        /// Last argument is spread with `...`.
        #[serde(default)]
        spread: bool,
    },
    Convert {
        ty: Type,
        expr: Box<Expr>,
    },
    /// `x.(T)`, a no-op at runtime.
    TypeAssert {
        expr: Box<Expr>,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// `T{a, b, c}` where `T` is a slice type.
    SliceLit {
        ty: Type,
        #[serde(default)]
        elems: Vec<Expr>,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Int { value }
    }

    pub fn bool(value: bool) -> Self {
        Expr::Bool { value }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Str {
            value: value.into(),
        }
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Expr::Bytes {
            value: value.into(),
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident { name: name.into() }
    }

    pub fn selector(package: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Selector {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            spread: false,
        }
    }

    pub fn call_spread(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            spread: true,
        }
    }

    pub fn convert(ty: Type, expr: Expr) -> Self {
        Expr::Convert {
            ty,
            expr: Box::new(expr),
        }
    }

    pub fn assert(expr: Expr, ty: Type) -> Self {
        Expr::TypeAssert {
            expr: Box::new(expr),
            ty,
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn slice(ty: Type, elems: Vec<Expr>) -> Self {
        Expr::SliceLit { ty, elems }
    }

    /// Literal byte content of a string, byte or byte-slice literal.
    pub fn literal_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Expr::Str { value } => Some(value.as_bytes().to_vec()),
            Expr::Bytes { value } => Some(value.clone()),
            Expr::SliceLit { ty, elems } if ty.is_byte_like() => elems
                .iter()
                .map(|e| match e {
                    Expr::Int { value } => u8::try_from(*value).ok(),
                    _ => None,
                })
                .collect(),
            Expr::Convert { expr, .. } => expr.literal_bytes(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    /// `var name T = value`
    Var(VarDecl),
    /// `name := value`
    Define { name: String, value: Expr },
    Assign { name: String, value: Expr },
    Expr { expr: Expr },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn var(name: impl Into<String>, ty: Option<Type>, value: Option<Expr>) -> Self {
        Stmt::Var(VarDecl {
            name: name.into(),
            ty,
            value,
        })
    }

    pub fn define(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Define {
            name: name.into(),
            value,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr { expr }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return { value: Some(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_json() {
        let e = Expr::call(Expr::selector("util", "FromAddress"), vec![Expr::str("N")]);
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains(r#""kind":"call""#));
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_func_defaults() {
        let f: FuncDecl = serde_json::from_str(r#"{"name":"Main","body":[]}"#).unwrap();
        assert_eq!(f.result, Type::Void);
        assert!(f.is_exported());
    }

    #[test]
    fn test_literal_bytes() {
        let lit = Expr::slice(Type::Hash160, vec![Expr::int(1), Expr::int(2)]);
        assert_eq!(lit.literal_bytes(), Some(vec![1, 2]));
        let wrapped = Expr::convert(Type::ByteSlice, Expr::str("ab"));
        assert_eq!(wrapped.literal_bytes(), Some(b"ab".to_vec()));
        assert_eq!(Expr::ident("x").literal_bytes(), None);
    }
}
