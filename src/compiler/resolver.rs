//! Maps source-level names back to canonical package symbols.

use std::collections::HashMap;
use std::fmt;

use crate::compiler::ast::{CompilationUnit, ConstDecl, Expr, File, FuncDecl, Import, VarDecl};
use crate::compiler::builtins;

/// Canonical reference to a package-level symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub path: String,
    pub name: String,
}

impl Symbol {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.path, self.name)
    }
}

/// Import declarations of one file.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    aliases: HashMap<String, String>,
    dot: Vec<String>,
}

impl ImportTable {
    /// Table binding default imports to the last path segment.
    pub fn new(imports: &[Import]) -> Self {
        Self::with_names(imports, |_| None)
    }

    /// Table binding default imports to the name `package_name` reports for
    /// the path, or to the last path segment when it reports none.
    pub fn with_names<'n>(imports: &[Import], package_name: impl Fn(&str) -> Option<&'n str>) -> Self {
        let mut table = Self::default();
        for import in imports {
            match import.alias.as_deref() {
                Some(".") => table.dot.push(import.path.clone()),
                Some("_") => {}
                Some(alias) => {
                    table.aliases.insert(alias.to_string(), import.path.clone());
                }
                None => {
                    let name = match package_name(&import.path) {
                        Some(name) => name.to_string(),
                        None => import.path.rsplit('/').next().unwrap_or(&import.path).to_string(),
                    };
                    table.aliases.insert(name, import.path.clone());
                }
            }
        }
        table
    }

    /// Import path bound to a local package name.
    pub fn path_of(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub fn dot_imports(&self) -> &[String] {
        &self.dot
    }
}

/// Where a name is looked up from: a file of some package.
#[derive(Debug, Clone, Copy)]
pub struct FileScope<'a> {
    pub package: &'a str,
    pub file: &'a str,
    pub imports: &'a ImportTable,
}

#[derive(Debug)]
pub struct Declared<'u, T> {
    pub decl: &'u T,
    pub file: &'u File,
    pub package: &'u str,
}

impl<T> Clone for Declared<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Declared<'_, T> {}

/// Package-level declarations of every package in a unit.
#[derive(Debug, Default)]
pub struct UnitIndex<'u> {
    pub funcs: HashMap<Symbol, Declared<'u, FuncDecl>>,
    pub consts: HashMap<Symbol, Declared<'u, ConstDecl>>,
    pub globals: HashMap<Symbol, Declared<'u, VarDecl>>,
    /// Declared package name per import path.
    pub names: HashMap<&'u str, &'u str>,
}

impl<'u> UnitIndex<'u> {
    pub fn new(unit: &'u CompilationUnit) -> Self {
        let mut index = Self::default();
        for pkg in unit.packages() {
            if let Some(file) = pkg.files.first() {
                index.names.insert(pkg.path.as_str(), file.package.as_str());
            }
            for file in &pkg.files {
                let at = |name: &str| Symbol::new(pkg.path.as_str(), name);
                for decl in &file.funcs {
                    index.funcs.insert(at(&decl.name), Declared { decl, file, package: &pkg.path });
                }
                for decl in &file.consts {
                    index.consts.insert(at(&decl.name), Declared { decl, file, package: &pkg.path });
                }
                for decl in &file.vars {
                    index.globals.insert(at(&decl.name), Declared { decl, file, package: &pkg.path });
                }
            }
        }
        index
    }

    /// Import table of a file, with default imports of packages in the unit
    /// bound to their declared names.
    pub fn imports(&self, imports: &[Import]) -> ImportTable {
        ImportTable::with_names(imports, |path| self.names.get(path).copied())
    }

    pub fn declares(&self, sym: &Symbol) -> bool {
        self.funcs.contains_key(sym) || self.consts.contains_key(sym) || self.globals.contains_key(sym)
    }

    /// Resolve a package-level reference to its canonical symbol.
    ///
    /// Local variables must be handled by the caller first. Returns `None` when
    /// the name is neither declared in the package nor reachable through an
    /// import.
    pub fn resolve(&self, expr: &Expr, scope: &FileScope<'_>) -> Option<Symbol> {
        match expr {
            Expr::Selector { package, name } => scope
                .imports
                .path_of(package)
                .map(|path| Symbol::new(path, name.as_str())),
            Expr::Ident { name } => {
                let own = Symbol::new(scope.package, name.as_str());
                if self.declares(&own) {
                    return Some(own);
                }
                scope
                    .imports
                    .dot_imports()
                    .iter()
                    .map(|path| Symbol::new(path.as_str(), name.as_str()))
                    .find(|sym| {
                        builtins::classify(&sym.path, &sym.name).is_some()
                            || builtins::interop_constant(&sym.path, &sym.name).is_some()
                            || self.declares(sym)
                    })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Package;
    use crate::compiler::builtins::{CONTRACT_PKG, UTIL_PKG};

    fn scope_for(imports: &ImportTable) -> FileScope<'_> {
        FileScope {
            package: "example.com/foo",
            file: "foo.go",
            imports,
        }
    }

    #[test]
    fn test_default_and_renamed_imports() {
        let table = ImportTable::new(&[Import::new(UTIL_PKG), Import::aliased(CONTRACT_PKG, "ee")]);
        assert_eq!(table.path_of("util"), Some(UTIL_PKG));
        assert_eq!(table.path_of("ee"), Some(CONTRACT_PKG));
        assert_eq!(table.path_of("contract"), None);
    }

    #[test]
    fn test_resolve_through_alias() {
        let unit = CompilationUnit::new(Package::new("example.com/foo", vec![]));
        let index = UnitIndex::new(&unit);
        let table = ImportTable::new(&[Import::aliased(UTIL_PKG, "uu")]);
        let sym = index.resolve(&Expr::selector("uu", "FromAddress"), &scope_for(&table));
        assert_eq!(sym, Some(Symbol::new(UTIL_PKG, "FromAddress")));
        assert_eq!(index.resolve(&Expr::selector("util", "FromAddress"), &scope_for(&table)), None);
    }

    #[test]
    fn test_default_import_uses_declared_package_name() {
        let dep = File {
            name: "lib.go".to_string(),
            package: "helpers".to_string(),
            consts: vec![ConstDecl {
                name: "Answer".to_string(),
                ty: None,
                value: Expr::int(42),
            }],
            ..File::default()
        };
        let mut unit = CompilationUnit::new(Package::new("example.com/foo", vec![]));
        unit.dependencies.push(Package::new("example.com/foo/go-helpers", vec![dep]));
        let index = UnitIndex::new(&unit);
        let table = index.imports(&[Import::new("example.com/foo/go-helpers"), Import::new(UTIL_PKG)]);
        assert_eq!(
            index.resolve(&Expr::selector("helpers", "Answer"), &scope_for(&table)),
            Some(Symbol::new("example.com/foo/go-helpers", "Answer"))
        );
        assert_eq!(table.path_of("go-helpers"), None);
        assert_eq!(table.path_of("util"), Some(UTIL_PKG));
    }

    #[test]
    fn test_resolve_dot_import() {
        let unit = CompilationUnit::new(Package::new("example.com/foo", vec![]));
        let index = UnitIndex::new(&unit);
        let table = ImportTable::new(&[Import::aliased(CONTRACT_PKG, ".")]);
        assert_eq!(
            index.resolve(&Expr::ident("All"), &scope_for(&table)),
            Some(Symbol::new(CONTRACT_PKG, "All"))
        );
        assert_eq!(index.resolve(&Expr::ident("Nope"), &scope_for(&table)), None);
    }

    #[test]
    fn test_own_declaration_wins() {
        let file = File {
            name: "foo.go".to_string(),
            package: "foo".to_string(),
            funcs: vec![FuncDecl {
                name: "Call".to_string(),
                params: vec![],
                result: crate::compiler::types::Type::Void,
                body: vec![],
            }],
            ..File::default()
        };
        let unit = CompilationUnit::new(Package::new("example.com/foo", vec![file]));
        let index = UnitIndex::new(&unit);
        let table = ImportTable::new(&[Import::aliased(CONTRACT_PKG, ".")]);
        assert_eq!(
            index.resolve(&Expr::ident("Call"), &scope_for(&table)),
            Some(Symbol::new("example.com/foo", "Call"))
        );
    }
}
