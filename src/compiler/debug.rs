//! Debug information for compiled programs and its manifest projection.

use serde::Serialize;

use crate::compiler::ast::Param;
use crate::compiler::types::Type;
use crate::config::CompilerOptions;
use crate::smartcontract::manifest::{INITIALIZE_METHOD, Method};
use crate::smartcontract::{Manifest, ParamType, Parameter};

/// Debug info for one emitted function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDebugInfo {
    /// Source-level name.
    pub name: String,
    /// Import path of the declaring package.
    pub package: String,
    /// Offset of the first instruction.
    pub start: usize,
    /// Offset one past the last instruction.
    pub end: usize,
    pub params: Vec<Param>,
    pub result: Type,
    /// Exported from the main package, i.e. callable from outside.
    pub exported: bool,
}

impl MethodDebugInfo {
    /// Name under which the method appears in the manifest ABI.
    pub fn abi_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugInfo {
    pub methods: Vec<MethodDebugInfo>,
    /// Offset of the static field initializer, if globals exist.
    pub initialize: Option<usize>,
    pub static_count: usize,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Method containing the instruction at `offset`.
    pub fn method_at(&self, offset: usize) -> Option<&MethodDebugInfo> {
        self.methods.iter().find(|m| (m.start..m.end).contains(&offset))
    }

    pub fn method(&self, name: &str) -> Option<&MethodDebugInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn to_manifest(&self, options: &CompilerOptions) -> Manifest {
        let mut manifest = Manifest::new(options.name.clone());
        manifest.supported_standards = options.supported_standards.clone();
        manifest.permissions = options.permissions.clone();
        manifest.abi.events = options.events.clone();
        manifest.abi.methods = self
            .methods
            .iter()
            .filter(|m| m.exported)
            .map(|m| Method {
                name: m.abi_name(),
                offset: m.start,
                parameters: m
                    .params
                    .iter()
                    .map(|p| Parameter::new(p.name.clone(), p.ty.param_type()))
                    .collect(),
                return_type: m.result.param_type(),
                safe: false,
            })
            .collect();
        if let Some(offset) = self.initialize {
            manifest.abi.methods.push(Method {
                name: INITIALIZE_METHOD.to_string(),
                offset,
                parameters: Vec::new(),
                return_type: ParamType::Void,
                safe: false,
            });
        }
        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smartcontract::Permission;

    fn method(name: &str, start: usize, end: usize, exported: bool) -> MethodDebugInfo {
        MethodDebugInfo {
            name: name.to_string(),
            package: "example.com/foo".to_string(),
            start,
            end,
            params: vec![Param {
                name: "n".to_string(),
                ty: Type::Hash160,
            }],
            result: Type::Int,
            exported,
        }
    }

    #[test]
    fn test_abi_name() {
        assert_eq!(method("CallInner", 0, 1, true).abi_name(), "callInner");
        assert_eq!(method("Get42", 0, 1, true).abi_name(), "get42");
    }

    #[test]
    fn test_to_manifest() {
        let debug = DebugInfo {
            methods: vec![method("Main", 0, 10, true), method("helper", 10, 20, false)],
            initialize: Some(20),
            static_count: 1,
        };
        let options = CompilerOptions {
            name: "Foo".to_string(),
            permissions: vec![Permission::wildcard()],
            ..CompilerOptions::default()
        };
        let manifest = debug.to_manifest(&options);
        assert_eq!(manifest.name, "Foo");
        assert_eq!(manifest.abi.methods.len(), 2);
        let main = manifest.abi.method("main", Some(1)).unwrap();
        assert_eq!(main.parameters[0].ty, ParamType::Hash160);
        assert_eq!(main.return_type, ParamType::Integer);
        assert_eq!(manifest.abi.method(INITIALIZE_METHOD, Some(0)).unwrap().offset, 20);
        assert_eq!(manifest.permissions, vec![Permission::wildcard()]);
    }

    #[test]
    fn test_method_at() {
        let debug = DebugInfo {
            methods: vec![method("Main", 0, 10, true), method("helper", 10, 20, false)],
            ..DebugInfo::default()
        };
        assert_eq!(debug.method_at(12).map(|m| m.name.as_str()), Some("helper"));
        assert!(debug.method_at(20).is_none());
    }
}
