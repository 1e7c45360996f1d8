//! The subset of the contract manifest this compiler reads and writes.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::{HASH160_LEN, hash160_to_string};

/// Manifest-level parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Any,
    Boolean,
    Integer,
    ByteArray,
    String,
    Hash160,
    Hash256,
    PublicKey,
    Signature,
    Array,
    Map,
    InteropInterface,
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A declared event signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub offset: usize,
    pub parameters: Vec<Parameter>,
    #[serde(rename = "returntype")]
    pub return_type: ParamType,
    #[serde(default)]
    pub safe: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abi {
    pub methods: Vec<Method>,
    pub events: Vec<Event>,
}

impl Abi {
    /// Find a method by name and parameter count.
    pub fn method(&self, name: &str, param_count: Option<usize>) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| m.name == name && param_count.is_none_or(|n| m.parameters.len() == n))
    }
}

/// Name of the method initializing static fields, run before every entry.
pub const INITIALIZE_METHOD: &str = "_initialize";

/// Wildcard marker used for permission entries.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodList {
    /// Always `"*"`.
    Wildcard(String),
    Names(Vec<String>),
}

/// An outgoing call permission.
///
/// `contract` is either `"*"` or a `0x`-prefixed hex script hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub contract: String,
    pub methods: MethodList,
}

impl Permission {
    pub fn wildcard() -> Self {
        Self {
            contract: WILDCARD.to_string(),
            methods: MethodList::Wildcard(WILDCARD.to_string()),
        }
    }

    pub fn for_contract(hash: &[u8; HASH160_LEN], methods: &[&str]) -> Self {
        Self {
            contract: hash160_to_string(hash),
            methods: MethodList::Names(methods.iter().map(|m| m.to_string()).collect()),
        }
    }

    pub fn allows(&self, hash: &[u8; HASH160_LEN], method: &str) -> bool {
        let contract_ok =
            self.contract == WILDCARD || self.contract.eq_ignore_ascii_case(&hash160_to_string(hash));
        let method_ok = match &self.methods {
            MethodList::Wildcard(w) => w == WILDCARD,
            MethodList::Names(names) => names.iter().any(|n| n == method),
        };
        contract_ok && method_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub supported_standards: Vec<String>,
    pub abi: Abi,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supported_standards: Vec::new(),
            abi: Abi::default(),
            permissions: Vec::new(),
        }
    }

    pub fn can_call(&self, hash: &[u8; HASH160_LEN], method: &str) -> bool {
        self.permissions.iter().any(|p| p.allows(hash, method))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_json() {
        let p = Parameter::new("from", ParamType::Hash160);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"name":"from","type":"Hash160"}"#);
    }

    #[test]
    fn test_wildcard_permission() {
        let p = Permission::wildcard();
        assert!(p.allows(&[7u8; 20], "anything"));
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"contract":"*","methods":"*"}"#);
    }

    #[test]
    fn test_contract_permission() {
        let h = [1u8; 20];
        let p = Permission::for_contract(&h, &["transfer"]);
        assert!(p.allows(&h, "transfer"));
        assert!(!p.allows(&h, "burn"));
        assert!(!p.allows(&[2u8; 20], "transfer"));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let mut m = Manifest::new("Foo");
        m.abi.events.push(Event {
            name: "transfer".to_string(),
            parameters: vec![Parameter::new("amount", ParamType::Integer)],
        });
        m.permissions.push(Permission::wildcard());
        let restored: Manifest = serde_json::from_str(&m.to_json().unwrap()).unwrap();
        assert_eq!(restored, m);
    }
}
