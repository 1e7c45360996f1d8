//! Compiler configuration.
//!
//! Options are read from a TOML file next to the compilation unit:
//!
//! ```toml
//! name = "Token"
//! address_version = 53
//!
//! [[events]]
//! name = "Transfer"
//! parameters = [{ name = "from", type = "Hash160" }, { name = "amount", type = "Integer" }]
//!
//! [[permissions]]
//! contract = "*"
//! methods = "*"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::encoding::address::DEFAULT_ADDRESS_VERSION;
use crate::smartcontract::{Event, Permission};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse compiler options: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize compiler options: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Options for one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Contract name written to the manifest.
    pub name: String,
    /// Network address version byte used for address folding.
    pub address_version: u8,
    /// Skip event signature checks and argument coercion for `runtime.Notify`.
    pub no_events_check: bool,
    /// Source URL stored in the NEF header.
    pub source_url: String,
    pub supported_standards: Vec<String>,
    pub events: Vec<Event>,
    pub permissions: Vec<Permission>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            name: "Contract".to_string(),
            address_version: DEFAULT_ADDRESS_VERSION,
            no_events_check: false,
            source_url: String::new(),
            supported_standards: Vec::new(),
            events: Vec::new(),
            permissions: Vec::new(),
        }
    }
}

impl CompilerOptions {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }
}
