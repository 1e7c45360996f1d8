//! nefc - a NeoVM smart contract compiler back-end
//!
//! Lowers a typed Go syntax tree to a NeoVM script with its method-token
//! table, NEF container and manifest. A small reference engine executes the
//! result.

pub mod compiler;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod logging;
pub mod smartcontract;
pub mod vm;

// Re-export commonly used types
pub use compiler::{CompilationUnit, Diagnostics, Program, compile};
pub use config::CompilerOptions;
pub use smartcontract::{Manifest, Nef};
pub use vm::{Engine, StackItem};
