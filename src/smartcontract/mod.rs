//! Contract-level formats and native contract references.

pub mod callflag;
pub mod manifest;
pub mod native;
pub mod nef;

pub use callflag::CallFlags;
pub use manifest::{Event, Manifest, ParamType, Parameter, Permission};
pub use nef::{MethodToken, Nef};
