use std::fmt;

use crate::encoding::address::AddressError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventSignatureError {
    #[error("event {0:?} is not declared in the manifest")]
    Unknown(String),
    #[error("event {event:?} expects {expected} arguments, got {found}")]
    Arity {
        event: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{ty} literal must be {expected} bytes long, got {found}")]
    FixedWidthLength {
        ty: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid address {address:?}: {source}")]
    AddressDecode {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("{builtin}: {argument} must be a compile-time constant")]
    BuiltinArgumentConstancy {
        builtin: String,
        argument: &'static str,
    },
    #[error("{builtin}: {reason}")]
    InvalidBuiltinArgument { builtin: String, reason: String },
    #[error(transparent)]
    EventSignature(#[from] EventSignatureError),
    #[error("{builtin}: {reason}")]
    InvalidBuiltinUsage { builtin: String, reason: String },
    #[error("unknown identifier {0}")]
    UnknownIdentifier(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl CompileError {
    pub fn usage(builtin: &str, reason: impl Into<String>) -> Self {
        CompileError::InvalidBuiltinUsage {
            builtin: builtin.to_string(),
            reason: reason.into(),
        }
    }

    pub fn argument(builtin: &str, reason: impl Into<String>) -> Self {
        CompileError::InvalidBuiltinArgument {
            builtin: builtin.to_string(),
            reason: reason.into(),
        }
    }

    pub fn constancy(builtin: &str, argument: &'static str) -> Self {
        CompileError::BuiltinArgumentConstancy {
            builtin: builtin.to_string(),
            argument,
        }
    }
}

/// A compile error with the place it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub function: Option<String>,
    pub error: CompileError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(func) => write!(f, "{}: in {}: {}", self.file, func, self.error),
            None => write!(f, "{}: {}", self.file, self.error),
        }
    }
}

/// Non-empty list of diagnostics produced by a failed compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &CompileError> {
        self.0.iter().map(|d| &d.error)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            file: "foo.go".to_string(),
            function: Some("Main".to_string()),
            error: CompileError::UnknownIdentifier("x".to_string()),
        };
        assert_eq!(d.to_string(), "foo.go: in Main: unknown identifier x");
    }

    #[test]
    fn test_prefix_error_is_distinguishable() {
        let err = CompileError::AddressDecode {
            address: "A".to_string(),
            source: AddressError::InvalidPrefix {
                expected: 0x35,
                found: 0x17,
            },
        };
        assert!(err.to_string().contains("invalid address prefix"));
    }
}
