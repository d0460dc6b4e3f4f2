//! Library error type.
//!
//! Retrieval itself never fails on content: an empty match set is an empty
//! result. The only errors are upstream ones, when the reference document or
//! the rule list cannot be produced. They are `Clone` so that one failed cache
//! build can be handed to every caller that was waiting on it.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by sources and the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The source could not be read at all (missing file, I/O failure,
    /// failed text extraction, empty document).
    #[error("{name} unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    /// The source was read but its content could not be decoded.
    #[error("{name} is not valid: {reason}")]
    InvalidSource { name: String, reason: String },
}

impl Error {
    /// Create a source-unavailable error
    pub fn unavailable(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid-source error
    pub fn invalid(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidSource {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// A planet or sign name that is not in the synonym tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: '{name}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_source() {
        let err = Error::unavailable("document", "no such file");
        assert_eq!(err.to_string(), "document unavailable: no such file");

        let err = Error::invalid("rules", "expected an array");
        assert_eq!(err.to_string(), "rules is not valid: expected an array");
    }
}
