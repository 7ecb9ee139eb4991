//! Error definitions for SpacePython

use thiserror::Error;

/// SpacePython error types
#[derive(Error, Debug)]
pub enum SpsError {
    #[error("Undefined type: {0}")]
    UndefinedType(String),

    #[error("Illegal value for {parameter}: {reason}")]
    IllegalValue { parameter: String, reason: String },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Illegal link: {0}")]
    IllegalLink(String),

    #[error("GEMS error: {0}")]
    Gems(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Verify failed: {0}")]
    Verify(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpsError {
    pub fn illegal_value(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        SpsError::IllegalValue {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        SpsError::Catalog(message.into())
    }
}

/// Result type alias for SpacePython operations
pub type SpsResult<T> = Result<T, SpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpsError::illegal_value("WheelSpeed", "Violates restriction MaxInclusiveR(10000)");
        assert_eq!(
            format!("{}", err),
            "Illegal value for WheelSpeed: Violates restriction MaxInclusiveR(10000)"
        );
    }

    #[test]
    fn test_pattern_error_conversion() {
        let err: SpsError = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, SpsError::Pattern(_)));
    }
}
