//! Error types for the schema conversion engine.
//!
//! Only conditions that prevent producing a structurally valid model are
//! errors. Imperfect-but-usable mappings are recorded as
//! [`Issue`](crate::core::Issue)s on the model instead.

use thiserror::Error;

use crate::core::VerificationStatus;

/// Process exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code for unreadable or malformed source schemas.
pub const EXIT_SOURCE_ERROR: u8 = 2;
/// Process exit code for unusable session files.
pub const EXIT_SESSION_ERROR: u8 = 3;
/// Process exit code when the target could not be reached at all.
pub const EXIT_TARGET_ERROR: u8 = 4;
/// Process exit code for cancelled runs.
pub const EXIT_CANCELLED: u8 = 5;
/// Process exit code for file I/O errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Process exit code for anything else.
pub const EXIT_INTERNAL_ERROR: u8 = 10;

/// Main error type for conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source schema malformed or unreadable. Fatal to a conversion from source.
    #[error("Source parse error in {object}: {message}")]
    SourceParse { object: String, message: String },

    /// Live source database error.
    #[error("Source database error: {0}")]
    Source(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Session file was written by a newer format version.
    #[error("Session format version {found} is newer than supported version {supported}")]
    SchemaVersion { found: u32, supported: u32 },

    /// Session file is structurally invalid.
    #[error("Corrupt session file: {0}")]
    CorruptSession(String),

    /// A partial model was offered where a complete one is required.
    #[error("Partial session: {0}")]
    PartialSession(String),

    /// The verification target could not be reached.
    #[error("Target unavailable: {0}")]
    TargetUnavailable(String),

    /// Illegal expression verification status change.
    #[error("Invalid verification transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: VerificationStatus,
        to: VerificationStatus,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Conversion was cancelled (SIGINT, etc.)
    #[error("Conversion cancelled")]
    Cancelled,
}

impl ConvertError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        ConvertError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a SourceParse error for the given source object.
    pub fn source_parse(object: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::SourceParse {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Stable process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::Config(_) | ConvertError::Yaml(_) => EXIT_CONFIG_ERROR,
            ConvertError::SourceParse { .. } | ConvertError::Source(_) | ConvertError::Pool { .. } => {
                EXIT_SOURCE_ERROR
            }
            ConvertError::SchemaVersion { .. }
            | ConvertError::CorruptSession(_)
            | ConvertError::PartialSession(_) => EXIT_SESSION_ERROR,
            ConvertError::TargetUnavailable(_) => EXIT_TARGET_ERROR,
            ConvertError::Cancelled => EXIT_CANCELLED,
            ConvertError::Io(_) => EXIT_IO_ERROR,
            ConvertError::InvalidTransition { .. } | ConvertError::Json(_) => EXIT_INTERNAL_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ConvertError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            ConvertError::source_parse("orders", "bad").exit_code(),
            EXIT_SOURCE_ERROR
        );
        assert_eq!(
            ConvertError::SchemaVersion { found: 9, supported: 1 }.exit_code(),
            EXIT_SESSION_ERROR
        );
        assert_eq!(ConvertError::Cancelled.exit_code(), EXIT_CANCELLED);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(ConvertError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_source_parse_message_names_object() {
        let err = ConvertError::source_parse("statement 3 (CREATE TABLE orders)", "unexpected token");
        let msg = err.to_string();
        assert!(msg.contains("CREATE TABLE orders"));
        assert!(msg.contains("unexpected token"));
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConvertError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: denied"));
    }
}
