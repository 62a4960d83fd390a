//! Error types for tsql2go.

use thiserror::Error;

/// The main error type for lowering operations.
#[derive(Debug, Error)]
pub enum LowerError {
    /// A construct that has no static lowering.
    #[error("Unsupported {construct}: {detail}")]
    Unsupported { construct: String, detail: String },

    /// A cursor used out of its lifecycle state.
    #[error("Cursor '{cursor}': {message}")]
    Cursor { cursor: String, message: String },

    #[error("Undeclared variable: '{0}'")]
    UndeclaredVariable(String),

    #[error("Variable declared twice: '{0}'")]
    DuplicateVariable(String),

    #[error("Unknown type: '{0}'")]
    UnknownType(String),

    /// A DML field that cannot be mapped onto a request message.
    #[error("Cannot map {statement} onto request fields: {reason}")]
    UnmappableField { statement: String, reason: String },

    /// Transaction statement used outside its scope.
    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Wraps an error with the procedure and statement it came from.
    #[error("{procedure}: statement {path}: {source}")]
    InStatement {
        procedure: String,
        path: String,
        #[source]
        source: Box<LowerError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl LowerError {
    /// Create an unsupported-construct error.
    pub fn unsupported(construct: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            detail: detail.into(),
        }
    }

    /// Create a cursor lifecycle error.
    pub fn cursor(cursor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cursor {
            cursor: cursor.into(),
            message: message.into(),
        }
    }

    pub fn unmappable(statement: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnmappableField {
            statement: statement.into(),
            reason: reason.into(),
        }
    }

    /// Attach the procedure name and statement path. Already-located errors
    /// are returned unchanged so the innermost location wins.
    pub fn located(self, procedure: &str, path: &str) -> Self {
        match self {
            located @ Self::InStatement { .. } => located,
            other => Self::InStatement {
                procedure: procedure.to_string(),
                path: path.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error without location wrapping.
    pub fn root(&self) -> &LowerError {
        match self {
            Self::InStatement { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for lowering operations.
pub type LowerResult<T> = Result<T, LowerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LowerError::unsupported("FETCH ABSOLUTE", "only FETCH NEXT can be lowered");
        assert_eq!(
            err.to_string(),
            "Unsupported FETCH ABSOLUTE: only FETCH NEXT can be lowered"
        );
    }

    #[test]
    fn test_located_keeps_innermost() {
        let err = LowerError::cursor("c", "not open")
            .located("dbo.p", "3.1")
            .located("dbo.p", "3");
        assert_eq!(err.to_string(), "dbo.p: statement 3.1: Cursor 'c': not open");
        assert!(matches!(err.root(), LowerError::Cursor { .. }));
    }
}
