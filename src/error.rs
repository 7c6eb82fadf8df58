//! Error types for cqt.

use thiserror::Error;

/// The main error type for command tree compilation.
#[derive(Debug, Error)]
pub enum CqtError {
    /// The tree contains a construct with no SQL equivalent.
    #[error("Unsupported construct: {0}")]
    Unsupported(String),

    /// A numeric literal that SQL Server cannot represent.
    #[error("Invalid {kind} literal: {reason}")]
    InvalidLiteral { kind: &'static str, reason: &'static str },

    /// More than one key column of the target has no known value after an insert.
    #[error("Table '{table}' has more than one server-generated key column; only one can be recovered")]
    ServerGeneratedKey { table: String },

    /// Identity recovery requested on a key whose store type cannot hold an identity.
    #[error("Key column '{column}' of store type '{store_type}' cannot be recovered with scope_identity()")]
    IdentityType { column: String, store_type: String },

    /// The legacy dialect cannot express this construct.
    #[error("Not supported on the legacy dialect: {0}")]
    LegacyDialect(String),

    /// DML against an entity set that is mapped to a defining query.
    #[error("Entity set '{set}' is mapped to a defining query; {operation} requires a modification function")]
    DefiningQueryTarget { set: String, operation: &'static str },

    /// A DML batch mixes target tables.
    #[error("DML batch targets must be the same table: expected {expected}, found {found}")]
    MixedBatchTarget { expected: String, found: String },

    /// A compiler invariant broke. Always a bug in the compiler, never in the input.
    #[error("Internal compiler error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CqtError {
    /// Create an unsupported-construct error.
    pub fn unsupported(construct: impl Into<String>) -> Self {
        Self::Unsupported(construct.into())
    }

    /// Create an internal invariant error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the error signals a compiler bug rather than a provider limitation.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// Result type alias for cqt operations.
pub type CqtResult<T> = Result<T, CqtError>;
