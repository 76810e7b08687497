//! # scout-error
//!
//! Unified error types for the Scout infrastructure query engine.
//!
//! Every failure carries:
//! - A stable code (`PARSE_ERROR`, `EXECUTION_ERROR`, `PLUGIN_ERROR`,
//!   `PLUGIN_CANCELLED`)
//! - Structured JSON context
//! - The originating cause, preserved through [`std::error::Error::source`]

mod code;
mod context;

pub use code::{ErrorCode, ErrorKind};
pub use context::ErrorContext;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The unified error type for all Scout operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutError {
    /// Stable error code (e.g. "PARSE_ERROR")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Actionable suggestion for the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// The originating error, kept out of the wire form but reachable
    /// through the standard source chain.
    #[serde(skip)]
    cause: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ScoutError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
            cause: None,
        }
    }

    /// A parse-kind error (lexer or parser rejection)
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Parse, message)
    }

    /// An execution-kind error (unknown table, invalid command arguments)
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Execution, message)
    }

    /// A plugin-kind error (data source failure)
    pub fn plugin(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Plugin, message)
    }

    /// A cancellation or timeout of a plugin call
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PluginCancelled, message)
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add an actionable hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Preserve the originating error as the source of this one
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Whether this error represents a cancelled or timed-out plugin call
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::PluginCancelled
    }

    /// Serialize to JSON for API responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize ScoutError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }
}

impl fmt::Display for ScoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for ScoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| &**c as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias for Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scout_error_builder() {
        let err = ScoutError::execution("Table not found")
            .with_hint("Run SHOW TABLES")
            .with_context(ErrorContext::TableNotFound {
                table: "pods".to_string(),
                available_tables: vec!["services".to_string()],
            });

        assert_eq!(err.code, ErrorCode::Execution);
        assert_eq!(err.message, "Table not found");
        assert_eq!(err.hint, Some("Run SHOW TABLES".to_string()));
        assert!(err.context.is_some());
    }

    #[test]
    fn test_display_implementation() {
        let err = ScoutError::parse("Unexpected token").with_hint("Remove comma");
        assert_eq!(
            err.to_string(),
            "[PARSE_ERROR] Unexpected token (Hint: Remove comma)"
        );

        let err_no_hint = ScoutError::plugin("Connection refused");
        assert_eq!(err_no_hint.to_string(), "[PLUGIN_ERROR] Connection refused");
    }

    #[test]
    fn test_cause_chain_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = ScoutError::plugin("Query failed for plugin 'aws'").with_cause(io);

        let source = std::error::Error::source(&err).expect("cause should be preserved");
        assert!(source.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_json_output_omits_cause() {
        let io = std::io::Error::other("boom");
        let err = ScoutError::plugin("fetch failed").with_cause(io);
        let json = err.to_json();

        assert!(json.contains("\"code\":\"PLUGIN_ERROR\""));
        assert!(json.contains("\"message\":\"fetch failed\""));
        assert!(!json.contains("boom"));
    }
}
