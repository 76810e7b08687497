use serde::{Deserialize, Serialize};

/// Structured context attached to an error for programmatic handling.
///
/// Each variant carries the fields relevant to that failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Lexer/parser position for PARSE_ERROR
    Syntax {
        line: usize,
        column: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// EXECUTION_ERROR: the queried table is not in the catalogue
    TableNotFound {
        table: String,
        available_tables: Vec<String>,
    },

    /// EXECUTION_ERROR: the same table name is exported by several sources
    AmbiguousTable { table: String, sources: Vec<String> },

    /// PLUGIN_ERROR: the named source is not registered
    SourceNotFound {
        source: String,
        available_sources: Vec<String>,
    },

    /// PLUGIN_ERROR: which source and operation failed
    Plugin { source: String, operation: String },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}
