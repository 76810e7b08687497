use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes for the three failure surfaces of the engine.
///
/// ## Taxonomy
/// - **Parse**: the query text could not be tokenised or parsed
/// - **Execution**: the statement is well-formed but cannot be executed
/// - **Plugin**: a data source call failed (I/O, timeout, cancellation)
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    /// PARSE_ERROR: lexer or parser rejected the query text
    Parse,
    /// EXECUTION_ERROR: unknown table, bad SHOW target, invalid cache command
    Execution,
    /// PLUGIN_ERROR: a data source raised during initialise/query/trace
    Plugin,
    /// PLUGIN_CANCELLED: a plugin call was cancelled or timed out
    PluginCancelled,
}

/// High-level error kind, one per exported error surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorKind {
    Parse,
    Execution,
    Plugin,
}

impl ErrorCode {
    /// The wire form of the code (e.g. "PARSE_ERROR").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Parse => "PARSE_ERROR",
            ErrorCode::Execution => "EXECUTION_ERROR",
            ErrorCode::Plugin => "PLUGIN_ERROR",
            ErrorCode::PluginCancelled => "PLUGIN_CANCELLED",
        }
    }

    /// The kind this code belongs to. Cancellation is a plugin-kind failure
    /// with a dedicated code so callers can tell it apart.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::Parse => ErrorKind::Parse,
            ErrorCode::Execution => ErrorKind::Execution,
            ErrorCode::Plugin | ErrorCode::PluginCancelled => ErrorKind::Plugin,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str().to_string()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.as_str() {
            "PARSE_ERROR" => Ok(Self::Parse),
            "EXECUTION_ERROR" => Ok(Self::Execution),
            "PLUGIN_ERROR" => Ok(Self::Plugin),
            "PLUGIN_CANCELLED" => Ok(Self::PluginCancelled),
            other => Err(format!("Unknown error code: {}", other)),
        }
    }
}
