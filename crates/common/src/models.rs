use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

// Custom Serde logic for SecretString
fn serialize_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(_) => serializer.serialize_str("[REDACTED]"),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(SecretString::from))
}

/// A single result row: column name to dynamically typed value.
///
/// Row identity is not preserved across relational operators; every operator
/// may rebuild rows freely.
pub type Row = serde_json::Map<String, Value>;

/// Declared type of a catalogued column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One table a data source exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

/// Comparison operator shared by the WHERE grammar and the pushdown wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "BETWEEN")]
    Between,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::NotEq => "!=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
            FilterOp::In => "IN",
            FilterOp::Between => "BETWEEN",
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pushdown predicate handed to a data source.
///
/// `second_value` is populated for BETWEEN only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Options a data source may honour when fetching.
///
/// Sources may ignore any of these; the executor re-applies everything it
/// cannot prove was honoured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<OrderBy>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Fetch-size hint applied when the caller gave no LIMIT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

/// Rows plus column metadata returned from a fetch or a full query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    /// Count observed before pagination and truncation.
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl QueryResult {
    /// A result over the given rows with counts filled in and no metadata.
    pub fn from_rows(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let count = rows.len();
        Self {
            columns,
            rows,
            row_count: count,
            total_count: count,
            execution_time_ms: None,
            source: None,
            truncated: None,
            warning: None,
        }
    }
}

/// One entry in a TRACE result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceHop {
    pub source: String,
    pub table: String,
    /// ISO-8601 UTC instant at which the hop was recorded.
    pub timestamp: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResult {
    pub identifier: String,
    pub value: Value,
    pub hops: Vec<TraceHop>,
    pub total_hops: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeResult {
    pub table: String,
    pub source: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowResult {
    pub what: String,
    pub items: Vec<Value>,
}

/// Aggregate and per-entry statistics of the result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub default_ttl_ms: u64,
    pub per_entry: Vec<CacheEntryStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryStats {
    pub table: String,
    pub hits: u64,
    pub age_ms: u64,
    pub approx_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheControlResult {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStats>,
}

/// Liveness report from one data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
            latency_ms: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            latency_ms: None,
        }
    }
}

/// Registration-time configuration for one data source.
///
/// Everything beyond the addressed fields passes through to the plugin
/// opaquely via `config`.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct SourceConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub source_type: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub password: Option<SecretString>,

    // Flatten other loose config for the owning plugin
    #[serde(flatten)]
    pub config: Value,
}

impl SourceConfig {
    /// A bare config carrying only a name, for sources that need nothing else.
    pub fn named(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            username: None,
            password: None,
            config: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_op_wire_form() {
        let filter = Filter {
            field: "status".to_string(),
            op: FilterOp::NotEq,
            value: Value::String("active".to_string()),
            second_value: None,
        };
        let json = serde_json::to_string(&filter).unwrap();
        assert!(json.contains(r#""op":"!=""#));
        assert!(!json.contains("second_value"));
    }

    #[test]
    fn test_source_config_password_redacted() {
        let cfg = SourceConfig {
            name: "aws".to_string(),
            source_type: "cloud".to_string(),
            username: Some("ops".to_string()),
            password: Some(SecretString::from("hunter2".to_string())),
            config: serde_json::json!({"region": "eu-west-1"}),
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("hunter2"));
        assert!(json.contains("eu-west-1"));
    }

    #[test]
    fn test_query_result_from_rows() {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::from("svc-1"));
        let result = QueryResult::from_rows(
            vec![ColumnInfo::new("id", ColumnType::String)],
            vec![row],
        );
        assert_eq!(result.row_count, 1);
        assert_eq!(result.total_count, 1);
        assert!(result.truncated.is_none());
    }
}
