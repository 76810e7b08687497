//! Synthetic data source with a fixed three-table inventory.
//!
//! Serves as the reference fixture for the engine test suite and as a
//! worked example of the [`DataSource`] contract: it honours equality
//! pushdown and the `max_results` hint, implements TRACE over the
//! `service_id` linkage, and reports health with a synthetic latency.

use crate::DataSource;
use async_trait::async_trait;
use scout_common::context::QueryContext;
use scout_common::models::{
    ColumnInfo, ColumnType, Filter, FilterOp, HealthStatus, QueryOptions, QueryResult, Row,
    SourceConfig, TableInfo, TraceHop,
};
use scout_error::{Result, ScoutError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

pub const MOCK_SOURCE_NAME: &str = "mock";

pub struct MockSource {
    initialized: AtomicBool,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
        }
    }

    fn services() -> Vec<Value> {
        vec![
            json!({
                "id": "svc-1",
                "name": "api-gateway",
                "environment": "production",
                "version": "2.3.1",
                "status": "active",
                "cpu_usage": 42.5,
                "memory_usage": 512.0,
                "created_at": "2024-11-02T08:15:00Z",
            }),
            json!({
                "id": "svc-2",
                "name": "auth-service",
                "environment": "production",
                "version": "1.9.0",
                "status": "active",
                "cpu_usage": 61.2,
                "memory_usage": 768.0,
                "created_at": "2024-11-02T08:20:00Z",
            }),
            json!({
                "id": "svc-3",
                "name": "data-processor",
                "environment": "staging",
                "version": "0.8.4",
                "status": "degraded",
                "cpu_usage": 88.9,
                "memory_usage": 2048.0,
                "created_at": "2024-11-02T08:25:00Z",
            }),
        ]
    }

    fn deployments() -> Vec<Value> {
        vec![
            json!({
                "id": "dep-1",
                "service_id": "svc-1",
                "replicas": 2,
                "image": "registry.internal/api-gateway:2.3.1",
                "status": "rolled_out",
                "deployed_at": "2024-12-18T14:02:00Z",
            }),
            json!({
                "id": "dep-2",
                "service_id": "svc-2",
                "replicas": 3,
                "image": "registry.internal/auth-service:1.9.0",
                "status": "rolled_out",
                "deployed_at": "2024-12-18T14:06:00Z",
            }),
            json!({
                "id": "dep-3",
                "service_id": "svc-3",
                "replicas": 1,
                "image": "registry.internal/data-processor:0.8.4",
                "status": "progressing",
                "deployed_at": "2024-12-18T14:11:00Z",
            }),
        ]
    }

    fn incidents() -> Vec<Value> {
        vec![
            json!({
                "id": "inc-1",
                "service_id": "svc-3",
                "severity": "warning",
                "status": "open",
                "summary": "Elevated processing lag",
                "created_at": "2025-01-09T03:44:00Z",
            }),
            json!({
                "id": "inc-2",
                "service_id": "svc-1",
                "severity": "critical",
                "status": "resolved",
                "summary": "Gateway 5xx spike",
                "created_at": "2025-01-11T17:30:00Z",
            }),
        ]
    }

    fn rows_for(table: &str) -> Option<Vec<Value>> {
        match table {
            "services" => Some(Self::services()),
            "deployments" => Some(Self::deployments()),
            "incidents" => Some(Self::incidents()),
            _ => None,
        }
    }

    fn columns_for(table: &str) -> Vec<ColumnInfo> {
        let layout: &[(&str, ColumnType)] = match table {
            "services" => &[
                ("id", ColumnType::String),
                ("name", ColumnType::String),
                ("environment", ColumnType::String),
                ("version", ColumnType::String),
                ("status", ColumnType::String),
                ("cpu_usage", ColumnType::Number),
                ("memory_usage", ColumnType::Number),
                ("created_at", ColumnType::Date),
            ],
            "deployments" => &[
                ("id", ColumnType::String),
                ("service_id", ColumnType::String),
                ("replicas", ColumnType::Number),
                ("image", ColumnType::String),
                ("status", ColumnType::String),
                ("deployed_at", ColumnType::Date),
            ],
            "incidents" => &[
                ("id", ColumnType::String),
                ("service_id", ColumnType::String),
                ("severity", ColumnType::String),
                ("status", ColumnType::String),
                ("summary", ColumnType::String),
                ("created_at", ColumnType::Date),
            ],
            _ => &[],
        };
        layout
            .iter()
            .map(|(name, ty)| ColumnInfo::new(*name, *ty))
            .collect()
    }

    /// Equality-style filters this source chooses to honour. Everything
    /// else is left for the executor to re-apply.
    fn honours(filter: &Filter) -> bool {
        matches!(filter.op, FilterOp::Eq | FilterOp::NotEq | FilterOp::In)
    }

    fn filter_matches(filter: &Filter, row: &Row) -> bool {
        let Some(actual) = row.get(&filter.field) else {
            return false;
        };
        match filter.op {
            FilterOp::Eq => actual == &filter.value,
            FilterOp::NotEq => actual != &filter.value,
            FilterOp::In => filter
                .value
                .as_array()
                .map(|list| list.contains(actual))
                .unwrap_or(false),
            _ => true,
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn name(&self) -> &str {
        MOCK_SOURCE_NAME
    }

    async fn initialize(&self, _config: &SourceConfig) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn tables(&self) -> Result<Vec<TableInfo>> {
        Ok(["services", "deployments", "incidents"]
            .iter()
            .map(|table| TableInfo {
                name: table.to_string(),
                description: Some(format!("Synthetic {} inventory", table)),
                columns: Self::columns_for(table),
                row_count: Self::rows_for(table).map(|rows| rows.len() as u64),
            })
            .collect())
    }

    async fn query(
        &self,
        table: &str,
        filters: &[Filter],
        options: &QueryOptions,
        ctx: &QueryContext,
    ) -> Result<QueryResult> {
        if ctx.is_cancelled() {
            return Err(ScoutError::cancelled("Query cancelled before mock fetch"));
        }
        let rows = Self::rows_for(table).ok_or_else(|| {
            ScoutError::plugin(format!("Mock source has no table '{}'", table))
        })?;

        let honoured: Vec<&Filter> = filters.iter().filter(|f| Self::honours(f)).collect();
        let mut rows: Vec<Row> = rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .filter(|row| honoured.iter().all(|f| Self::filter_matches(f, row)))
            .collect();

        let total = rows.len();
        if let Some(cap) = options.max_results {
            rows.truncate(cap);
        }

        let mut result = QueryResult::from_rows(Self::columns_for(table), rows);
        result.total_count = total;
        result.source = Some(MOCK_SOURCE_NAME.to_string());
        Ok(result)
    }

    fn supports_trace(&self) -> bool {
        true
    }

    async fn trace(
        &self,
        identifier: &str,
        value: &Value,
        ctx: &QueryContext,
    ) -> Result<Vec<TraceHop>> {
        if ctx.is_cancelled() {
            return Err(ScoutError::cancelled("Trace cancelled before mock scan"));
        }

        // `service_id` is the linking key: services expose it as `id`,
        // the other tables carry it verbatim.
        let mut hops = Vec::new();
        for (table, timestamp_field) in [
            ("services", "created_at"),
            ("deployments", "deployed_at"),
            ("incidents", "created_at"),
        ] {
            let key = if table == "services" && identifier.ends_with("_id") {
                "id"
            } else {
                identifier
            };
            for row in Self::rows_for(table).unwrap_or_default() {
                if row.get(key) == Some(value) {
                    let timestamp = row
                        .get(timestamp_field)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    hops.push(TraceHop {
                        source: MOCK_SOURCE_NAME.to_string(),
                        table: table.to_string(),
                        timestamp,
                        data: row,
                    });
                }
            }
        }
        Ok(hops)
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: Some("mock inventory loaded".to_string()),
            latency_ms: Some(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> QueryContext {
        QueryContext::new()
    }

    #[tokio::test]
    async fn test_tables_and_row_counts() {
        let source = MockSource::new();
        let tables = source.tables().await.unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[0].name, "services");
        assert_eq!(tables[0].row_count, Some(3));
    }

    #[tokio::test]
    async fn test_equality_pushdown_honoured() {
        let source = MockSource::new();
        let filters = vec![Filter {
            field: "environment".to_string(),
            op: FilterOp::Eq,
            value: Value::from("production"),
            second_value: None,
        }];
        let result = source
            .query("services", &filters, &QueryOptions::default(), &ctx())
            .await
            .unwrap();
        assert_eq!(result.row_count, 2);
    }

    #[tokio::test]
    async fn test_unknown_table_is_plugin_error() {
        let source = MockSource::new();
        let err = source
            .query("pods", &[], &QueryOptions::default(), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.code, scout_error::ErrorCode::Plugin);
    }

    #[tokio::test]
    async fn test_trace_links_service_id() {
        let source = MockSource::new();
        let hops = source
            .trace("service_id", &Value::from("svc-1"), &ctx())
            .await
            .unwrap();
        let tables: Vec<&str> = hops.iter().map(|h| h.table.as_str()).collect();
        assert!(tables.contains(&"services"));
        assert!(tables.contains(&"deployments"));
        assert!(tables.contains(&"incidents"));
        assert!(hops.iter().all(|h| !h.timestamp.is_empty()));
    }

    #[tokio::test]
    async fn test_cancelled_context_rejected() {
        let source = MockSource::new();
        let ctx = QueryContext::new();
        ctx.cancel.cancel();
        let err = source
            .query("services", &[], &QueryOptions::default(), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
