//! Data source contract for the Scout query engine.
//!
//! Every backend (cloud API, orchestrator, container runtime, synthetic
//! fixture) implements [`DataSource`]. The engine's registry owns the
//! lifecycle: `register → initialize → serve (query | trace |
//! health_check)* → cleanup`.
//!
//! Sources are black boxes to the executor: they receive the pushdown
//! subset of the WHERE clause plus fetch options, and may honour any part
//! of either. The executor re-applies the full predicate after the fetch,
//! so correctness never depends on pushdown compliance.

pub mod mock;

use async_trait::async_trait;
use scout_common::context::QueryContext;
use scout_common::models::{
    Filter, HealthStatus, QueryOptions, QueryResult, SourceConfig, TableInfo, TraceHop,
};
use scout_error::{Result, ScoutError};
use serde_json::Value;

/// The narrow capability surface every data source must implement.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Stable source name used for registration and dispatch.
    fn name(&self) -> &str;

    /// Called exactly once, before any other method. `config` carries the
    /// source's opaque settings (credentials, regions, contexts).
    async fn initialize(&self, config: &SourceConfig) -> Result<()>;

    /// The tables this source exports, with their declared columns.
    async fn tables(&self) -> Result<Vec<TableInfo>>;

    /// Fetch rows from one table.
    ///
    /// `filters` is the pushdown subset of the query's WHERE clause. A
    /// source honouring a filter must apply it fully; partially honoured
    /// filters must be left to the executor by ignoring them.
    async fn query(
        &self,
        table: &str,
        filters: &[Filter],
        options: &QueryOptions,
        ctx: &QueryContext,
    ) -> Result<QueryResult>;

    /// Whether this source participates in TRACE fan-outs.
    fn supports_trace(&self) -> bool {
        false
    }

    /// Follow an identifier through this source's tables.
    async fn trace(
        &self,
        identifier: &str,
        value: &Value,
        ctx: &QueryContext,
    ) -> Result<Vec<TraceHop>> {
        let _ = (identifier, value, ctx);
        Err(ScoutError::plugin(format!(
            "Source '{}' does not support TRACE",
            self.name()
        )))
    }

    /// Liveness probe. The default reports healthy without touching the
    /// backend; sources with real I/O should override.
    async fn health_check(&self) -> Result<HealthStatus> {
        Ok(HealthStatus::healthy())
    }

    /// Release held resources. Errors are logged by the registry, never
    /// propagated.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}
