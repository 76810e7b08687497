//! Plugin lifecycle and dispatch.
//!
//! The registry owns every registered [`DataSource`] and is the only
//! component that calls across the plugin boundary. All fan-outs
//! (`tables_all`, `trace`, `health_all`) run the per-plugin calls in
//! parallel with a single join point and downgrade per-plugin failures to
//! logged omissions; point dispatches (`query`) propagate failures wrapped
//! as plugin-kind errors with the cause preserved.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use scout_common::config::RetrySettings;
use scout_common::context::QueryContext;
use scout_common::models::{
    Filter, HealthStatus, QueryOptions, QueryResult, SourceConfig, TableInfo, TraceHop,
};
use scout_common::retry::retry_async;
use scout_connectors::DataSource;
use scout_error::{ErrorContext, Result, ScoutError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Upper bound on a single health probe.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// One catalogue entry: a table annotated with its owning source.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub source: String,
    pub table: TableInfo,
}

pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<dyn DataSource>>>,
    initialized: RwLock<HashSet<String>>,
    retry: RetrySettings,
}

impl PluginRegistry {
    pub fn new(retry: RetrySettings) -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
            initialized: RwLock::new(HashSet::new()),
            retry,
        }
    }

    /// Register a source and initialise it exactly once.
    ///
    /// A failed initialise removes the entry again and propagates a
    /// plugin-kind error carrying the cause.
    pub async fn register(
        &self,
        plugin: Arc<dyn DataSource>,
        config: &SourceConfig,
    ) -> Result<()> {
        let name = plugin.name().to_string();
        {
            let mut plugins = self.plugins.write().await;
            if plugins.contains_key(&name) {
                return Err(ScoutError::plugin(format!(
                    "Plugin '{}' is already registered",
                    name
                )));
            }
            plugins.insert(name.clone(), plugin.clone());
        }

        if let Err(e) = plugin.initialize(config).await {
            self.plugins.write().await.remove(&name);
            return Err(ScoutError::plugin(format!(
                "Initialisation failed for plugin '{}': {}",
                name, e.message
            ))
            .with_context(ErrorContext::Plugin {
                source: name,
                operation: "initialize".to_string(),
            })
            .with_cause(e));
        }

        self.initialized.write().await.insert(name.clone());
        debug!(target: "registry", plugin = %name, "Registered data source");
        Ok(())
    }

    /// Remove a source, running its cleanup best-effort.
    pub async fn unregister(&self, name: &str) {
        let plugin = self.plugins.write().await.remove(name);
        self.initialized.write().await.remove(name);
        if let Some(plugin) = plugin {
            if let Err(e) = plugin.cleanup().await {
                warn!(target: "registry", plugin = name, error = %e, "Cleanup failed");
            }
            debug!(target: "registry", plugin = name, "Unregistered data source");
        }
    }

    /// Names of all registered sources with their initialisation state,
    /// sorted for deterministic listings.
    pub async fn sources(&self) -> Vec<(String, bool)> {
        let plugins = self.plugins.read().await;
        let initialized = self.initialized.read().await;
        let mut out: Vec<(String, bool)> = plugins
            .keys()
            .map(|name| (name.clone(), initialized.contains(name)))
            .collect();
        out.sort();
        out
    }

    async fn live_plugins(&self) -> Vec<(String, Arc<dyn DataSource>)> {
        let plugins = self.plugins.read().await;
        let initialized = self.initialized.read().await;
        let mut out: Vec<(String, Arc<dyn DataSource>)> = plugins
            .iter()
            .filter(|(name, _)| initialized.contains(*name))
            .map(|(name, plugin)| (name.clone(), plugin.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Aggregate the catalogue across all initialised sources.
    ///
    /// Per-plugin failures are logged and that plugin's contribution is
    /// omitted; the remainder is returned sorted by (source, table).
    pub async fn tables_all(&self, ctx: &QueryContext) -> Result<Vec<CatalogEntry>> {
        ensure_live(ctx)?;
        let plugins = self.live_plugins().await;

        let fetches = plugins.iter().map(|(name, plugin)| {
            let plugin = plugin.clone();
            async move { (name.clone(), bounded(ctx, plugin.tables()).await) }
        });

        let mut entries = Vec::new();
        for (name, result) in join_all(fetches).await {
            match result {
                Ok(tables) => {
                    entries.extend(tables.into_iter().map(|table| CatalogEntry {
                        source: name.clone(),
                        table,
                    }));
                }
                Err(e) => {
                    warn!(target: "registry", plugin = %name, error = %e, "Catalogue fetch failed; omitting source");
                }
            }
        }
        entries.sort_by(|a, b| (&a.source, &a.table.name).cmp(&(&b.source, &b.table.name)));
        Ok(entries)
    }

    /// Dispatch a fetch to the named source.
    pub async fn query(
        &self,
        source: &str,
        table: &str,
        filters: &[Filter],
        options: &QueryOptions,
        ctx: &QueryContext,
    ) -> Result<QueryResult> {
        ensure_live(ctx)?;
        let plugin = self.lookup(source).await?;

        let operation = format!("query {}.{}", source, table);
        retry_async(&operation, self.retry, &ctx.cancel, || {
            bounded(ctx, plugin.query(table, filters, options, ctx))
        })
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                e
            } else {
                ScoutError::plugin(format!("Query failed for plugin '{}': {}", source, e.message))
                    .with_context(ErrorContext::Plugin {
                        source: source.to_string(),
                        operation: "query".to_string(),
                    })
                    .with_cause(e)
            }
        })
    }

    /// Follow an identifier across sources in parallel and merge the hops,
    /// oldest first.
    ///
    /// `sources` empty means every trace-capable source. Per-source
    /// failures are logged and skipped.
    pub async fn trace(
        &self,
        identifier: &str,
        value: &Value,
        sources: &[String],
        ctx: &QueryContext,
    ) -> Result<Vec<TraceHop>> {
        ensure_live(ctx)?;
        let live = self.live_plugins().await;
        let targets: Vec<(String, Arc<dyn DataSource>)> = if sources.is_empty() {
            live.into_iter()
                .filter(|(_, p)| p.supports_trace())
                .collect()
        } else {
            let by_name: HashMap<String, Arc<dyn DataSource>> = live.into_iter().collect();
            sources
                .iter()
                .filter_map(|name| match by_name.get(name) {
                    Some(plugin) if plugin.supports_trace() => {
                        Some((name.clone(), plugin.clone()))
                    }
                    Some(_) => {
                        debug!(target: "registry", plugin = %name, "Source does not support TRACE; skipping");
                        None
                    }
                    None => {
                        warn!(target: "registry", plugin = %name, "Unknown source named in TRACE; skipping");
                        None
                    }
                })
                .collect()
        };

        let fetches = targets.iter().map(|(name, plugin)| {
            let plugin = plugin.clone();
            async move { (name.clone(), bounded(ctx, plugin.trace(identifier, value, ctx)).await) }
        });

        let mut hops = Vec::new();
        for (name, result) in join_all(fetches).await {
            match result {
                Ok(source_hops) => hops.extend(source_hops),
                Err(e) => {
                    warn!(target: "registry", plugin = %name, error = %e, "Trace failed; omitting source");
                }
            }
        }

        // Parse to a canonical instant before sorting; unparsable
        // timestamps sort last by their raw string form.
        hops.sort_by_key(|hop| {
            let parsed: Option<DateTime<Utc>> = DateTime::parse_from_rfc3339(&hop.timestamp)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
            (parsed.is_none(), parsed, hop.timestamp.clone())
        });
        Ok(hops)
    }

    /// Probe every initialised source concurrently. Errors and timeouts
    /// surface as `healthy = false` entries rather than failures.
    pub async fn health_all(&self) -> Vec<(String, HealthStatus)> {
        let plugins = self.live_plugins().await;
        let probes = plugins.iter().map(|(name, plugin)| {
            let plugin = plugin.clone();
            async move {
                let status =
                    match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, plugin.health_check()).await {
                        Ok(Ok(status)) => status,
                        Ok(Err(e)) => HealthStatus::unhealthy(e.to_string()),
                        Err(_) => HealthStatus::unhealthy(format!(
                            "Health check timed out after {:?}",
                            HEALTH_CHECK_TIMEOUT
                        )),
                    };
                (name.clone(), status)
            }
        });
        join_all(probes).await
    }

    async fn lookup(&self, source: &str) -> Result<Arc<dyn DataSource>> {
        let plugins = self.plugins.read().await;
        plugins.get(source).cloned().ok_or_else(|| {
            let mut available: Vec<String> = plugins.keys().cloned().collect();
            available.sort();
            ScoutError::plugin(format!("No data source named '{}'", source)).with_context(
                ErrorContext::SourceNotFound {
                    source: source.to_string(),
                    available_sources: available,
                },
            )
        })
    }
}

fn ensure_live(ctx: &QueryContext) -> Result<()> {
    if ctx.is_cancelled() {
        Err(ScoutError::cancelled("Query cancelled"))
    } else {
        Ok(())
    }
}

/// Apply the context's per-call timeout to a plugin future.
async fn bounded<T, F>(ctx: &QueryContext, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match ctx.timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ScoutError::cancelled(format!(
                "Plugin call timed out after {:?}",
                limit
            ))),
        },
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_common::models::ColumnType;

    struct FailingSource;

    #[async_trait]
    impl DataSource for FailingSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn initialize(&self, _config: &SourceConfig) -> Result<()> {
            Ok(())
        }

        async fn tables(&self) -> Result<Vec<TableInfo>> {
            Err(ScoutError::plugin("catalogue backend unavailable"))
        }

        async fn query(
            &self,
            _table: &str,
            _filters: &[Filter],
            _options: &QueryOptions,
            _ctx: &QueryContext,
        ) -> Result<QueryResult> {
            Err(ScoutError::plugin("query backend unavailable"))
        }
    }

    struct TinySource;

    #[async_trait]
    impl DataSource for TinySource {
        fn name(&self) -> &str {
            "tiny"
        }

        async fn initialize(&self, _config: &SourceConfig) -> Result<()> {
            Ok(())
        }

        async fn tables(&self) -> Result<Vec<TableInfo>> {
            Ok(vec![TableInfo {
                name: "things".to_string(),
                description: None,
                columns: vec![scout_common::models::ColumnInfo::new(
                    "id",
                    ColumnType::String,
                )],
                row_count: Some(0),
            }])
        }

        async fn query(
            &self,
            _table: &str,
            _filters: &[Filter],
            _options: &QueryOptions,
            _ctx: &QueryContext,
        ) -> Result<QueryResult> {
            Ok(QueryResult::from_rows(vec![], vec![]))
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new(RetrySettings {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
        })
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = registry();
        let config = SourceConfig::named("tiny", "test");
        registry
            .register(Arc::new(TinySource), &config)
            .await
            .unwrap();
        let err = registry
            .register(Arc::new(TinySource), &config)
            .await
            .unwrap_err();
        assert_eq!(err.code, scout_error::ErrorCode::Plugin);
    }

    #[tokio::test]
    async fn test_catalogue_tolerates_failing_plugin() {
        let registry = registry();
        registry
            .register(Arc::new(TinySource), &SourceConfig::named("tiny", "test"))
            .await
            .unwrap();
        registry
            .register(
                Arc::new(FailingSource),
                &SourceConfig::named("broken", "test"),
            )
            .await
            .unwrap();

        let catalogue = registry.tables_all(&QueryContext::new()).await.unwrap();
        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0].source, "tiny");
        assert_eq!(catalogue[0].table.name, "things");
    }

    #[tokio::test]
    async fn test_query_wraps_plugin_failure() {
        let registry = registry();
        registry
            .register(
                Arc::new(FailingSource),
                &SourceConfig::named("broken", "test"),
            )
            .await
            .unwrap();

        let err = registry
            .query(
                "broken",
                "things",
                &[],
                &QueryOptions::default(),
                &QueryContext::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Query failed for plugin 'broken'"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_unknown_source_lists_alternatives() {
        let registry = registry();
        registry
            .register(Arc::new(TinySource), &SourceConfig::named("tiny", "test"))
            .await
            .unwrap();
        let err = registry
            .query(
                "missing",
                "things",
                &[],
                &QueryOptions::default(),
                &QueryContext::new(),
            )
            .await
            .unwrap_err();
        match err.context {
            Some(ErrorContext::SourceNotFound {
                available_sources, ..
            }) => assert_eq!(available_sources, vec!["tiny".to_string()]),
            other => panic!("expected SourceNotFound context, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let registry = registry();
        registry
            .register(Arc::new(TinySource), &SourceConfig::named("tiny", "test"))
            .await
            .unwrap();
        let ctx = QueryContext::new();
        ctx.cancel.cancel();
        let err = registry
            .query("tiny", "things", &[], &QueryOptions::default(), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_health_all_reports_per_source() {
        let registry = registry();
        registry
            .register(Arc::new(TinySource), &SourceConfig::named("tiny", "test"))
            .await
            .unwrap();
        let health = registry.health_all().await;
        assert_eq!(health.len(), 1);
        assert!(health[0].1.healthy);
    }
}
