//! Core query orchestration engine.
//!
//! The [`Engine`] is the entry point for executing queries over registered
//! data sources. It owns:
//!
//! 1. **The plugin registry**: source lifecycle and dispatch.
//! 2. **The result cache**: TTL-bounded reuse of cacheable SELECTs.
//! 3. **The executor**: the relational pipeline over fetched rows.
//!
//! # Query lifecycle
//!
//! 1. `execute(text)` called.
//! 2. **Parsing**: text → statement tree.
//! 3. **Dispatch**: SELECT runs the relational pipeline; TRACE fans out
//!    across sources; DESCRIBE/SHOW/CACHE are catalogue and cache lookups.
//! 4. **Timeout**: the whole execution is bounded by
//!    `executor.query_timeout_secs` when configured.
//! 5. **Logging**: completion is logged under the `queries` target with
//!    duration and row counts.
//!
//! ```ignore
//! let engine = Engine::new(EngineOptions::default());
//! engine.register_source(Arc::new(MockSource::new()), &config).await?;
//! let output = engine.execute("SELECT name FROM services ORDER BY name").await?;
//! ```

pub mod cache;
pub mod executor;
pub mod registry;

pub use cache::{CacheKey, QueryCache};
pub use executor::{Executor, QueryOutput};
pub use registry::{CatalogEntry, PluginRegistry};

use scout_common::config::AppConfig;
use scout_common::context::QueryContext;
use scout_common::models::{HealthStatus, SourceConfig};
use scout_connectors::DataSource;
use scout_error::{Result, ScoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Construction options for [`Engine`].
///
/// The cache is an explicitly passed dependency so tests can instantiate
/// an isolated instance; leaving it unset builds one from the config.
/// [`QueryCache::shared`] is the convenience for production wiring that
/// wants one process-wide cache.
#[derive(Default)]
pub struct EngineOptions {
    pub config: AppConfig,
    pub cache: Option<Arc<QueryCache>>,
}

pub struct Engine {
    registry: Arc<PluginRegistry>,
    cache: Arc<QueryCache>,
    executor: Executor,
    query_timeout: Option<Duration>,
    active_queries: Arc<AtomicUsize>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let cache = options
            .cache
            .unwrap_or_else(|| Arc::new(QueryCache::new(&options.config.cache)));
        let registry = Arc::new(PluginRegistry::new(options.config.retry));
        let executor = Executor::new(
            registry.clone(),
            cache.clone(),
            options.config.executor.clone(),
        );
        Self {
            registry,
            cache,
            executor,
            query_timeout: options
                .config
                .executor
                .query_timeout_secs
                .map(Duration::from_secs),
            active_queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a data source and initialise it.
    pub async fn register_source(
        &self,
        plugin: Arc<dyn DataSource>,
        config: &SourceConfig,
    ) -> Result<()> {
        self.registry.register(plugin, config).await
    }

    /// Remove a data source, running its cleanup best-effort.
    pub async fn unregister_source(&self, name: &str) {
        self.registry.unregister(name).await;
    }

    /// Parse and execute one statement.
    pub async fn execute(&self, text: &str) -> Result<QueryOutput> {
        self.execute_with_context(text, &QueryContext::new()).await
    }

    /// Parse and execute one statement under the given cancellation and
    /// timeout context.
    pub async fn execute_with_context(
        &self,
        text: &str,
        ctx: &QueryContext,
    ) -> Result<QueryOutput> {
        self.active_queries.fetch_add(1, Ordering::Relaxed);
        let result = self.run(text, ctx).await;
        self.active_queries.fetch_sub(1, Ordering::Relaxed);
        result
    }

    async fn run(&self, text: &str, ctx: &QueryContext) -> Result<QueryOutput> {
        let started = Instant::now();
        let statement = scout_sql::parse(text)?;

        let outcome = match self.query_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.executor.execute(&statement, ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(ScoutError::cancelled(format!(
                        "Query timed out after {} seconds",
                        limit.as_secs()
                    ))
                    .with_hint("Simplify the query or raise 'executor.query_timeout_secs'")),
                }
            }
            None => self.executor.execute(&statement, ctx).await,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(output) => {
                info!(
                    target: "queries",
                    query = text,
                    duration_ms,
                    rows_returned = output.output_rows(),
                    success = true
                );
            }
            Err(e) => {
                info!(
                    target: "queries",
                    query = text,
                    duration_ms,
                    error = %e,
                    success = false
                );
            }
        }
        outcome
    }

    /// Probe every registered source concurrently.
    pub async fn health(&self) -> Vec<(String, HealthStatus)> {
        self.registry.health_all().await
    }

    /// Number of queries currently executing.
    pub fn active_queries(&self) -> usize {
        self.active_queries.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}
