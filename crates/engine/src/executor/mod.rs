//! Statement execution.
//!
//! SELECT runs a fixed relational pipeline: resolve the table, lower the
//! pushdown filters, probe the cache, fetch from the owning source, join,
//! re-apply the full predicate, aggregate, project, order, paginate,
//! truncate, and record the cache entry. TRACE/DESCRIBE/SHOW/CACHE are
//! thin lookups over the registry and cache.

pub mod aggregate;
pub mod eval;
pub mod join;

use crate::cache::QueryCache;
use crate::registry::{CatalogEntry, PluginRegistry};
use scout_common::config::ExecutorSettings;
use scout_common::context::QueryContext;
use scout_common::models::{
    CacheControlResult, ColumnInfo, ColumnType, DescribeResult, Filter, QueryOptions, QueryResult,
    ShowResult, TraceResult,
};
use scout_error::{ErrorContext, Result, ScoutError};
use scout_sql::ast::{
    Aggregate, CacheAction, CacheStatement, Combinator, DescribeStatement, SelectStatement,
    ShowStatement, ShowTarget, Statement, TraceStatement,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Result of executing one statement, by statement shape.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Query(QueryResult),
    Trace(TraceResult),
    Describe(DescribeResult),
    Show(ShowResult),
    Cache(CacheControlResult),
}

impl QueryOutput {
    pub fn as_query(&self) -> Option<&QueryResult> {
        match self {
            QueryOutput::Query(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_trace(&self) -> Option<&TraceResult> {
        match self {
            QueryOutput::Trace(result) => Some(result),
            _ => None,
        }
    }

    /// Row-ish count for the query completion log.
    pub fn output_rows(&self) -> usize {
        match self {
            QueryOutput::Query(result) => result.row_count,
            QueryOutput::Trace(result) => result.total_hops,
            QueryOutput::Describe(result) => result.columns.len(),
            QueryOutput::Show(result) => result.items.len(),
            QueryOutput::Cache(_) => 0,
        }
    }
}

pub struct Executor {
    registry: Arc<PluginRegistry>,
    cache: Arc<QueryCache>,
    settings: ExecutorSettings,
}

impl Executor {
    pub fn new(
        registry: Arc<PluginRegistry>,
        cache: Arc<QueryCache>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            registry,
            cache,
            settings,
        }
    }

    pub async fn execute(&self, statement: &Statement, ctx: &QueryContext) -> Result<QueryOutput> {
        match statement {
            Statement::Select(stmt) => Ok(QueryOutput::Query(self.execute_select(stmt, ctx).await?)),
            Statement::Trace(stmt) => Ok(QueryOutput::Trace(self.execute_trace(stmt, ctx).await?)),
            Statement::Describe(stmt) => {
                Ok(QueryOutput::Describe(self.execute_describe(stmt, ctx).await?))
            }
            Statement::Show(stmt) => Ok(QueryOutput::Show(self.execute_show(stmt, ctx).await?)),
            Statement::Cache(stmt) => Ok(QueryOutput::Cache(self.execute_cache(stmt)?)),
        }
    }

    // --- SELECT ---

    async fn execute_select(
        &self,
        stmt: &SelectStatement,
        ctx: &QueryContext,
    ) -> Result<QueryResult> {
        let started = Instant::now();

        let catalogue = self.registry.tables_all(ctx).await?;
        let base = resolve(&catalogue, &stmt.from)?.clone();

        let filters = pushdown_filters(stmt);

        // Joins, aggregates, and HAVING make the plan uncacheable
        let cacheable = stmt.joins.is_empty() && !stmt.has_aggregates() && stmt.having.is_none();
        let cache_options = cache_options(stmt);
        if cacheable {
            if let Some(mut hit) = self.cache.get(&stmt.from, &filters, &cache_options) {
                hit.execution_time_ms = Some(started.elapsed().as_millis() as u64);
                return Ok(hit);
            }
        }

        let fetch_options = self.fetch_options(stmt);
        let fetched = self
            .registry
            .query(&base.source, &stmt.from, &filters, &fetch_options, ctx)
            .await?;

        let base_columns = if fetched.columns.is_empty() {
            base.table.columns.clone()
        } else {
            fetched.columns
        };
        let fetched_total = fetched.total_count;
        let fetched_len = fetched.rows.len();
        let mut rows = fetched.rows;

        let mut types = HashMap::new();
        add_types(&mut types, &stmt.from, &base_columns);

        // Joins, in declaration order
        let mut star_columns = base_columns.clone();
        if !stmt.joins.is_empty() {
            rows = join::qualify_rows(rows, &stmt.from);
            star_columns = qualify_columns(&base_columns, &stmt.from);

            for join_clause in &stmt.joins {
                let right_entry = resolve(&catalogue, &join_clause.table)?;
                let right_options = QueryOptions {
                    max_results: Some(self.settings.default_max_results),
                    ..Default::default()
                };
                let right = self
                    .registry
                    .query(
                        &right_entry.source,
                        &join_clause.table,
                        &[],
                        &right_options,
                        ctx,
                    )
                    .await?;

                let right_columns = if right.columns.is_empty() {
                    right_entry.table.columns.clone()
                } else {
                    right.columns
                };
                let right_fields: Vec<String> = if right_columns.is_empty() {
                    right
                        .rows
                        .iter()
                        .flat_map(|row| row.keys().cloned())
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect()
                } else {
                    right_columns.iter().map(|c| c.name.clone()).collect()
                };

                add_types(&mut types, &join_clause.table, &right_columns);
                star_columns.extend(qualify_columns(&right_columns, &join_clause.table));

                rows = join::nested_loop(
                    rows,
                    right.rows,
                    &join_clause.table,
                    &right_fields,
                    &join_clause.on,
                    join_clause.kind,
                );
            }
        }

        // Re-apply the full predicate: correctness never depends on how
        // much of the pushdown the source honoured.
        if let Some(predicate) = &stmt.where_clause {
            rows.retain(|row| eval::predicate_matches(predicate, row));
        }

        if stmt.has_aggregates() {
            rows = aggregate::aggregate_rows(stmt, &rows);
        }
        if let Some(having) = &stmt.having {
            rows.retain(|row| eval::predicate_matches(having, row));
        }

        // Projection
        let columns = if stmt.is_star() {
            star_columns
        } else {
            let (projected_rows, projected_columns) = project(stmt, rows, &types);
            rows = projected_rows;
            projected_columns
        };

        if let Some(order) = &stmt.order_by {
            eval::sort_rows(&mut rows, order);
        }

        let mut total_count = rows.len();

        // Pagination: offset, then limit
        if let Some(offset) = stmt.offset {
            let cut = offset.min(rows.len());
            rows.drain(..cut);
        }
        if let Some(limit) = stmt.limit {
            rows.truncate(limit);
        }

        // Truncation cap applies only when the caller gave no LIMIT. A
        // source that honoured the max_results hint clipped for us; its
        // reported total preserves the pre-truncation size.
        let mut truncated = None;
        let mut warning = None;
        if stmt.limit.is_none() {
            let cap = self.settings.default_max_results;
            if rows.len() > cap {
                rows.truncate(cap);
                truncated = Some(true);
            } else if stmt.joins.is_empty() && !stmt.has_aggregates() && fetched_total > fetched_len
            {
                truncated = Some(true);
                total_count = total_count.max(fetched_total);
            }
            if truncated == Some(true) {
                warning = Some(format!(
                    "Result truncated to {} rows; add LIMIT/OFFSET or narrow the WHERE clause",
                    cap
                ));
            }
        }

        let result = QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            total_count,
            execution_time_ms: Some(started.elapsed().as_millis() as u64),
            source: Some(base.source.clone()),
            truncated,
            warning,
        };

        if cacheable {
            self.cache.set(&stmt.from, &filters, &cache_options, &result);
        }
        Ok(result)
    }

    /// Options for the base fetch. When the caller gave no LIMIT, the
    /// default row cap travels along as a fetch-size hint.
    fn fetch_options(&self, stmt: &SelectStatement) -> QueryOptions {
        let columns = if stmt.is_star() || stmt.has_aggregates() || !stmt.joins.is_empty() {
            None
        } else {
            // Projected columns plus everything the executor still needs
            // for residual filtering and ordering
            let mut needed: BTreeSet<String> = stmt
                .columns
                .iter()
                .map(|p| unqualify(&p.name, &stmt.from))
                .collect();
            if let Some(predicate) = &stmt.where_clause {
                for condition in &predicate.conditions {
                    needed.insert(unqualify(&condition.field, &stmt.from));
                }
            }
            if let Some(order) = &stmt.order_by {
                for key in order {
                    needed.insert(unqualify(&key.field, &stmt.from));
                }
            }
            Some(needed.into_iter().collect())
        };

        QueryOptions {
            limit: stmt.limit,
            offset: stmt.offset,
            order_by: stmt.order_by.clone(),
            columns,
            max_results: if stmt.limit.is_none() {
                Some(self.settings.default_max_results)
            } else {
                None
            },
        }
    }

    // --- TRACE ---

    async fn execute_trace(
        &self,
        stmt: &TraceStatement,
        ctx: &QueryContext,
    ) -> Result<TraceResult> {
        let hops = self
            .registry
            .trace(&stmt.identifier, &stmt.value, &stmt.through, ctx)
            .await?;
        Ok(TraceResult {
            identifier: stmt.identifier.clone(),
            value: stmt.value.clone(),
            total_hops: hops.len(),
            hops,
        })
    }

    // --- DESCRIBE ---

    async fn execute_describe(
        &self,
        stmt: &DescribeStatement,
        ctx: &QueryContext,
    ) -> Result<DescribeResult> {
        let catalogue = self.registry.tables_all(ctx).await?;
        let entry = resolve(&catalogue, &stmt.target)?;
        Ok(DescribeResult {
            table: entry.table.name.clone(),
            source: entry.source.clone(),
            columns: entry.table.columns.clone(),
        })
    }

    // --- SHOW ---

    async fn execute_show(&self, stmt: &ShowStatement, ctx: &QueryContext) -> Result<ShowResult> {
        let items = match stmt.what {
            ShowTarget::Tables => {
                let catalogue = self.registry.tables_all(ctx).await?;
                catalogue
                    .iter()
                    .map(|entry| {
                        json!({
                            "source": entry.source,
                            "name": entry.table.name,
                            "description": entry.table.description,
                            "columns": entry.table.columns.len(),
                            "row_count": entry.table.row_count,
                        })
                    })
                    .collect()
            }
            ShowTarget::Plugins => self
                .registry
                .sources()
                .await
                .into_iter()
                .map(|(name, initialized)| json!({"name": name, "initialized": initialized}))
                .collect(),
            ShowTarget::Sources => {
                let catalogue = self.registry.tables_all(ctx).await?;
                let mut per_source: HashMap<String, usize> = HashMap::new();
                for entry in &catalogue {
                    *per_source.entry(entry.source.clone()).or_default() += 1;
                }
                self.registry
                    .sources()
                    .await
                    .into_iter()
                    .map(|(name, initialized)| {
                        let tables = per_source.get(&name).copied().unwrap_or(0);
                        json!({"name": name, "initialized": initialized, "tables": tables})
                    })
                    .collect()
            }
        };
        Ok(ShowResult {
            what: stmt.what.as_str().to_string(),
            items,
        })
    }

    // --- CACHE ---

    fn execute_cache(&self, stmt: &CacheStatement) -> Result<CacheControlResult> {
        let (message, stats) = match stmt.action {
            CacheAction::Show => (None, Some(self.cache.stats())),
            CacheAction::Clear => match &stmt.table {
                Some(table) => {
                    self.cache.clear_table(table);
                    (Some(format!("Cache cleared for table '{}'", table)), None)
                }
                None => {
                    self.cache.clear();
                    (Some("Cache cleared".to_string()), None)
                }
            },
            CacheAction::SetTtl => {
                let ttl_ms = stmt.ttl_ms.ok_or_else(|| {
                    ScoutError::execution("CACHE SET TTL requires a duration in milliseconds")
                })?;
                match &stmt.table {
                    Some(table) => {
                        self.cache.set_table_ttl(table, ttl_ms);
                        (
                            Some(format!("TTL for table '{}' set to {} ms", table, ttl_ms)),
                            None,
                        )
                    }
                    None => {
                        self.cache.set_default_ttl(ttl_ms);
                        (Some(format!("Default TTL set to {} ms", ttl_ms)), None)
                    }
                }
            }
        };
        Ok(CacheControlResult {
            action: stmt.action.as_str().to_string(),
            message,
            stats,
        })
    }
}

/// Find the single catalogue entry for a table name. Zero matches is an
/// unknown table; more than one is an ambiguity across sources.
fn resolve<'a>(catalogue: &'a [CatalogEntry], table: &str) -> Result<&'a CatalogEntry> {
    let matches: Vec<&CatalogEntry> = catalogue
        .iter()
        .filter(|entry| entry.table.name == table)
        .collect();
    match matches.len() {
        1 => Ok(matches[0]),
        0 => {
            let available: Vec<String> = catalogue
                .iter()
                .map(|entry| entry.table.name.clone())
                .collect();
            Err(
                ScoutError::execution(format!("Table '{}' not found", table))
                    .with_context(ErrorContext::TableNotFound {
                        table: table.to_string(),
                        available_tables: available,
                    })
                    .with_hint("Run SHOW TABLES to list the catalogue"),
            )
        }
        _ => {
            let sources: Vec<String> = matches.iter().map(|entry| entry.source.clone()).collect();
            Err(ScoutError::execution(format!(
                "Table '{}' is exported by more than one source",
                table
            ))
            .with_context(ErrorContext::AmbiguousTable {
                table: table.to_string(),
                sources,
            }))
        }
    }
}

/// Lower the pushdown subset of the WHERE clause.
///
/// A disjunction cannot be pushed piecewise (a source applying one branch
/// as a conjunct would drop rows other branches accept), and predicates on
/// aggregate aliases or joined tables stay residual.
fn pushdown_filters(stmt: &SelectStatement) -> Vec<Filter> {
    let Some(predicate) = &stmt.where_clause else {
        return Vec::new();
    };
    if predicate.combinator == Combinator::Or && predicate.conditions.len() > 1 {
        return Vec::new();
    }
    let aggregate_aliases: HashSet<&str> = stmt
        .columns
        .iter()
        .filter(|p| p.aggregate.is_some())
        .filter_map(|p| p.alias.as_deref())
        .collect();

    predicate
        .conditions
        .iter()
        .filter(|condition| !aggregate_aliases.contains(condition.field.as_str()))
        .filter_map(|condition| match condition.field.split_once('.') {
            Some((table, column)) if table == stmt.from => Some(Filter {
                field: column.to_string(),
                ..Filter::from(condition)
            }),
            Some(_) => None,
            None => Some(Filter::from(condition)),
        })
        .collect()
}

/// The options component of the cache fingerprint: pagination, ordering,
/// and the projected output keys.
fn cache_options(stmt: &SelectStatement) -> QueryOptions {
    let columns = if stmt.is_star() {
        None
    } else {
        Some(stmt.columns.iter().map(|p| p.output_key()).collect())
    };
    QueryOptions {
        limit: stmt.limit,
        offset: stmt.offset,
        order_by: stmt.order_by.clone(),
        columns,
        max_results: None,
    }
}

/// Rewrite rows to the explicit projection, applying aliases as output
/// keys, and derive the column metadata.
fn project(
    stmt: &SelectStatement,
    rows: Vec<scout_common::models::Row>,
    types: &HashMap<String, ColumnType>,
) -> (Vec<scout_common::models::Row>, Vec<ColumnInfo>) {
    let columns: Vec<ColumnInfo> = stmt
        .columns
        .iter()
        .map(|projection| {
            let column_type = match projection.aggregate {
                Some(Aggregate::Count | Aggregate::Sum | Aggregate::Avg) => ColumnType::Number,
                Some(Aggregate::Min | Aggregate::Max) | None => {
                    lookup_type(types, &projection.name).unwrap_or(ColumnType::String)
                }
            };
            ColumnInfo::new(projection.output_key(), column_type)
        })
        .collect();

    let rows = rows
        .into_iter()
        .map(|row| {
            let mut out = scout_common::models::Row::new();
            for projection in &stmt.columns {
                let key = projection.output_key();
                let value = row
                    .get(&key)
                    .or_else(|| eval::lookup(&row, &projection.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                out.insert(key, value);
            }
            out
        })
        .collect();

    (rows, columns)
}

fn add_types(types: &mut HashMap<String, ColumnType>, table: &str, columns: &[ColumnInfo]) {
    for column in columns {
        types
            .entry(column.name.clone())
            .or_insert(column.column_type);
        types.insert(format!("{}.{}", table, column.name), column.column_type);
    }
}

fn lookup_type(types: &HashMap<String, ColumnType>, field: &str) -> Option<ColumnType> {
    if let Some(t) = types.get(field) {
        return Some(*t);
    }
    field
        .split_once('.')
        .and_then(|(_, bare)| types.get(bare))
        .copied()
}

fn qualify_columns(columns: &[ColumnInfo], table: &str) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|column| ColumnInfo {
            name: format!("{}.{}", table, column.name),
            ..column.clone()
        })
        .collect()
}

fn unqualify(field: &str, table: &str) -> String {
    match field.split_once('.') {
        Some((prefix, column)) if prefix == table => column.to_string(),
        _ => field.to_string(),
    }
}
