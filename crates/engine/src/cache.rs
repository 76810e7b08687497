//! TTL-bounded result cache.
//!
//! Keys are fingerprints over `(table, filters, options)` serialised
//! deterministically, so value-equal probes share a slot no matter how the
//! inputs were assembled. Expiry is lazy on read; size pressure evicts the
//! oldest entry on write. All mutation happens under one mutex so size and
//! TTL reads stay consistent with writes.
//!
//! The cache is an explicitly passed dependency (tests construct their
//! own instance), with [`QueryCache::shared`] as the documented
//! convenience for production wiring.

use scout_common::config::CacheSettings;
use scout_common::models::{CacheEntryStats, CacheStats, Filter, QueryOptions, QueryResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache key: a stable hash over the canonical form of the probe.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a probe.
    ///
    /// `Filter` and `QueryOptions` serialise with a fixed field order and
    /// JSON object values keep sorted keys, so value-equal inputs produce
    /// identical fingerprints regardless of how they were built.
    pub fn fingerprint(table: &str, filters: &[Filter], options: &QueryOptions) -> Self {
        let filters_json = serde_json::to_string(filters).unwrap_or_default();
        let options_json = serde_json::to_string(options).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(table.as_bytes());
        hasher.update(b"|");
        hasher.update(filters_json.as_bytes());
        hasher.update(b"|");
        hasher.update(options_json.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }
}

struct CacheEntry {
    table: String,
    result: QueryResult,
    inserted_at: Instant,
    ttl: Duration,
    hits: u64,
    approx_size_bytes: usize,
}

impl CacheEntry {
    fn expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

struct CacheInner {
    enabled: bool,
    default_ttl: Duration,
    per_table_ttl: HashMap<String, Duration>,
    max_size: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn ttl_for(&self, table: &str) -> Duration {
        self.per_table_ttl
            .get(table)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            if let Some(evicted) = self.entries.remove(&key) {
                debug!(
                    target: "cache",
                    table = %evicted.table,
                    age_ms = evicted.inserted_at.elapsed().as_millis() as u64,
                    "Evicting oldest cache entry"
                );
            }
        }
    }
}

pub struct QueryCache {
    inner: Mutex<CacheInner>,
}

static SHARED: OnceLock<Arc<QueryCache>> = OnceLock::new();

impl QueryCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                enabled: settings.enabled,
                default_ttl: Duration::from_millis(settings.default_ttl_ms),
                per_table_ttl: settings
                    .per_table_ttl
                    .iter()
                    .map(|(table, ms)| (table.clone(), Duration::from_millis(*ms)))
                    .collect(),
                max_size: settings.max_size.max(1),
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// The process-wide cache used by production wiring. Tests should
    /// construct their own instance with [`QueryCache::new`] instead.
    pub fn shared() -> Arc<QueryCache> {
        SHARED
            .get_or_init(|| Arc::new(QueryCache::new(&CacheSettings::default())))
            .clone()
    }

    /// Probe the cache. Expired entries are removed and reported as a miss.
    pub fn get(
        &self,
        table: &str,
        filters: &[Filter],
        options: &QueryOptions,
    ) -> Option<QueryResult> {
        let mut inner = self.inner.lock().ok()?;
        if !inner.enabled {
            return None;
        }
        let key = CacheKey::fingerprint(table, filters, options);

        let expired = matches!(inner.entries.get(&key), Some(entry) if entry.expired());
        if expired {
            inner.entries.remove(&key);
        }

        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.hits += 1;
                let result = entry.result.clone();
                inner.hits += 1;
                debug!(target: "cache", table = table, "Cache hit");
                Some(result)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a result. A no-op while the cache is disabled.
    pub fn set(&self, table: &str, filters: &[Filter], options: &QueryOptions, result: &QueryResult) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if !inner.enabled {
            return;
        }
        let key = CacheKey::fingerprint(table, filters, options);

        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.max_size {
            inner.evict_oldest();
        }

        let approx_size_bytes = serde_json::to_string(result).map(|s| s.len()).unwrap_or(0);
        let ttl = inner.ttl_for(table);
        inner.entries.insert(
            key,
            CacheEntry {
                table: table.to_string(),
                result: result.clone(),
                inserted_at: Instant::now(),
                ttl,
                hits: 0,
                approx_size_bytes,
            },
        );
        debug!(
            target: "cache",
            table = table,
            rows = result.row_count,
            ttl_ms = ttl.as_millis() as u64,
            "Cached query result"
        );
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
        }
    }

    pub fn clear_table(&self, table: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.retain(|_, entry| entry.table != table);
        }
    }

    pub fn set_default_ttl(&self, ttl_ms: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.default_ttl = Duration::from_millis(ttl_ms);
        }
    }

    pub fn set_table_ttl(&self, table: &str, ttl_ms: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .per_table_ttl
                .insert(table.to_string(), Duration::from_millis(ttl_ms));
        }
    }

    /// Disabling atomically drops every entry.
    pub fn set_enabled(&self, enabled: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.enabled = enabled;
            if !enabled {
                inner.entries.clear();
            }
        }
    }

    /// Drop every expired entry now instead of waiting for lazy expiry.
    pub fn cleanup(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.retain(|_, entry| !entry.expired());
        }
    }

    pub fn stats(&self) -> CacheStats {
        let Ok(inner) = self.inner.lock() else {
            return CacheStats {
                enabled: false,
                entries: 0,
                max_size: 0,
                hits: 0,
                misses: 0,
                hit_rate: 0.0,
                default_ttl_ms: 0,
                per_entry: Vec::new(),
            };
        };
        let lookups = inner.hits + inner.misses;
        let hit_rate = if lookups > 0 {
            inner.hits as f64 / lookups as f64
        } else {
            0.0
        };
        let mut per_entry: Vec<CacheEntryStats> = inner
            .entries
            .values()
            .map(|entry| CacheEntryStats {
                table: entry.table.clone(),
                hits: entry.hits,
                age_ms: entry.inserted_at.elapsed().as_millis() as u64,
                approx_size_bytes: entry.approx_size_bytes,
            })
            .collect();
        per_entry.sort_by(|a, b| a.table.cmp(&b.table));

        CacheStats {
            enabled: inner.enabled,
            entries: inner.entries.len(),
            max_size: inner.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
            default_ttl_ms: inner.default_ttl.as_millis() as u64,
            per_entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_common::models::{ColumnInfo, ColumnType, FilterOp, Row};
    use serde_json::{json, Value};

    fn settings(max_size: usize) -> CacheSettings {
        CacheSettings {
            enabled: true,
            default_ttl_ms: 60_000,
            max_size,
            per_table_ttl: HashMap::new(),
        }
    }

    fn result_with_id(id: &str) -> QueryResult {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::from(id));
        QueryResult::from_rows(vec![ColumnInfo::new("id", ColumnType::String)], vec![row])
    }

    fn filter(field: &str, value: Value) -> Filter {
        Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value,
            second_value: None,
        }
    }

    #[test]
    fn test_fingerprint_stable_under_value_equal_inputs() {
        let options_a = QueryOptions {
            limit: Some(10),
            ..Default::default()
        };
        let options_b = QueryOptions {
            limit: Some(10),
            ..Default::default()
        };
        // Object-valued filters keep sorted keys regardless of build order
        let fa = filter("meta", json!({"a": 1, "b": 2}));
        let fb = filter("meta", json!({"b": 2, "a": 1}));

        assert_eq!(
            CacheKey::fingerprint("services", &[fa], &options_a),
            CacheKey::fingerprint("services", &[fb], &options_b),
        );
    }

    #[test]
    fn test_fingerprint_differs_per_component() {
        let base = CacheKey::fingerprint("services", &[], &QueryOptions::default());
        assert_ne!(
            base,
            CacheKey::fingerprint("deployments", &[], &QueryOptions::default())
        );
        assert_ne!(
            base,
            CacheKey::fingerprint(
                "services",
                &[filter("status", Value::from("active"))],
                &QueryOptions::default()
            )
        );
        assert_ne!(
            base,
            CacheKey::fingerprint(
                "services",
                &[],
                &QueryOptions {
                    limit: Some(1),
                    ..Default::default()
                }
            )
        );
    }

    #[test]
    fn test_hit_and_miss_accounting() {
        let cache = QueryCache::new(&settings(10));
        let options = QueryOptions::default();

        assert!(cache.get("services", &[], &options).is_none());
        cache.set("services", &[], &options, &result_with_id("svc-1"));
        assert!(cache.get("services", &[], &options).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.per_entry.len(), 1);
        assert_eq!(stats.per_entry[0].hits, 1);
    }

    #[test]
    fn test_ttl_expiry_is_lazy_and_frees_slot() {
        let cache = QueryCache::new(&settings(10));
        cache.set_table_ttl("services", 0);
        let options = QueryOptions::default();
        cache.set("services", &[], &options, &result_with_id("svc-1"));

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("services", &[], &options).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let cache = QueryCache::new(&settings(2));
        let options = QueryOptions::default();
        cache.set("a", &[], &options, &result_with_id("1"));
        std::thread::sleep(Duration::from_millis(2));
        cache.set("b", &[], &options, &result_with_id("2"));
        std::thread::sleep(Duration::from_millis(2));
        cache.set("c", &[], &options, &result_with_id("3"));

        assert!(cache.get("a", &[], &options).is_none());
        assert!(cache.get("b", &[], &options).is_some());
        assert!(cache.get("c", &[], &options).is_some());
    }

    #[test]
    fn test_disable_clears_entries() {
        let cache = QueryCache::new(&settings(10));
        let options = QueryOptions::default();
        cache.set("services", &[], &options, &result_with_id("svc-1"));
        cache.set_enabled(false);
        assert_eq!(cache.stats().entries, 0);

        cache.set_enabled(true);
        assert!(cache.get("services", &[], &options).is_none());
    }

    #[test]
    fn test_clear_table_is_selective() {
        let cache = QueryCache::new(&settings(10));
        let options = QueryOptions::default();
        cache.set("services", &[], &options, &result_with_id("svc-1"));
        cache.set("deployments", &[], &options, &result_with_id("dep-1"));

        cache.clear_table("services");
        assert!(cache.get("services", &[], &options).is_none());
        assert!(cache.get("deployments", &[], &options).is_some());
    }
}
