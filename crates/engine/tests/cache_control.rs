use scout_common::config::{AppConfig, CacheSettings};
use scout_common::models::SourceConfig;
use scout_connectors::mock::MockSource;
use scout_engine::{Engine, EngineOptions, QueryCache, QueryOutput};
use std::collections::HashMap;
use std::sync::Arc;

async fn engine_with_cache() -> (Engine, Arc<QueryCache>) {
    let settings = CacheSettings {
        enabled: true,
        default_ttl_ms: 60_000,
        max_size: 10,
        per_table_ttl: HashMap::new(),
    };
    let cache = Arc::new(QueryCache::new(&settings));
    let engine = Engine::new(EngineOptions {
        config: AppConfig::default(),
        cache: Some(cache.clone()),
    });
    engine
        .register_source(
            Arc::new(MockSource::new()),
            &SourceConfig::named("mock", "mock"),
        )
        .await
        .expect("mock registration");
    (engine, cache)
}

#[tokio::test]
async fn repeated_query_shares_a_cache_slot() {
    let (engine, cache) = engine_with_cache().await;
    let sql = "SELECT name FROM services ORDER BY name";

    engine.execute(sql).await.unwrap();
    engine.execute(sql).await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn fingerprint_components_produce_distinct_slots() {
    let (engine, cache) = engine_with_cache().await;

    engine.execute("SELECT name FROM services").await.unwrap();
    engine
        .execute("SELECT name FROM services LIMIT 1")
        .await
        .unwrap();
    engine
        .execute("SELECT name FROM services WHERE status = 'active'")
        .await
        .unwrap();

    let stats = cache.stats();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn joins_and_aggregates_are_not_cached() {
    let (engine, cache) = engine_with_cache().await;

    engine
        .execute("SELECT COUNT(*) AS total FROM services")
        .await
        .unwrap();
    engine
        .execute("SELECT * FROM services INNER JOIN deployments ON services.id = deployments.service_id")
        .await
        .unwrap();

    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn cached_result_matches_fresh_result() {
    let (engine, _cache) = engine_with_cache().await;
    let sql = "SELECT name, status FROM services WHERE environment = 'production'";

    let fresh = match engine.execute(sql).await.unwrap() {
        QueryOutput::Query(result) => result,
        other => panic!("expected rows, got {:?}", other),
    };
    let cached = match engine.execute(sql).await.unwrap() {
        QueryOutput::Query(result) => result,
        other => panic!("expected rows, got {:?}", other),
    };

    assert_eq!(fresh.rows, cached.rows);
    assert_eq!(fresh.row_count, cached.row_count);
    assert!(cached.execution_time_ms.is_some());
}

#[tokio::test]
async fn show_cache_reports_stats() {
    let (engine, _cache) = engine_with_cache().await;
    engine.execute("SELECT name FROM services").await.unwrap();

    match engine.execute("SHOW CACHE").await.unwrap() {
        QueryOutput::Cache(result) => {
            assert_eq!(result.action, "SHOW");
            let stats = result.stats.expect("stats attached");
            assert!(stats.enabled);
            assert_eq!(stats.entries, 1);
        }
        other => panic!("expected cache result, got {:?}", other),
    }
}

#[tokio::test]
async fn cache_clear_statement_empties_slots() {
    let (engine, cache) = engine_with_cache().await;
    engine.execute("SELECT name FROM services").await.unwrap();
    engine
        .execute("SELECT id FROM deployments")
        .await
        .unwrap();
    assert_eq!(cache.stats().entries, 2);

    match engine.execute("CACHE CLEAR services").await.unwrap() {
        QueryOutput::Cache(result) => {
            assert_eq!(result.action, "CLEAR");
            assert!(result.message.unwrap().contains("services"));
        }
        other => panic!("expected cache result, got {:?}", other),
    }
    assert_eq!(cache.stats().entries, 1);

    engine.execute("CACHE CLEAR").await.unwrap();
    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn cache_set_ttl_statement_expires_entries() {
    let (engine, cache) = engine_with_cache().await;

    engine
        .execute("CACHE SET TTL services 0")
        .await
        .unwrap();
    engine.execute("SELECT name FROM services").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    engine.execute("SELECT name FROM services").await.unwrap();

    // Both executions were misses: the slot expired between them
    let stats = cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 2);
}

#[tokio::test]
async fn disabled_cache_never_stores() {
    let settings = CacheSettings {
        enabled: false,
        ..CacheSettings::default()
    };
    let cache = Arc::new(QueryCache::new(&settings));
    let engine = Engine::new(EngineOptions {
        config: AppConfig::default(),
        cache: Some(cache.clone()),
    });
    engine
        .register_source(
            Arc::new(MockSource::new()),
            &SourceConfig::named("mock", "mock"),
        )
        .await
        .unwrap();

    engine.execute("SELECT name FROM services").await.unwrap();
    engine.execute("SELECT name FROM services").await.unwrap();
    assert_eq!(cache.stats().entries, 0);
}
