use super::*;
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn inputs() -> CacheKeyInputs {
    let mut params = ParameterValues::new();
    params.insert("start".into(), json!("2024-01-01"));
    params.insert("region".into(), json!("emea"));
    CacheKeyInputs::new("hash-a", "1").with_parameters(params)
}

#[test]
fn test_key_stable_under_parameter_order() {
    let mut reordered = ParameterValues::new();
    reordered.insert("region".into(), json!("emea"));
    reordered.insert("start".into(), json!("2024-01-01"));
    let other = CacheKeyInputs::new("hash-a", "1").with_parameters(reordered);
    assert_eq!(inputs().key(), other.key());
}

#[test]
fn test_key_changes_with_each_input() {
    let base = inputs().key();
    let mut changed = inputs();
    changed.definition_hash = "hash-b".into();
    assert_ne!(base, changed.key());

    let mut changed = inputs();
    changed.data_model_version = "2".into();
    assert_ne!(base, changed.key());

    let changed = inputs().with_consumer(Some("dashboard-7".into()));
    assert_ne!(base, changed.key());

    let mut changed = inputs();
    changed.parameters.insert("region".into(), json!("amer"));
    assert_ne!(base, changed.key());
}

#[test]
fn test_entry_expiry() {
    let mut entry = CacheEntry::new(json!(1), Duration::from_secs(10));
    let now = entry.created_at;
    assert!(!entry.is_expired(now));
    assert!(entry.is_expired(now + chrono::Duration::seconds(10)));
    entry.ttl_secs = 0;
    assert!(entry.is_expired(now));
}

#[tokio::test]
async fn test_miss_then_hit() {
    let cache = CacheCoordinator::in_memory(Duration::from_secs(60));
    let (value, hit) = cache
        .get_or_compute(&inputs(), None, || async { Ok(json!([1, 2])) })
        .await
        .unwrap();
    assert_eq!(value, json!([1, 2]));
    assert!(!hit);

    let (value, hit) = cache
        .get_or_compute(&inputs(), None, || async { Ok(json!("recomputed")) })
        .await
        .unwrap();
    assert_eq!(value, json!([1, 2]));
    assert!(hit);
}

#[tokio::test]
async fn test_expired_entry_is_evicted() {
    let backend = Arc::new(InMemoryCache::new());
    let cache = CacheCoordinator::new(backend.clone(), Duration::from_secs(60));
    cache
        .get_or_compute(&inputs(), Some(Duration::ZERO), || async { Ok(json!(1)) })
        .await
        .unwrap();
    assert_eq!(backend.len(), 1);

    let (value, hit) = cache
        .get_or_compute(&inputs(), Some(Duration::from_secs(60)), || async { Ok(json!(2)) })
        .await
        .unwrap();
    assert_eq!(value, json!(2));
    assert!(!hit);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let cache = CacheCoordinator::in_memory(Duration::from_secs(60));
    let err = cache
        .get_or_compute(&inputs(), None, || async {
            Err(EngineError::Cache("boom".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cache(_)));

    let (_, hit) = cache
        .get_or_compute(&inputs(), None, || async { Ok(json!(3)) })
        .await
        .unwrap();
    assert!(!hit);
}

#[tokio::test]
async fn test_single_flight() {
    let cache = CacheCoordinator::in_memory(Duration::from_secs(60));
    let computations = Arc::new(AtomicUsize::new(0));
    let key_inputs = inputs();

    let requests = (0..8).map(|_| {
        let computations = Arc::clone(&computations);
        cache.get_or_compute(&key_inputs, None, move || async move {
            computations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json!({"rows": 42}))
        })
    });
    let results = join_all(requests).await;

    assert_eq!(computations.load(Ordering::SeqCst), 1);
    let fresh = results
        .iter()
        .filter(|r| matches!(r, Ok((_, false))))
        .count();
    assert_eq!(fresh, 1);
    for result in results {
        assert_eq!(result.unwrap().0, json!({"rows": 42}));
    }
}

#[tokio::test]
async fn test_followers_see_leader_failure() {
    let cache = CacheCoordinator::in_memory(Duration::from_secs(60));
    let key_inputs = inputs();
    let requests = (0..3).map(|_| {
        cache.get_or_compute(&key_inputs, None, || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(EngineError::DataSourceConnection {
                message: "down".into(),
            })
        })
    });
    let results = join_all(requests).await;
    let shared = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::SharedComputation(_))))
        .count();
    assert_eq!(shared, 2);
}

#[tokio::test]
async fn test_abandoned_leader_hands_over_to_one_follower() {
    let cache = Arc::new(CacheCoordinator::in_memory(Duration::from_secs(60)));
    let computations = Arc::new(AtomicUsize::new(0));

    let leader = {
        let cache = Arc::clone(&cache);
        let computations = Arc::clone(&computations);
        tokio::spawn(async move {
            cache
                .get_or_compute(&inputs(), None, || async move {
                    computations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!("never"))
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(computations.load(Ordering::SeqCst), 1);

    let followers: Vec<_> = (0..5)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let computations = Arc::clone(&computations);
            tokio::spawn(async move {
                cache
                    .get_or_compute(&inputs(), None, || async move {
                        computations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!({"rows": 7}))
                    })
                    .await
            })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;
    leader.abort();

    let results = join_all(followers).await;
    assert_eq!(computations.load(Ordering::SeqCst), 2);
    let fresh = results
        .iter()
        .filter(|r| matches!(r, Ok(Ok((_, false)))))
        .count();
    assert_eq!(fresh, 1);
    for result in results {
        assert_eq!(result.unwrap().unwrap().0, json!({"rows": 7}));
    }
}

#[tokio::test]
async fn test_expired_entry_leaves_definition_index() {
    let cache = CacheCoordinator::in_memory(Duration::from_secs(60));
    cache
        .get_or_compute(&inputs(), Some(Duration::ZERO), || async { Ok(json!(1)) })
        .await
        .unwrap();
    assert!(!cache.keys_by_definition.lock().unwrap().is_empty());

    assert_eq!(cache.lookup(&inputs().key()).await, None);
    assert!(cache.keys_by_definition.lock().unwrap().is_empty());
    assert_eq!(cache.invalidate_metric("hash-a").await, 0);
}

#[tokio::test]
async fn test_invalidation() {
    let cache = CacheCoordinator::in_memory(Duration::from_secs(60));
    let other = inputs().with_consumer(Some("c".into()));
    for i in [&inputs(), &other] {
        cache
            .get_or_compute(i, None, || async { Ok(json!(1)) })
            .await
            .unwrap();
    }

    cache.invalidate(&other).await;
    let (_, hit) = cache
        .get_or_compute(&inputs(), None, || async { Ok(json!(2)) })
        .await
        .unwrap();
    assert!(hit);
    let (_, hit) = cache
        .get_or_compute(&other, None, || async { Ok(json!(2)) })
        .await
        .unwrap();
    assert!(!hit);

    assert_eq!(cache.invalidate_metric("hash-a").await, 2);
    let (_, hit) = cache
        .get_or_compute(&inputs(), None, || async { Ok(json!(3)) })
        .await
        .unwrap();
    assert!(!hit);

    cache.flush().await;
    let (_, hit) = cache
        .get_or_compute(&inputs(), None, || async { Ok(json!(4)) })
        .await
        .unwrap();
    assert!(!hit);
}

struct FailingBackend;

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> EngineResult<Option<CacheEntry>> {
        Err(EngineError::Cache("unreachable".into()))
    }
    async fn set(&self, _key: &str, _entry: CacheEntry) -> EngineResult<()> {
        Err(EngineError::Cache("unreachable".into()))
    }
    async fn delete(&self, _key: &str) -> EngineResult<()> {
        Err(EngineError::Cache("unreachable".into()))
    }
    async fn flush(&self) -> EngineResult<()> {
        Err(EngineError::Cache("unreachable".into()))
    }
}

#[tokio::test]
async fn test_backend_errors_degrade_to_miss() {
    let cache = CacheCoordinator::new(Arc::new(FailingBackend), Duration::from_secs(60));
    let (value, hit) = cache
        .get_or_compute(&inputs(), None, || async { Ok(json!("computed")) })
        .await
        .unwrap();
    assert_eq!(value, json!("computed"));
    assert!(!hit);
    cache.flush().await;
}
