//! Result cache integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lakeview::cache::ResultCache;
use lakeview::query::AggregateQuery;

#[tokio::test]
async fn test_concurrent_lookups_share_one_fetch() {
    let cache = Arc::new(ResultCache::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache.get_or_fetch("query_result", "exec-1", || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("bucket,hits\nlogs,3\n".to_string())
        }
    });
    let second = cache.get_or_fetch("query_result", "exec-1", || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("should never be produced".to_string())
        }
    });

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap(), "bucket,hits\nlogs,3\n");
    assert_eq!(second.unwrap(), "bucket,hits\nlogs,3\n");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_keys_are_structural_not_by_identity() {
    let cache: ResultCache<u32> = ResultCache::new();
    let calls = AtomicUsize::new(0);

    // Two separately constructed but equal descriptors hit the same entry.
    let args = AggregateQuery::new("sum").with_group_by("bucket");
    let first = cache
        .get_or_fetch("table_query", &args, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await
        .unwrap();

    let again = AggregateQuery::new("sum").with_group_by("bucket");
    let second = cache
        .get_or_fetch("table_query", &again, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        })
        .await
        .unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_operations_and_arguments_partition_the_cache() {
    let cache: ResultCache<String> = ResultCache::new();

    let schema = cache
        .get_or_fetch("table_schema", "cdn_logs", || async {
            Ok("schema".to_string())
        })
        .await
        .unwrap();
    let result = cache
        .get_or_fetch("query_result", "cdn_logs", || async {
            Ok("result".to_string())
        })
        .await
        .unwrap();
    let other = cache
        .get_or_fetch("query_result", "elb_logs", || async {
            Ok("other".to_string())
        })
        .await
        .unwrap();

    assert_eq!(schema, "schema");
    assert_eq!(result, "result");
    assert_eq!(other, "other");
    assert_eq!(cache.len(), 3);
}
