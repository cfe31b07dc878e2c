//! End-to-end list/get/pagination scenarios.

use std::sync::Arc;

use watchmirror::prelude::*;

use crate::common::{entry, keys_of, new_cache};

#[tokio::test(start_paused = true)]
async fn replace_then_add_then_fresh_list() {
    let cache = new_cache();
    cache
        .replace(
            vec![
                entry("/a", "o1", 0),
                entry("/b", "o2", 0),
                entry("/c", "o3", 0),
            ],
            "10",
        )
        .unwrap();
    cache.add(entry("/d", "o4", 15)).unwrap();

    let result = cache
        .wait_until_fresh_and_list(15, "/", &ListOptions::default())
        .await
        .unwrap();

    assert_eq!(keys_of(&result.records), vec!["/a", "/b", "/c", "/d"]);
    assert_eq!(result.resource_version, 15);
}

#[tokio::test(start_paused = true)]
async fn paginated_list_resumes_from_the_same_snapshot() {
    let cache = new_cache();
    cache
        .replace(
            vec![
                entry("/a", "o1", 0),
                entry("/b", "o2", 0),
                entry("/c", "o3", 0),
            ],
            "10",
        )
        .unwrap();
    cache.add(entry("/d", "o4", 15)).unwrap();

    let options = ListOptions {
        limit: 2,
        continue_token: None,
    };
    let first = cache
        .wait_until_fresh_and_list(15, "/", &options)
        .await
        .unwrap();
    assert_eq!(keys_of(&first.records), vec!["/a", "/b"]);
    assert_eq!(first.resource_version, 15);

    // Resume after "/b": the token's start key is the next possible key.
    let token = encode_continue(first.resource_version as i64, "b\u{0}").unwrap();
    let options = ListOptions {
        limit: 2,
        continue_token: Some(token),
    };
    let second = cache
        .wait_until_fresh_and_list(15, "/", &options)
        .await
        .unwrap();
    assert_eq!(keys_of(&second.records), vec!["/c", "/d"]);
    assert_eq!(second.resource_version, 15);
}

#[tokio::test(start_paused = true)]
async fn pagination_is_isolated_from_concurrent_writes() {
    let cache = new_cache();
    cache
        .replace(
            vec![
                entry("/a", "o1", 0),
                entry("/b", "o2", 0),
                entry("/c", "o3", 0),
            ],
            "10",
        )
        .unwrap();

    let options = ListOptions {
        limit: 2,
        continue_token: None,
    };
    let first = cache
        .wait_until_fresh_and_list(10, "/", &options)
        .await
        .unwrap();
    assert_eq!(keys_of(&first.records), vec!["/a", "/b"]);

    // Writes landing between pages must not leak into the continuation.
    cache.add(entry("/bx", "inserted", 11)).unwrap();
    cache.delete(entry("/c", "o3", 12)).unwrap();

    let token = encode_continue(first.resource_version as i64, "b\u{0}").unwrap();
    let options = ListOptions {
        limit: 10,
        continue_token: Some(token),
    };
    let second = cache
        .wait_until_fresh_and_list(10, "/", &options)
        .await
        .unwrap();
    assert_eq!(keys_of(&second.records), vec!["/c"]);
}

#[tokio::test(start_paused = true)]
async fn freshness_gate_blocks_until_concurrent_write_catches_up() {
    let cache = Arc::new(new_cache());
    cache.replace(vec![], "10").unwrap();

    let reader = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.wait_until_fresh_and_get(20, "/x").await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cache.update(entry("/x", "o", 20)).unwrap();

    let (record, resource_version) = reader.await.unwrap().unwrap();
    assert_eq!(resource_version, 20);
    assert_eq!(record.unwrap().object().value, "o");
    assert_eq!(cache.stats().freshness_timeouts(), 0);
}

#[tokio::test(start_paused = true)]
async fn freshness_gate_timeout_reports_both_versions() {
    let cache = new_cache();
    cache.replace(vec![], "10").unwrap();

    let err = cache
        .wait_until_fresh_and_list(11, "/", &ListOptions::default())
        .await
        .unwrap_err();
    match err {
        MirrorError::TooLargeResourceVersion {
            requested,
            current,
            retry_after_seconds,
        } => {
            assert_eq!(requested, 11);
            assert_eq!(current, 10);
            assert_eq!(retry_after_seconds, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stale_reads_are_served_immediately() {
    let cache = new_cache();
    cache.replace(vec![entry("/a", "o1", 0)], "10").unwrap();

    // rv=0 accepts arbitrarily stale state; nothing can block it.
    let (record, resource_version) = cache.wait_until_fresh_and_get(0, "/a").await.unwrap();
    assert!(record.is_some());
    assert_eq!(resource_version, 10);
}

#[tokio::test(start_paused = true)]
async fn prefixes_bound_limited_lists() {
    let cache = new_cache();
    cache
        .replace(
            vec![
                entry("/pods/a", "1", 0),
                entry("/pods/b", "2", 0),
                entry("/svcs/a", "3", 0),
            ],
            "10",
        )
        .unwrap();

    let options = ListOptions {
        limit: 10,
        continue_token: None,
    };
    let result = cache
        .wait_until_fresh_and_list(10, "/pods", &options)
        .await
        .unwrap();
    // The prefix gets its trailing slash appended before ranging.
    assert_eq!(keys_of(&result.records), vec!["/pods/a", "/pods/b"]);
}

#[test]
fn concurrent_readers_never_observe_torn_state() {
    let cache = Arc::new(new_cache());
    cache.replace(vec![], "1").unwrap();

    let writer = {
        let cache = Arc::clone(&cache);
        std::thread::spawn(move || {
            for version in 2..=500u64 {
                cache
                    .add(entry(&format!("/k/{version:04}"), "x", version))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                let mut last_version = 0;
                let mut last_len = 0;
                for _ in 0..200 {
                    let version = cache.resource_version();
                    let records = cache.list();
                    // Monotone advertised version, monotone content growth:
                    // this workload only adds records.
                    assert!(version >= last_version);
                    assert!(records.len() >= last_len);
                    last_version = version;
                    last_len = records.len();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(cache.len(), 499);
    assert_eq!(cache.resource_version(), 500);
}
