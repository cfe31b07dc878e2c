//! Event history, ring capacity, and events-since scenarios.

use watchmirror::prelude::*;

use crate::common::{entry, new_cache, new_cache_builder};

#[tokio::test(start_paused = true)]
async fn full_fresh_ring_doubles_and_drops_displaced_snapshot() {
    let cache = new_cache();

    // First add, then a limited list: its snapshot is retained keyed by the
    // advertised version 100.
    cache.add(entry("/k/100", "x", 100)).unwrap();
    let options = ListOptions {
        limit: 1,
        continue_token: None,
    };
    let first = cache
        .wait_until_fresh_and_list(100, "/", &options)
        .await
        .unwrap();
    assert_eq!(first.resource_version, 100);
    assert_eq!(cache.stats().snapshots_installed(), 1);

    // Fill the ring to its initial capacity of 100.
    for version in 101..=199u64 {
        cache
            .add(entry(&format!("/k/{version}"), "x", version))
            .unwrap();
    }
    assert_eq!(cache.stats().ring_capacity(), 100);
    assert!(cache.contains_resource_version(100));

    // Everything in the window is fresh, so the next append doubles the
    // capacity and still displaces the oldest event.
    cache.add(entry("/k/200", "x", 200)).unwrap();
    assert_eq!(cache.stats().ring_capacity(), 200);
    assert_eq!(cache.stats().events_evicted(), 1);
    assert!(!cache.contains_resource_version(100));
    assert!(cache.contains_resource_version(101));

    // The displaced version took its continuation snapshot with it.
    let token = encode_continue(100, "k/100\u{0}").unwrap();
    let options = ListOptions {
        limit: 1,
        continue_token: Some(token),
    };
    let err = cache
        .wait_until_fresh_and_list(100, "/", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, MirrorError::ResourceExpired(_)));

    // And an events-since below the displaced version is no longer
    // servable.
    let err = cache.events_since(99).unwrap_err();
    assert!(matches!(err, MirrorError::ResourceExpired(_)));
}

#[tokio::test(start_paused = true)]
async fn displaced_version_expires_retained_continuations() {
    let cache = new_cache_builder().capacity_bounds(3, 3).build().unwrap();
    cache.replace(vec![entry("/a", "o", 0)], "10").unwrap();
    cache.add(entry("/b", "o", 11)).unwrap();

    let options = ListOptions {
        limit: 1,
        continue_token: None,
    };
    let first = cache
        .wait_until_fresh_and_list(11, "/", &options)
        .await
        .unwrap();
    assert_eq!(first.resource_version, 11);

    // Push version 11 out of the three-slot window.
    for version in 12..=15u64 {
        cache
            .add(entry(&format!("/k/{version}"), "o", version))
            .unwrap();
    }

    let token = encode_continue(11, "a\u{0}").unwrap();
    let options = ListOptions {
        limit: 1,
        continue_token: Some(token),
    };
    let err = cache
        .wait_until_fresh_and_list(11, "/", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, MirrorError::ResourceExpired(_)));
}

#[test]
fn events_since_below_the_window_requires_relist() {
    let cache = new_cache();
    for version in 100..=199u64 {
        cache
            .add(entry(&format!("/k/{version}"), "x", version))
            .unwrap();
    }

    let err = cache.events_since(50).unwrap_err();
    assert!(matches!(err, MirrorError::ResourceExpired(_)));
    assert!(err.to_string().contains("too old resource version: 50"));
}

#[test]
fn events_since_replays_history_in_version_order() {
    let cache = new_cache();
    cache.replace(vec![], "10").unwrap();
    for version in 11..=40u64 {
        cache
            .add(entry(&format!("/k/{version}"), "x", version))
            .unwrap();
    }

    let mut interval = cache.events_since(25).unwrap();
    let events = interval.collect_remaining().unwrap();
    let versions: Vec<_> = events.iter().map(|e| e.resource_version).collect();
    let expected: Vec<_> = (26..=40u64).collect();
    assert_eq!(versions, expected);
}

#[test]
fn events_since_zero_synthesizes_the_current_state() {
    let cache = new_cache();
    cache
        .replace(vec![entry("/b", "o2", 0), entry("/a", "o1", 0)], "10")
        .unwrap();

    let mut interval = cache.events_since(0).unwrap();
    let events = interval.collect_remaining().unwrap();

    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e.kind == EventType::Added && e.resource_version == 10));
    let keys: Vec<_> = events.iter().map(|e| e.key.clone()).collect();
    assert_eq!(keys, vec!["/a", "/b"]);
}

#[test]
fn bookmarks_advance_the_gate_without_history() {
    let cache = new_cache();
    cache.replace(vec![entry("/a", "o", 0)], "10").unwrap();

    cache.update_resource_version("50").unwrap();
    assert_eq!(cache.resource_version(), 50);

    // No event entered the ring; history still starts right after the list.
    let mut interval = cache.events_since(10).unwrap();
    assert!(interval.next().unwrap().is_none());
}

#[test]
fn deletes_replay_with_previous_state() {
    let cache = new_cache();
    cache.replace(vec![entry("/a", "original", 0)], "10").unwrap();
    cache.delete(entry("/a", "original", 11)).unwrap();

    let mut interval = cache.events_since(10).unwrap();
    let events = interval.collect_remaining().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventType::Deleted);
    let previous = events[0].prev_object.as_ref().expect("previous object");
    assert_eq!(previous.value, "original");
}
