//! Shared fixtures for the integration tests.

use watchmirror::prelude::*;

/// The payload type the tests mirror: a tiny named object.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub resource_version: u64,
}

pub fn entry(key: &str, value: &str, resource_version: u64) -> Entry {
    Entry {
        key: key.to_string(),
        value: value.to_string(),
        resource_version,
    }
}

pub struct EntryVersioner;

impl Versioner<Entry> for EntryVersioner {
    fn parse_resource_version(&self, raw: &str) -> Result<u64> {
        parse_resource_version(raw)
    }

    fn object_resource_version(&self, object: &Entry) -> Result<u64> {
        Ok(object.resource_version)
    }
}

pub fn new_cache() -> WatchCache<Entry> {
    new_cache_builder().build().expect("cache builds")
}

pub fn new_cache_builder() -> WatchCacheBuilder<Entry> {
    WatchCache::builder()
        .key_func(|object: &Entry| Ok(object.key.clone()))
        .attrs_func(|object: &Entry| {
            let labels = LabelSet::from([("value".to_string(), object.value.clone())]);
            Ok((labels, FieldSet::new()))
        })
        .versioner(EntryVersioner)
}

pub fn keys_of(records: &[std::sync::Arc<Record<Entry>>]) -> Vec<String> {
    records.iter().map(|r| r.key().to_string()).collect()
}
