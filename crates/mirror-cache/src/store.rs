//! Ordered record store with secondary indexes and structural-sharing
//! snapshots.
//!
//! [`OrderedStore`] keeps the current materialized state as a persistent
//! ordered map, so [`OrderedStore::clone_snapshot`] is O(1): the snapshot
//! shares tree nodes with the live store and later writes copy only the
//! path they touch. Snapshots are immutable and thread-safe to read without
//! coordination.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use im::OrdMap;
use mirror_core::{MirrorError, Record, Result};
use tracing::trace;

/// Computes the index values of a record under a named index.
///
/// Index functions must be deterministic; the store skips index updates when
/// a single-valued index appears unchanged, which is only sound if repeated
/// evaluation of the same record yields the same values.
pub type IndexFunc<T> = Arc<dyn Fn(&Record<T>) -> Vec<String> + Send + Sync>;

/// Named index functions, keyed by index name.
pub type Indexers<T> = HashMap<String, IndexFunc<T>>;

/// One secondary index: index value -> set of record keys producing it.
type Index = HashMap<String, BTreeSet<String>>;

type Tree<T> = OrdMap<String, Arc<Record<T>>>;

/// Lexicographically ordered map from record key to [`Record`], with named
/// secondary indexes.
///
/// Keys compare byte-wise; there is no locale handling and no
/// normalization. The store itself is not synchronized: the cache mutates it
/// under its writer lock and hands out [`StoreSnapshot`]s for lock-free
/// reads.
pub struct OrderedStore<T> {
    tree: Tree<T>,
    indexers: Indexers<T>,
    indices: HashMap<String, Index>,
}

impl<T> OrderedStore<T> {
    /// Create an empty store with the given named index functions.
    pub fn new(indexers: Indexers<T>) -> Self {
        Self {
            tree: OrdMap::new(),
            indexers,
            indices: HashMap::new(),
        }
    }

    /// Number of records currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the store holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Insert or replace the record stored under `record.key()`.
    ///
    /// Returns the previous record, if any. There is no distinction between
    /// add and update at the storage level.
    pub fn add(&mut self, record: Record<T>) -> Result<Option<Arc<Record<T>>>> {
        self.add_or_update(record)
    }

    /// Alias of [`OrderedStore::add`].
    pub fn update(&mut self, record: Record<T>) -> Result<Option<Arc<Record<T>>>> {
        self.add_or_update(record)
    }

    fn add_or_update(&mut self, record: Record<T>) -> Result<Option<Arc<Record<T>>>> {
        if record.key().is_empty() {
            return Err(MirrorError::BadInput {
                reason: "record key must not be empty".to_string(),
            });
        }
        let record = Arc::new(record);
        let previous = self.tree.insert(record.key().to_string(), Arc::clone(&record));
        apply_index_updates(
            &self.indexers,
            &mut self.indices,
            previous.as_deref(),
            Some(&record),
            record.key(),
        );
        Ok(previous)
    }

    /// Remove the record stored under `key`.
    pub fn delete(&mut self, key: &str) -> Result<Arc<Record<T>>> {
        let removed = self.tree.remove(key).ok_or_else(|| MirrorError::NotFound {
            key: key.to_string(),
        })?;
        apply_index_updates(&self.indexers, &mut self.indices, Some(&removed), None, key);
        Ok(removed)
    }

    /// Point lookup by key.
    pub fn get(&self, key: &str) -> Option<Arc<Record<T>>> {
        self.tree.get(key).map(Arc::clone)
    }

    /// Lazy iteration over every record in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record<T>>> + '_ {
        self.tree.iter().map(|(_, record)| record)
    }

    /// Every record in ascending key order.
    pub fn list_all(&self) -> Vec<Arc<Record<T>>> {
        self.iter().map(Arc::clone).collect()
    }

    /// Every key in ascending order.
    pub fn list_keys(&self) -> Vec<String> {
        self.tree.keys().cloned().collect()
    }

    /// Records whose key starts with `prefix`, in ascending key order,
    /// stopping after `limit` items. `limit = 0` means unlimited.
    pub fn prefix_range(&self, prefix: &str, limit: usize) -> Vec<Arc<Record<T>>> {
        scan_range(&self.tree, prefix, prefix, limit)
    }

    /// Atomically drop all content and install `records` instead, rebuilding
    /// every index.
    ///
    /// The replacement tree and indexes are fully assembled before the swap,
    /// so a rejected record leaves the store untouched.
    pub fn replace(&mut self, records: Vec<Record<T>>) -> Result<()> {
        let mut tree = Tree::new();
        let mut indices = HashMap::new();
        for record in records {
            if record.key().is_empty() {
                return Err(MirrorError::BadInput {
                    reason: "record key must not be empty".to_string(),
                });
            }
            let record = Arc::new(record);
            apply_index_updates(
                &self.indexers,
                &mut indices,
                None,
                Some(&record),
                record.key(),
            );
            tree.insert(record.key().to_string(), record);
        }
        self.tree = tree;
        self.indices = indices;
        Ok(())
    }

    /// O(1) snapshot sharing structure with the live tree.
    ///
    /// The snapshot is isolated from subsequent mutations of the store and
    /// serves the read operations only; indexes are not carried over.
    pub fn clone_snapshot(&self) -> StoreSnapshot<T> {
        StoreSnapshot {
            tree: self.tree.clone(),
        }
    }

    /// Records whose `name` index currently maps to `value`, in ascending
    /// key order.
    pub fn by_index(&self, name: &str, value: &str) -> Result<Vec<Arc<Record<T>>>> {
        if !self.indexers.contains_key(name) {
            return Err(MirrorError::UnknownIndex {
                name: name.to_string(),
            });
        }
        let keys = match self.indices.get(name).and_then(|index| index.get(value)) {
            Some(keys) => keys,
            None => return Ok(Vec::new()),
        };
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let record = self.tree.get(key).ok_or_else(|| {
                MirrorError::internal(format!("key {key} indexed but not stored"))
            })?;
            records.push(Arc::clone(record));
        }
        Ok(records)
    }

    #[cfg(test)]
    fn index_value_count(&self, name: &str) -> usize {
        self.indices.get(name).map(HashMap::len).unwrap_or(0)
    }
}

/// Immutable point-in-time view of an [`OrderedStore`].
///
/// Snapshots share structure with the tree they were cloned from; they are
/// cheap to clone again and safe to read from any thread.
pub struct StoreSnapshot<T> {
    tree: Tree<T>,
}

impl<T> StoreSnapshot<T> {
    /// Number of records in the snapshot.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the snapshot holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Point lookup by key.
    pub fn get(&self, key: &str) -> Option<Arc<Record<T>>> {
        self.tree.get(key).map(Arc::clone)
    }

    /// Every record in ascending key order.
    pub fn list_all(&self) -> Vec<Arc<Record<T>>> {
        self.tree.values().map(Arc::clone).collect()
    }

    /// Records whose key starts with `prefix`, in ascending key order,
    /// stopping after `limit` items. `limit = 0` means unlimited.
    pub fn prefix_range(&self, prefix: &str, limit: usize) -> Vec<Arc<Record<T>>> {
        scan_range(&self.tree, prefix, prefix, limit)
    }

    /// Like [`StoreSnapshot::prefix_range`], but seeks to `start` before
    /// scanning. Pagination resumes from a continue token's start key this
    /// way: the seek key is the position, the prefix still bounds the range.
    pub fn prefix_range_from(
        &self,
        start: &str,
        prefix: &str,
        limit: usize,
    ) -> Vec<Arc<Record<T>>> {
        scan_range(&self.tree, start, prefix, limit)
    }
}

impl<T> Clone for StoreSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

fn apply_index_updates<T>(
    indexers: &Indexers<T>,
    indices: &mut HashMap<String, Index>,
    old: Option<&Record<T>>,
    new: Option<&Record<T>>,
    key: &str,
) {
    for (name, index_func) in indexers {
        let old_values = old.map(|record| index_func(record)).unwrap_or_default();
        let new_values = new.map(|record| index_func(record)).unwrap_or_default();

        // Most updates leave a single-valued index unchanged; skip the map
        // churn entirely in that case.
        if old_values.len() == 1 && new_values.len() == 1 && old_values[0] == new_values[0] {
            continue;
        }

        let index = indices.entry(name.clone()).or_default();
        for value in &old_values {
            if let Some(keys) = index.get_mut(value) {
                keys.remove(key);
                // Empty sets must go, or high-churn short-lived records grow
                // the index without bound.
                if keys.is_empty() {
                    index.remove(value);
                }
            }
        }
        for value in new_values {
            index.entry(value).or_default().insert(key.to_string());
        }
    }
}

fn scan_range<T>(
    tree: &Tree<T>,
    start: &str,
    prefix: &str,
    limit: usize,
) -> Vec<Arc<Record<T>>> {
    let mut records = Vec::new();
    for (key, record) in tree.range(start.to_string()..) {
        if limit != 0 && records.len() == limit {
            break;
        }
        if !key.starts_with(prefix) {
            break;
        }
        records.push(Arc::clone(record));
    }
    trace!(start, prefix, limit, returned = records.len(), "range scan");
    records
}
