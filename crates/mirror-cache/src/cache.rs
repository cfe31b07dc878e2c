//! The watch cache orchestrator.
//!
//! [`WatchCache`] mirrors a strongly-consistent key-value store in memory:
//! a single ingestor feeds it an initial list ([`WatchCache::replace`])
//! followed by a stream of change events, and many concurrent readers serve
//! gets, lists, and "events since" queries from it. Readers can demand a
//! view at least as fresh as a resource version they have already seen; the
//! freshness gate blocks them until the cache catches up or a short timeout
//! tells them to retry.
//!
//! Mutators must be called sequentially, one in flight at a time, the way a
//! reflector drives its store. Readers are unrestricted.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mirror_core::{
    AttrsFunc, ChangeEvent, EventHandler, EventType, KeyFunc, MirrorError, Record,
    ReplaceHandler, Result, Versioner,
};
use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tracing::{debug, trace};

use crate::continue_cache::ContinueCache;
use crate::continue_token::decode_continue;
use crate::interval::EventInterval;
use crate::ring::EventRing;
use crate::stats::CacheStats;
use crate::store::{IndexFunc, Indexers, OrderedStore};

/// How long a freshness-gated read blocks waiting for the cache to catch up
/// before failing with a retry hint.
pub const BLOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// Options for freshness-gated lists.
#[derive(Debug, Default, Clone)]
pub struct ListOptions {
    /// Maximum number of records to return; 0 means unlimited.
    pub limit: u64,
    /// Continue token from a previous limited list, when resuming.
    pub continue_token: Option<String>,
}

/// Result of a freshness-gated list.
#[derive(Debug)]
pub struct ListResult<T> {
    /// Matching records in ascending key order.
    pub records: Vec<Arc<Record<T>>>,
    /// Resource version the list was served at.
    pub resource_version: u64,
    /// Name of the index used to serve the list. Reserved; always `None`.
    pub index_used: Option<String>,
}

/// Mutable cache state, guarded by the reader-writer lock.
pub(crate) struct CacheState<T> {
    pub(crate) ring: EventRing<T>,
    pub(crate) store: OrderedStore<T>,
    /// Resource version up to which the cache is propagated.
    pub(crate) resource_version: u64,
    /// Resource version of the last replace.
    pub(crate) list_resource_version: u64,
}

/// In-memory, ordered, resource-version-indexed mirror of an upstream
/// key-value store.
///
/// See the [module documentation](self) for the ingest/read model. The
/// payload type `T` stays opaque; the injected key, attribute, and versioner
/// collaborators interpret it.
pub struct WatchCache<T> {
    state: Arc<RwLock<CacheState<T>>>,
    continue_cache: ContinueCache<T>,
    /// Publishes every advance of the advertised resource version to
    /// freshness-gate waiters.
    rv_tx: watch::Sender<u64>,
    rv_rx: watch::Receiver<u64>,
    key_func: KeyFunc<T>,
    attrs_func: AttrsFunc<T>,
    versioner: Arc<dyn Versioner<T>>,
    event_handler: Option<EventHandler<T>>,
    on_replace: Mutex<Option<ReplaceHandler>>,
    stats: CacheStats,
}

impl<T> fmt::Debug for WatchCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCache").finish_non_exhaustive()
    }
}

impl<T> WatchCache<T> {
    /// Start building a watch cache.
    pub fn builder() -> WatchCacheBuilder<T> {
        WatchCacheBuilder::new()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState<T>> {
        self.state.read().expect("watch cache lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState<T>> {
        self.state.write().expect("watch cache lock poisoned")
    }

    /// Cache statistics.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Resource version the cache has been propagated to.
    pub fn resource_version(&self) -> u64 {
        self.read_state().resource_version
    }

    /// Number of records currently mirrored.
    pub fn len(&self) -> usize {
        self.read_state().store.len()
    }

    /// Whether the cache mirrors no records.
    pub fn is_empty(&self) -> bool {
        self.read_state().store.is_empty()
    }

    /// Register the callback run after every successful replace.
    pub fn set_on_replace(&self, handler: ReplaceHandler) {
        *self
            .on_replace
            .lock()
            .expect("watch cache lock poisoned") = Some(handler);
    }

    /// Ingest an addition observed upstream.
    pub fn add(&self, object: T) -> Result<()> {
        self.process_event(EventType::Added, object)
    }

    /// Ingest a modification observed upstream.
    pub fn update(&self, object: T) -> Result<()> {
        self.process_event(EventType::Modified, object)
    }

    /// Ingest a deletion observed upstream.
    pub fn delete(&self, object: T) -> Result<()> {
        self.process_event(EventType::Deleted, object)
    }

    /// Safe as long as there is at most one mutator call in flight at any
    /// point in time; the ingestor drives them sequentially.
    fn process_event(&self, kind: EventType, object: T) -> Result<()> {
        let object = Arc::new(object);
        let resource_version = self.versioner.object_resource_version(&object)?;
        let key = (self.key_func)(&object)?;
        let (labels, fields) = (self.attrs_func)(&object)?;
        let record = Record::new(key.clone(), object, labels, fields);
        let mut event = ChangeEvent::from_record(kind, &record, resource_version);

        let applied = {
            let mut state = self.write_state();
            if let Some(previous) = state.store.get(&key) {
                event = event.with_previous(&previous);
            }
            let event = Arc::new(event);

            let evicted = state.ring.append(Arc::clone(&event));
            if !evicted.is_empty() {
                for resource_version in &evicted {
                    self.continue_cache.evict(*resource_version);
                }
                self.stats.record_evictions(evicted.len() as u64);
            }
            self.stats.set_ring_capacity(state.ring.capacity() as u64);

            state.resource_version = resource_version;
            self.rv_tx.send_replace(resource_version);

            match kind {
                EventType::Added | EventType::Modified => {
                    state.store.add(record)?;
                }
                EventType::Deleted => {
                    state.store.delete(&key)?;
                }
                EventType::Bookmark => {
                    return Err(MirrorError::internal(
                        "bookmarks are not ingested as change events",
                    ));
                }
            }
            event
        };

        debug!(
            key = %applied.key,
            kind = %applied.kind,
            resource_version,
            "applied event"
        );
        self.stats.record_event();
        // The handler runs outside the lock; with one mutator in flight at a
        // time it still observes events in order, exactly once.
        if let Some(handler) = &self.event_handler {
            handler(&applied);
        }
        Ok(())
    }

    /// Reset the cache to the supplied state at `resource_version`,
    /// clearing the event history.
    pub fn replace(&self, objects: Vec<T>, resource_version: &str) -> Result<()> {
        let version = self.versioner.parse_resource_version(resource_version)?;
        let mut records = Vec::with_capacity(objects.len());
        for object in objects {
            let object = Arc::new(object);
            let key = (self.key_func)(&object)?;
            let (labels, fields) = (self.attrs_func)(&object)?;
            records.push(Record::new(key, object, labels, fields));
        }

        {
            let mut state = self.write_state();
            state.ring.clear();
            state.store.replace(records)?;
            state.list_resource_version = version;
            state.resource_version = version;
            // Every retained continuation snapshot's version just left the
            // history with the ring reset.
            self.continue_cache.clear();
            self.rv_tx.send_replace(version);
            if let Some(on_replace) = self
                .on_replace
                .lock()
                .expect("watch cache lock poisoned")
                .as_ref()
            {
                on_replace();
            }
        }

        self.stats.record_replace();
        debug!(resource_version = version, "replaced watch cache content");
        Ok(())
    }

    /// Advance the advertised resource version without mutating state.
    ///
    /// The bookmark reaches the subscriber but never the event history or
    /// the store: watchers learn that nothing happened but time passed, and
    /// freshness-gate waiters at or below `resource_version` unblock.
    pub fn update_resource_version(&self, resource_version: &str) -> Result<()> {
        let version = self.versioner.parse_resource_version(resource_version)?;
        {
            let mut state = self.write_state();
            state.resource_version = version;
            self.rv_tx.send_replace(version);
        }
        trace!(resource_version = version, "bookmarked resource version");
        self.stats.record_bookmark();
        if let Some(handler) = &self.event_handler {
            handler(&ChangeEvent::bookmark(version));
        }
        Ok(())
    }

    /// Non-blocking point lookup, keyed through the injected key function.
    pub fn get(&self, object: &T) -> Result<Option<Arc<Record<T>>>> {
        let key = (self.key_func)(object)?;
        Ok(self.get_by_key(&key))
    }

    /// Non-blocking point lookup by key.
    pub fn get_by_key(&self, key: &str) -> Option<Arc<Record<T>>> {
        self.read_state().store.get(key)
    }

    /// Every mirrored record in ascending key order, at whatever freshness
    /// the cache currently has.
    pub fn list(&self) -> Vec<Arc<Record<T>>> {
        self.read_state().store.list_all()
    }

    /// Every mirrored key in ascending order.
    pub fn list_keys(&self) -> Vec<String> {
        self.read_state().store.list_keys()
    }

    /// Records currently mapped to `value` under the named index.
    pub fn by_index(&self, name: &str, value: &str) -> Result<Vec<Arc<Record<T>>>> {
        self.read_state().store.by_index(name, value)
    }

    /// Whether an event with exactly this resource version is still in the
    /// history window.
    pub fn contains_resource_version(&self, resource_version: u64) -> bool {
        self.read_state()
            .ring
            .contains_resource_version(resource_version)
    }

    /// Block until the advertised resource version reaches
    /// `resource_version`.
    ///
    /// `resource_version = 0` accepts arbitrarily stale state and returns
    /// immediately, without arming the timeout. Otherwise the wait is bound
    /// by [`BLOCK_TIMEOUT`], after which the caller gets a
    /// [`MirrorError::TooLargeResourceVersion`] with a retry hint.
    async fn wait_until_fresh(&self, resource_version: u64) -> Result<()> {
        if resource_version == 0 {
            return Ok(());
        }
        let mut rx = self.rv_rx.clone();
        let result = timeout(BLOCK_TIMEOUT, rx.wait_for(|current| *current >= resource_version))
            .await
            .map(|inner| inner.map(|_| ()));
        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(MirrorError::internal(
                "resource version publisher dropped",
            )),
            Err(_elapsed) => {
                self.stats.record_freshness_timeout();
                let current = *self.rv_rx.borrow();
                trace!(
                    requested = resource_version,
                    current,
                    "freshness gate timed out"
                );
                Err(MirrorError::too_large(resource_version, current))
            }
        }
    }

    /// Freshness-gated point lookup.
    ///
    /// Returns the record (if present) and the resource version the lookup
    /// was served at, which is at least `resource_version`.
    pub async fn wait_until_fresh_and_get(
        &self,
        resource_version: u64,
        key: &str,
    ) -> Result<(Option<Arc<Record<T>>>, u64)> {
        self.wait_until_fresh(resource_version).await?;
        let state = self.read_state();
        Ok((state.store.get(key), state.resource_version))
    }

    /// Freshness-gated list under `key_prefix`.
    ///
    /// Unlimited lists return the full current content. Limited lists are
    /// served from a structural-sharing snapshot so the page is built
    /// without blocking the ingestor; the snapshot is retained, keyed by the
    /// returned resource version, and continue tokens resume from it until
    /// that version leaves the event history.
    pub async fn wait_until_fresh_and_list(
        &self,
        resource_version: u64,
        key_prefix: &str,
        options: &ListOptions,
    ) -> Result<ListResult<T>> {
        self.wait_until_fresh(resource_version).await?;

        if options.limit == 0 {
            let state = self.read_state();
            return Ok(ListResult {
                records: state.store.list_all(),
                resource_version: state.resource_version,
                index_used: None,
            });
        }

        let mut prefix = key_prefix.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        let continuation = match options.continue_token.as_deref() {
            Some(token) if !token.is_empty() => Some(decode_continue(token, &prefix)?),
            _ => None,
        };

        // Clone or look up the snapshot under the read lock, then serve the
        // page outside it.
        let (snapshot, start_key, served_version) = {
            let state = self.read_state();
            match continuation {
                Some((start_key, token_version)) => {
                    let token_version = token_version as u64;
                    match self.continue_cache.lookup(token_version) {
                        Some(snapshot) => {
                            self.stats.record_continue_hit();
                            (snapshot, start_key, state.resource_version)
                        }
                        None => {
                            self.stats.record_continue_miss();
                            return Err(MirrorError::too_old(token_version));
                        }
                    }
                }
                None => {
                    let snapshot = state.store.clone_snapshot();
                    self.continue_cache
                        .install(state.resource_version, snapshot.clone());
                    self.stats.record_snapshot_installed();
                    (snapshot, prefix.clone(), state.resource_version)
                }
            }
        };

        let records = snapshot.prefix_range_from(&start_key, &prefix, options.limit as usize);
        Ok(ListResult {
            records,
            resource_version: served_version,
            index_used: None,
        })
    }

    /// Historical events with a resource version greater than
    /// `resource_version`, as a consumable interval.
    ///
    /// `resource_version = 0` replays the current content as synthetic
    /// additions stamped with the advertised resource version. A version
    /// below the retained window fails with
    /// [`MirrorError::ResourceExpired`]; the caller relists.
    pub fn events_since(&self, resource_version: u64) -> Result<EventInterval<T>> {
        let state = self.read_state();

        // Oldest version this cache can still deliver an event for.
        let oldest = if state.list_resource_version > 0 && state.ring.start_index() == 0 {
            // Nothing has been evicted since the last replace: history is
            // complete from one past the list version.
            state.list_resource_version + 1
        } else {
            match state.ring.oldest_resource_version() {
                Some(version) => version,
                None => return Err(MirrorError::Uninitialized),
            }
        };

        if resource_version == 0 {
            // Replay the current state as if freshly listed, then the caller
            // joins the live stream.
            let events = state
                .store
                .iter()
                .map(|record| {
                    Arc::new(ChangeEvent::from_record(
                        EventType::Added,
                        record,
                        state.resource_version,
                    ))
                })
                .collect();
            return Ok(EventInterval::from_buffer(events));
        }

        if resource_version < oldest.saturating_sub(1) {
            return Err(MirrorError::too_old_with_oldest(
                resource_version,
                oldest.saturating_sub(1),
            ));
        }

        let first = state.ring.first_position_after(resource_version);
        Ok(EventInterval::over_ring(
            Arc::clone(&self.state),
            first,
            state.ring.end_index(),
        ))
    }
}

/// Builder for [`WatchCache`].
///
/// The key function, attribute function, and versioner are required; they
/// are the seams through which the cache interprets its otherwise opaque
/// payloads. All injected callbacks must be pure, must tolerate reentrant
/// calls, and must not call back into the cache.
pub struct WatchCacheBuilder<T> {
    key_func: Option<KeyFunc<T>>,
    attrs_func: Option<AttrsFunc<T>>,
    versioner: Option<Arc<dyn Versioner<T>>>,
    indexers: Indexers<T>,
    event_handler: Option<EventHandler<T>>,
    on_replace: Option<ReplaceHandler>,
    capacity_bounds: Option<(usize, usize)>,
}

impl<T> WatchCacheBuilder<T> {
    /// Create a builder with nothing configured.
    pub fn new() -> Self {
        Self {
            key_func: None,
            attrs_func: None,
            versioner: None,
            indexers: Indexers::new(),
            event_handler: None,
            on_replace: None,
            capacity_bounds: None,
        }
    }

    /// Set the function computing the storage key of an object.
    pub fn key_func(
        mut self,
        key_func: impl Fn(&T) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.key_func = Some(Arc::new(key_func));
        self
    }

    /// Set the function computing the label and field attributes of an
    /// object.
    pub fn attrs_func(
        mut self,
        attrs_func: impl Fn(&T) -> Result<(mirror_core::LabelSet, mirror_core::FieldSet)>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.attrs_func = Some(Arc::new(attrs_func));
        self
    }

    /// Set the resource-version parser/extractor.
    pub fn versioner(mut self, versioner: impl Versioner<T> + 'static) -> Self {
        self.versioner = Some(Arc::new(versioner));
        self
    }

    /// Register a named index function.
    pub fn indexer(
        mut self,
        name: impl Into<String>,
        index_func: impl Fn(&Record<T>) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        let index_func: IndexFunc<T> = Arc::new(index_func);
        self.indexers.insert(name.into(), index_func);
        self
    }

    /// Set the single subscriber receiving every applied event.
    pub fn event_handler(
        mut self,
        event_handler: impl Fn(&ChangeEvent<T>) + Send + Sync + 'static,
    ) -> Self {
        self.event_handler = Some(Box::new(event_handler));
        self
    }

    /// Set the callback run after every successful replace.
    pub fn on_replace(mut self, on_replace: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_replace = Some(Box::new(on_replace));
        self
    }

    /// Override the event history capacity bounds. Intended for tests; the
    /// defaults suit production.
    pub fn capacity_bounds(mut self, lower: usize, upper: usize) -> Self {
        self.capacity_bounds = Some((lower, upper));
        self
    }

    /// Build the cache.
    pub fn build(self) -> Result<WatchCache<T>> {
        let key_func = self.key_func.ok_or_else(|| MirrorError::BadInput {
            reason: "key_func is required".to_string(),
        })?;
        let attrs_func = self.attrs_func.ok_or_else(|| MirrorError::BadInput {
            reason: "attrs_func is required".to_string(),
        })?;
        let versioner = self.versioner.ok_or_else(|| MirrorError::BadInput {
            reason: "versioner is required".to_string(),
        })?;

        let ring = match self.capacity_bounds {
            Some((lower, upper)) => EventRing::with_bounds(lower, upper),
            None => EventRing::new(),
        };
        let stats = CacheStats::new();
        stats.set_ring_capacity(ring.capacity() as u64);
        let (rv_tx, rv_rx) = watch::channel(0);

        Ok(WatchCache {
            state: Arc::new(RwLock::new(CacheState {
                ring,
                store: OrderedStore::new(self.indexers),
                resource_version: 0,
                list_resource_version: 0,
            })),
            continue_cache: ContinueCache::new(),
            rv_tx,
            rv_rx,
            key_func,
            attrs_func,
            versioner,
            event_handler: self.event_handler,
            on_replace: Mutex::new(self.on_replace),
            stats,
        })
    }
}

impl<T> Default for WatchCacheBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
