//! Tabula store: page cache keyed by canonical query, fetch tasks, and the
//! displayed-page slot readers observe.

#![forbid(unsafe_code)]

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use rustc_hash::{FxHashMap, FxHashSet};
use tabula_api::{DataSource, SourceError, SourceResult};
use tabula_core::{Page, Params, QueryKey};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bounded cache of completed pages with FIFO eviction, plus in-flight bookkeeping.
pub struct PageCache<T> {
    map: FxHashMap<QueryKey, Arc<Page<T>>>,
    order: VecDeque<QueryKey>,
    inflight: FxHashSet<QueryKey>,
    cap: usize,
    dropped: u64,
}

impl<T> PageCache<T> {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            map: FxHashMap::default(),
            order: VecDeque::new(),
            inflight: FxHashSet::default(),
            cap: cap.max(1),
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
    pub fn dropped(&self) -> u64 { self.dropped }
    pub fn contains(&self, key: &QueryKey) -> bool { self.map.contains_key(key) }
    pub fn is_inflight(&self, key: &QueryKey) -> bool { self.inflight.contains(key) }

    /// Cached page for `key`. Counts a hit or a miss.
    pub fn get(&self, key: &QueryKey) -> Option<Arc<Page<T>>> {
        let hit = self.map.get(key).cloned();
        if hit.is_some() {
            counter!("page_cache_hits_total", 1u64);
        } else {
            counter!("page_cache_misses_total", 1u64);
        }
        hit
    }

    /// Like [`Self::get`] without touching hit/miss counters.
    pub fn peek(&self, key: &QueryKey) -> Option<&Arc<Page<T>>> { self.map.get(key) }

    /// Claim `key` for fetching. `false` when it is already cached or in flight.
    pub fn begin(&mut self, key: &QueryKey) -> bool {
        if self.map.contains_key(key) || self.inflight.contains(key) {
            return false;
        }
        self.inflight.insert(key.clone());
        true
    }

    /// Store a completed page, evicting the oldest entry when full.
    pub fn complete(&mut self, key: QueryKey, page: Arc<Page<T>>) {
        self.inflight.remove(&key);
        if !self.map.contains_key(&key) {
            if self.order.len() >= self.cap {
                if let Some(old) = self.order.pop_front() {
                    self.map.remove(&old);
                    self.dropped += 1;
                    counter!("page_cache_evictions_total", 1u64);
                    debug!(key = %old, "cache: evicted");
                }
            }
            self.order.push_back(key.clone());
        }
        self.map.insert(key, page);
        gauge!("page_cache_entries", self.map.len() as f64);
    }

    /// Release a failed key so a later request can retry it.
    pub fn fail(&mut self, key: &QueryKey) { self.inflight.remove(key); }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
        self.inflight.clear();
    }
}

/// Result of one fetch task, delivered to the owning view.
#[derive(Debug)]
pub struct FetchUpdate<P> {
    pub key: QueryKey,
    /// Caller-chosen tag telling repeated fetches of one key apart.
    pub ticket: u64,
    pub result: SourceResult<P>,
}

pub type ListUpdate<S> = FetchUpdate<Page<<S as DataSource>::Item>>;
pub type RecordUpdate<S> = FetchUpdate<<S as DataSource>::Item>;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Await a source call; a panic inside it becomes a `Transport` error so the
/// key never stays in flight.
async fn guarded<T, F>(fut: F) -> SourceResult<T>
where
    F: Future<Output = SourceResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            counter!("fetch_panics_total", 1u64);
            Err(SourceError::Transport(format!("data source panicked: {msg}")))
        }
    }
}

/// Fetch one page in the background and send the outcome on `tx`.
pub fn spawn_fetch<S: DataSource>(
    source: Arc<S>,
    key: QueryKey,
    params: Params,
    ticket: u64,
    tx: mpsc::UnboundedSender<ListUpdate<S>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let t0 = Instant::now();
        debug!(key = %key, "fetch: list start");
        let result = guarded(source.list(&key.resource, &params)).await;
        let took = t0.elapsed().as_secs_f64() * 1000.0;
        histogram!("fetch_ms", took);
        match &result {
            Ok(page) => info!(key = %key, rows = page.len(), page_count = page.page_count, took_ms = %t0.elapsed().as_millis(), "fetch: list ok"),
            Err(e) => {
                counter!("fetch_failures_total", 1u64, "kind" => "list");
                warn!(key = %key, error = %e, "fetch: list failed");
            }
        }
        if tx.send(FetchUpdate { key, ticket, result }).is_err() {
            debug!("fetch: receiver gone");
        }
    })
}

/// Fetch one record by path in the background. The key's resource is the record path.
pub fn spawn_retrieve<S: DataSource>(
    source: Arc<S>,
    key: QueryKey,
    ticket: u64,
    tx: mpsc::UnboundedSender<RecordUpdate<S>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let t0 = Instant::now();
        let result = guarded(source.retrieve(&key.resource)).await;
        histogram!("fetch_ms", t0.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(_) => info!(path = %key.resource, took_ms = %t0.elapsed().as_millis(), "fetch: retrieve ok"),
            Err(e) => {
                counter!("fetch_failures_total", 1u64, "kind" => "retrieve");
                warn!(path = %key.resource, error = %e, "fetch: retrieve failed");
            }
        }
        let _ = tx.send(FetchUpdate { key, ticket, result });
    })
}

/// Writer side of the displayed page.
pub struct DisplaySlot<T> {
    slot: Arc<ArcSwapOption<Page<T>>>,
    epoch_tx: watch::Sender<u64>,
    epoch: u64,
}

/// Reader side: current displayed page and swap notifications.
pub struct DisplayHandle<T> {
    slot: Arc<ArcSwapOption<Page<T>>>,
    epoch_rx: watch::Receiver<u64>,
}

impl<T> Clone for DisplayHandle<T> {
    fn clone(&self) -> Self { Self { slot: Arc::clone(&self.slot), epoch_rx: self.epoch_rx.clone() } }
}

impl<T> DisplaySlot<T> {
    pub fn new() -> Self {
        let (epoch_tx, _) = watch::channel(0u64);
        Self { slot: Arc::new(ArcSwapOption::empty()), epoch_tx, epoch: 0 }
    }

    /// Swap in `page`; rows and page count change together.
    pub fn publish(&mut self, page: Arc<Page<T>>) {
        self.slot.store(Some(page));
        self.epoch = self.epoch.saturating_add(1);
        self.epoch_tx.send_replace(self.epoch);
    }

    pub fn current(&self) -> Option<Arc<Page<T>>> { self.slot.load_full() }
    pub fn epoch(&self) -> u64 { self.epoch }

    pub fn handle(&self) -> DisplayHandle<T> {
        DisplayHandle { slot: Arc::clone(&self.slot), epoch_rx: self.epoch_tx.subscribe() }
    }
}

impl<T> Default for DisplaySlot<T> {
    fn default() -> Self { Self::new() }
}

impl<T> DisplayHandle<T> {
    pub fn current(&self) -> Option<Arc<Page<T>>> { self.slot.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn key(page: u32) -> QueryKey { QueryKey::new("/api/tracks/", page, &Params::new()) }
    fn page(n: usize) -> Arc<Page<Value>> { Arc::new(Page::single((0..n).map(|i| json!({"pk": i})).collect())) }

    #[test]
    fn begin_claims_once() {
        let mut c: PageCache<Value> = PageCache::with_capacity(4);
        assert!(c.begin(&key(1)));
        assert!(!c.begin(&key(1)));
        assert!(c.is_inflight(&key(1)));
        c.complete(key(1), page(1));
        assert!(!c.is_inflight(&key(1)));
        assert!(!c.begin(&key(1)));
    }

    #[test]
    fn failed_key_can_be_retried() {
        let mut c: PageCache<Value> = PageCache::with_capacity(4);
        assert!(c.begin(&key(1)));
        c.fail(&key(1));
        assert!(c.begin(&key(1)));
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut c: PageCache<Value> = PageCache::with_capacity(2);
        for p in 1..=3 {
            c.complete(key(p), page(p as usize));
        }
        assert_eq!(c.len(), 2);
        assert_eq!(c.dropped(), 1);
        assert!(c.get(&key(1)).is_none());
        assert_eq!(c.get(&key(3)).map(|p| p.len()), Some(3));
        // overwrite keeps position
        c.complete(key(2), page(5));
        assert_eq!(c.len(), 2);
        assert_eq!(c.dropped(), 1);
    }

    #[test]
    fn slot_publishes_and_bumps_epoch() {
        let mut slot: DisplaySlot<Value> = DisplaySlot::new();
        let handle = slot.handle();
        assert!(handle.current().is_none());
        slot.publish(page(2));
        assert_eq!(handle.current().map(|p| p.len()), Some(2));
        assert_eq!(*handle.subscribe_epoch().borrow(), 1);
    }
}
