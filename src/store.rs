//! Per-owner tracking store and its two-level locking.
//!
//! Each owning context has one [`StoreSlot`], a short-lived lock around the
//! *existence* of its [`TrackingStore`]. Contents live behind the store's own
//! mutex, held for the duration of one logical operation. Lookup transitions
//! from the slot lock into the contents lock before releasing the slot lock,
//! so a concurrent destroy can never free a store between the pointer read
//! and first use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use rustc_hash::FxHashMap;

use crate::error::{Result, ThrottleError};
use crate::record::RecordBits;

type StoreMap = FxHashMap<u64, RecordBits>;
type MapGuard = ArcMutexGuard<RawMutex, StoreMap>;

/// Hard ceiling on entries in one store, above any configurable soft cap.
/// Inserts past it fail like an allocation failure would: the page simply
/// goes untracked.
const STORE_HARD_LIMIT: usize = 16_000_000;

/// Migration-history map for one owning context.
pub(crate) struct TrackingStore {
    map: Arc<Mutex<StoreMap>>,
    entries: AtomicUsize,
    hard_limit: usize,
}

impl TrackingStore {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_hard_limit(STORE_HARD_LIMIT)
    }

    pub(crate) fn with_hard_limit(hard_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            map: Arc::new(Mutex::new(StoreMap::default())),
            entries: AtomicUsize::new(0),
            hard_limit,
        })
    }

    /// Live-entry count, readable without the contents lock. Kept in step
    /// with every insert and remove under that lock.
    pub(crate) fn entry_count(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// Acquires the contents lock, opening one logical critical section.
    pub(crate) fn lock(self: &Arc<Self>) -> StoreGuard {
        StoreGuard {
            map: self.map.lock_arc(),
            store: Arc::clone(self),
        }
    }
}

/// Per-owner slot guarding the store pointer.
pub(crate) struct StoreSlot {
    ptr: Mutex<Option<Arc<TrackingStore>>>,
}

impl StoreSlot {
    pub(crate) fn empty() -> Self {
        Self {
            ptr: Mutex::new(None),
        }
    }

    /// Installs a store, returning any displaced one.
    pub(crate) fn replace(&self, store: Arc<TrackingStore>) -> Option<Arc<TrackingStore>> {
        self.ptr.lock().replace(store)
    }

    /// Clears the pointer so no new lookup can reach the store. The caller
    /// unregisters and drops it afterwards; in-flight guards keep the
    /// contents alive until they release.
    pub(crate) fn clear(&self) -> Option<Arc<TrackingStore>> {
        self.ptr.lock().take()
    }

    /// Current store, if the slot has not been cleared.
    pub(crate) fn store(&self) -> Option<Arc<TrackingStore>> {
        self.ptr.lock().clone()
    }

    /// Two-phase hand-off into the contents lock: the contents lock is
    /// acquired before the slot lock is released.
    pub(crate) fn lock_contents(&self) -> Option<StoreGuard> {
        let ptr = self.ptr.lock();
        let store = Arc::clone(ptr.as_ref()?);
        let guard = store.lock();
        drop(ptr);
        Some(guard)
    }
}

/// One critical section over a store's contents.
pub(crate) struct StoreGuard {
    map: MapGuard,
    store: Arc<TrackingStore>,
}

impl StoreGuard {
    pub(crate) fn get(&self, pfn: u64) -> Option<RecordBits> {
        self.map.get(&pfn).copied()
    }

    pub(crate) fn insert(&mut self, pfn: u64, record: RecordBits) -> Result<()> {
        let fresh = !self.map.contains_key(&pfn);
        if fresh && self.map.len() >= self.store.hard_limit {
            return Err(ThrottleError::StoreFull);
        }
        self.map.insert(pfn, record);
        if fresh {
            self.store.entries.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, pfn: u64) -> Option<RecordBits> {
        let removed = self.map.remove(&pfn);
        if removed.is_some() {
            self.store.entries.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Removes entries matching the predicate, stopping after `limit`
    /// removals. Returns the number removed.
    pub(crate) fn evict_where(
        &mut self,
        limit: usize,
        mut expired: impl FnMut(RecordBits) -> bool,
    ) -> usize {
        if limit == 0 {
            return 0;
        }
        let mut victims = Vec::new();
        for (&pfn, &record) in self.map.iter() {
            if expired(record) {
                victims.push(pfn);
                if victims.len() >= limit {
                    break;
                }
            }
        }
        for pfn in &victims {
            self.map.remove(pfn);
        }
        if !victims.is_empty() {
            self.store.entries.fetch_sub(victims.len(), Ordering::Relaxed);
        }
        victims.len()
    }
}
