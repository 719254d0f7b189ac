//! Process-wide list of live tracking stores.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::store::TrackingStore;

/// Insertion-ordered list of weak store references, enumerated only by the
/// pressure-reclaim path. Holds no ownership; store lifetime belongs to the
/// owning context. Never locked while a store's contents lock is held.
#[derive(Default)]
pub(crate) struct Registry {
    stores: Mutex<Vec<Weak<TrackingStore>>>,
}

impl Registry {
    pub(crate) fn register(&self, store: &Arc<TrackingStore>) {
        self.stores.lock().push(Arc::downgrade(store));
    }

    /// Unlinks a dying store, pruning any already-dead references on the way.
    pub(crate) fn unregister(&self, store: &Arc<TrackingStore>) {
        self.stores
            .lock()
            .retain(|weak| match weak.upgrade() {
                Some(live) => !Arc::ptr_eq(&live, store),
                None => false,
            });
    }

    /// Cheap reclaimable estimate: sums live-entry counters without touching
    /// any contents lock.
    pub(crate) fn reclaimable_count(&self) -> usize {
        self.stores
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|store| store.entry_count())
            .sum()
    }

    /// Visits live stores in insertion order until the visitor returns
    /// `false`. Dead references are pruned first.
    pub(crate) fn for_each_live(&self, mut visit: impl FnMut(&Arc<TrackingStore>) -> bool) {
        let mut stores = self.stores.lock();
        stores.retain(|weak| weak.strong_count() > 0);
        for weak in stores.iter() {
            if let Some(store) = weak.upgrade() {
                if !visit(&store) {
                    break;
                }
            }
        }
    }
}
