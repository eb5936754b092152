use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::{DictionaryStore, LookupOptions, RangeMatch, StoreError, StoreNotification};
use crate::dict::{Connectivity, DicdataElement, DictEntry};
use crate::learning::{LearningUpdate, PairBonus};

/// Shares one `DictionaryStore` between sessions.
///
/// Every method takes the lock, runs one store operation and releases it, so
/// individual operations are linearizable but sequences of them are not
/// atomic. The connectivity tables never change after load and are read
/// without the lock.
pub struct ConcurrentStoreHandle {
    store: Mutex<DictionaryStore>,
    connectivity: Arc<Connectivity>,
}

impl ConcurrentStoreHandle {
    pub fn new(store: DictionaryStore) -> Self {
        let connectivity = store.connectivity();
        Self {
            store: Mutex::new(store),
            connectivity,
        }
    }

    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut DictionaryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut store = match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("store lock poisoned");
                poisoned
                    .into_inner()
                    .mark_unavailable("a previous operation panicked");
                return Err(StoreError::Unavailable(
                    "a previous operation panicked".to_string(),
                ));
            }
        };
        store.check_available()?;
        op(&mut store)
    }

    pub fn lookup_range(
        &self,
        input: &[char],
        from: usize,
        ends: RangeInclusive<usize>,
        opts: LookupOptions,
    ) -> Result<Vec<RangeMatch>, StoreError> {
        self.with_store(|s| s.lookup_range(input, from, ends, opts))
    }

    pub fn predict(
        &self,
        prefix: &str,
        limit: usize,
        opts: LookupOptions,
    ) -> Result<Vec<DicdataElement>, StoreError> {
        self.with_store(|s| s.predict(prefix, limit, opts))
    }

    pub fn user_dictionary_prefix(&self, prefix: &str) -> Result<Vec<DicdataElement>, StoreError> {
        self.with_store(|s| Ok(s.user_dictionary_prefix(prefix)))
    }

    pub fn zero_hint_predictions(
        &self,
        rcid: u16,
        limit: usize,
    ) -> Result<Vec<DicdataElement>, StoreError> {
        self.with_store(|s| Ok(s.zero_hint_predictions(rcid, limit)))
    }

    /// Class-pair value. Lock-free.
    pub fn cc_value(&self, rcid: u16, lcid: u16) -> f32 {
        self.connectivity.cc.value(rcid, lcid)
    }

    /// Morpheme-pair value. Lock-free.
    pub fn mm_value(&self, prev_mid: u16, next_mid: u16) -> f32 {
        self.connectivity.mm.value(prev_mid, next_mid)
    }

    pub fn learned_pairs(
        &self,
        input: &str,
        context: Option<&DicdataElement>,
    ) -> Result<Vec<PairBonus>, StoreError> {
        self.with_store(|s| Ok(s.learned_pairs(input, context)))
    }

    pub fn learned_successors(
        &self,
        previous: &DicdataElement,
    ) -> Result<Vec<(DicdataElement, f32)>, StoreError> {
        self.with_store(|s| Ok(s.learned_successors(previous)))
    }

    pub fn should_be_removed(&self, element: &DicdataElement) -> Result<bool, StoreError> {
        self.with_store(|s| Ok(s.should_be_removed(element)))
    }

    /// Current learned value of `element`, if the memory knows it.
    pub fn retained_value(&self, element: &DicdataElement) -> Result<Option<f32>, StoreError> {
        self.with_store(|s| Ok(s.retained_value(element)))
    }

    pub fn update_learning(
        &self,
        update: LearningUpdate<'_>,
        memory_bound: Option<usize>,
    ) -> Result<(), StoreError> {
        self.with_store(|s| {
            s.update_learning(update, memory_bound);
            Ok(())
        })
    }

    pub fn notify(&self, notification: StoreNotification) -> Result<(), StoreError> {
        self.with_store(|s| s.apply(notification))
    }

    pub fn register_user_word(&self, reading: &str, entry: DictEntry) -> Result<bool, StoreError> {
        self.with_store(|s| Ok(s.register_user_word(reading, entry)))
    }

    pub fn unregister_user_word(&self, reading: &str, word: &str) -> Result<bool, StoreError> {
        self.with_store(|s| Ok(s.unregister_user_word(reading, word)))
    }

    pub fn list_user_words(&self) -> Result<Vec<(String, String)>, StoreError> {
        self.with_store(|s| Ok(s.list_user_words()))
    }

    #[cfg(test)]
    pub(crate) fn poison_for_test(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.store.lock();
            panic!("poisoning the store lock");
        }));
    }
}
