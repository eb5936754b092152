//! The dictionary store: read-only trie and connectivity tables plus the
//! mutable user dictionary and learning memory.
//!
//! Query and mutation methods are crate-private; everything outside the
//! crate goes through `ConcurrentStoreHandle`.

mod handle;
mod user_dict;

pub use handle::ConcurrentStoreHandle;
pub use user_dict::UserDictionary;

use std::collections::HashMap;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dict::{
    Connectivity, DicdataElement, DictEntry, DictError, ElementFlags, LoudsDictionary,
};
use crate::learning::{
    now_epoch, LearningConfig, LearningMemory, LearningUpdate, MorphemeId, PairBonus,
};
use crate::settings::settings;
use crate::top_k::{Scored, TopKHeap};

const MEMORY_FILE: &str = "learning.hklm";
const USER_DICT_FILE: &str = "user_dict.hkuw";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid lookup range {from}..={to} for input of length {len}")]
    InvalidRange { from: usize, to: usize, len: usize },

    #[error("persistence error: {0}")]
    Persistence(#[from] io::Error),

    #[error(transparent)]
    Dict(#[from] DictError),
}

/// Maintenance signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreNotification {
    /// Re-read the learning memory and user dictionary from disk.
    Reload,
    /// Write the learning memory and user dictionary to disk.
    Flush,
    /// Drop everything learned so far.
    ForgetMemory,
}

/// Per-lookup switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookupOptions {
    /// Also match readings that differ by confusable kana.
    pub typo_correction: bool,
    /// Restrict to the system dictionary with unboosted values.
    pub ignore_memory_and_user_dict: bool,
    /// Apply learning boosts (ignored when the above is set).
    pub use_memory: bool,
}

/// An element starting at the queried index and ending (exclusive) at `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeMatch {
    pub to: usize,
    pub element: DicdataElement,
}

pub struct DictionaryStore {
    dictionary: Arc<LoudsDictionary>,
    connectivity: Arc<Connectivity>,
    /// Elements offered with no reading at all, ranked by how well they
    /// follow the previous element.
    zero_hint: Vec<DicdataElement>,
    user_dict: UserDictionary,
    memory: LearningMemory,
    persist_dir: Option<PathBuf>,
    unavailable: Option<String>,
    typo_penalty: f32,
    max_typos: u8,
}

impl DictionaryStore {
    pub fn new(dictionary: LoudsDictionary, connectivity: Connectivity) -> Self {
        let s = settings();
        Self {
            dictionary: Arc::new(dictionary),
            connectivity: Arc::new(connectivity),
            zero_hint: Vec::new(),
            user_dict: UserDictionary::new(),
            memory: LearningMemory::new(LearningConfig::from_settings()),
            persist_dir: None,
            unavailable: None,
            typo_penalty: s.typo.penalty,
            max_typos: s.typo.max_typos,
        }
    }

    /// Open a dictionary image, restoring learning state from `persist_dir`.
    pub fn open(
        dictionary_path: &Path,
        connectivity: Connectivity,
        persist_dir: Option<PathBuf>,
    ) -> Result<Self, StoreError> {
        let dictionary = LoudsDictionary::open(dictionary_path)?;
        let mut store = Self::new(dictionary, connectivity);
        if let Some(dir) = persist_dir {
            store = store.with_persist_dir(dir);
            store.reload()?;
        }
        Ok(store)
    }

    pub fn with_zero_hint(mut self, elements: Vec<DicdataElement>) -> Self {
        self.zero_hint = elements;
        self
    }

    pub fn with_persist_dir(mut self, dir: PathBuf) -> Self {
        self.persist_dir = Some(dir);
        self
    }

    pub fn with_learning_config(mut self, config: LearningConfig) -> Self {
        self.memory.set_config(config);
        self
    }

    pub fn with_user_dictionary(mut self, user_dict: UserDictionary) -> Self {
        self.user_dict = user_dict;
        self
    }

    pub(crate) fn connectivity(&self) -> Arc<Connectivity> {
        Arc::clone(&self.connectivity)
    }

    pub(crate) fn check_available(&self) -> Result<(), StoreError> {
        match &self.unavailable {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Elements for `input[from..to]` with `to` in `ends`.
    ///
    /// Results are ordered by `to`, then by value (best first). A morpheme
    /// reachable several ways (exact, typo, user dictionary, memory) appears
    /// once with its best value.
    pub(crate) fn lookup_range(
        &self,
        input: &[char],
        from: usize,
        ends: RangeInclusive<usize>,
        opts: LookupOptions,
    ) -> Result<Vec<RangeMatch>, StoreError> {
        let (min_end, max_end) = (*ends.start(), *ends.end());
        if from >= min_end || min_end > max_end || max_end > input.len() {
            return Err(StoreError::InvalidRange {
                from,
                to: max_end,
                len: input.len(),
            });
        }

        let query = &input[from..max_end];
        let in_range = |len: usize| from + len >= min_end;
        let mut found: Vec<RangeMatch> = Vec::new();

        if opts.typo_correction && self.max_typos > 0 {
            for hit in self.dictionary.typo_prefix_search(query, self.max_typos) {
                if !in_range(hit.len) {
                    continue;
                }
                for entry in hit.entries {
                    let mut element = DicdataElement::from_entry(&hit.reading, entry);
                    if hit.typos > 0 {
                        element.value += self.typo_penalty * f32::from(hit.typos);
                        element.flags.insert(ElementFlags::IS_TYPO_CORRECTED);
                    }
                    found.push(RangeMatch {
                        to: from + hit.len,
                        element,
                    });
                }
            }
        } else {
            for (len, entries) in self.dictionary.common_prefix_search(query) {
                if !in_range(len) {
                    continue;
                }
                let reading: String = query[..len].iter().collect();
                found.extend(entries.iter().map(|entry| RangeMatch {
                    to: from + len,
                    element: DicdataElement::from_entry(&reading, entry),
                }));
            }
        }

        let now = now_epoch();
        if !opts.ignore_memory_and_user_dict {
            for to in min_end..=max_end {
                let reading: String = input[from..to].iter().collect();
                for entry in self.user_dict.lookup(&reading) {
                    found.push(RangeMatch {
                        to,
                        element: DicdataElement::from_entry(&reading, entry)
                            .with_flags(ElementFlags::IS_FROM_USER_DICTIONARY),
                    });
                }
                if opts.use_memory {
                    found.extend(
                        self.memory
                            .elements_for(&reading, now)
                            .into_iter()
                            .map(|element| RangeMatch { to, element }),
                    );
                }
            }
            if opts.use_memory {
                for m in &mut found {
                    self.apply_boost(&mut m.element, now);
                }
            }
        }

        Ok(dedup_matches(found))
    }

    fn apply_boost(&self, element: &mut DicdataElement, now: u64) {
        if element.flags.contains(ElementFlags::IS_LEARNED) {
            // Memory elements come out already boosted.
            return;
        }
        let boost = self.memory.boost(element, now);
        if boost > 0.0 {
            element.value += boost;
            element.flags.insert(ElementFlags::IS_LEARNED);
        }
    }

    /// Elements whose reading strictly extends `prefix`, best first.
    pub(crate) fn predict(
        &self,
        prefix: &str,
        limit: usize,
        opts: LookupOptions,
    ) -> Result<Vec<DicdataElement>, StoreError> {
        let prefix_len = prefix.chars().count();
        let mut found: Vec<DicdataElement> = self
            .dictionary
            .predict_best(prefix, limit)
            .into_iter()
            .map(|(reading, entry)| DicdataElement::from_entry(&reading, &entry))
            .collect();

        let now = now_epoch();
        if !opts.ignore_memory_and_user_dict {
            found.extend(
                self.user_dictionary_prefix(prefix)
                    .into_iter()
                    .filter(|e| e.ruby_count() > prefix_len),
            );
            if opts.use_memory {
                found.extend(
                    self.memory
                        .elements_with_prefix(prefix, now)
                        .into_iter()
                        .filter(|e| e.ruby_count() > prefix_len),
                );
                for element in &mut found {
                    self.apply_boost(element, now);
                }
            }
        }

        let mut found: Vec<DicdataElement> = dedup_matches(
            found
                .into_iter()
                .map(|element| RangeMatch { to: 0, element })
                .collect(),
        )
        .into_iter()
        .map(|m| m.element)
        .collect();
        found.truncate(limit);
        Ok(found)
    }

    /// User dictionary entries whose reading starts with `prefix`.
    pub(crate) fn user_dictionary_prefix(&self, prefix: &str) -> Vec<DicdataElement> {
        self.user_dict
            .prefix(prefix)
            .map(|(reading, entry)| {
                DicdataElement::from_entry(reading, entry)
                    .with_flags(ElementFlags::IS_FROM_USER_DICTIONARY)
            })
            .collect()
    }

    /// Best zero-hint elements to follow an element with `rcid`.
    pub(crate) fn zero_hint_predictions(&self, rcid: u16, limit: usize) -> Vec<DicdataElement> {
        let mut heap = TopKHeap::new(limit);
        for (i, element) in self.zero_hint.iter().enumerate() {
            let score = self.connectivity.cc.value(rcid, element.lcid) + element.value;
            heap.insert_if_possible(Scored::new(score, i));
        }
        heap.drain_sorted_desc()
            .into_iter()
            .map(|scored| self.zero_hint[scored.item].clone())
            .collect()
    }

    pub(crate) fn learned_pairs(
        &self,
        input: &str,
        context: Option<&DicdataElement>,
    ) -> Vec<PairBonus> {
        self.memory.pairs_within(input, context, now_epoch())
    }

    /// Learned successors of `previous`, best first.
    pub(crate) fn learned_successors(&self, previous: &DicdataElement) -> Vec<(DicdataElement, f32)> {
        let now = now_epoch();
        self.memory
            .successors(previous, now)
            .into_iter()
            .filter(|(element, _)| !self.memory.should_be_removed(element, now))
            .collect()
    }

    pub(crate) fn should_be_removed(&self, element: &DicdataElement) -> bool {
        self.memory.should_be_removed(element, now_epoch())
    }

    pub(crate) fn retained_value(&self, element: &DicdataElement) -> Option<f32> {
        self.memory.retained_value(element, now_epoch())
    }

    pub(crate) fn update_learning(&mut self, update: LearningUpdate<'_>, bound: Option<usize>) {
        self.memory.update(update, bound);
    }

    pub(crate) fn apply(&mut self, notification: StoreNotification) -> Result<(), StoreError> {
        debug!(?notification, "store notification");
        match notification {
            StoreNotification::Reload => self.reload(),
            StoreNotification::Flush => self.flush(),
            StoreNotification::ForgetMemory => {
                self.memory.clear();
                Ok(())
            }
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        let Some(dir) = &self.persist_dir else {
            return Ok(());
        };
        self.memory.save(&dir.join(MEMORY_FILE))?;
        self.user_dict.save(&dir.join(USER_DICT_FILE))?;
        Ok(())
    }

    /// Re-read persisted state. A failure leaves the store unavailable.
    fn reload(&mut self) -> Result<(), StoreError> {
        let Some(dir) = self.persist_dir.clone() else {
            return Ok(());
        };
        let config = self.memory.config().clone();
        let loaded = LearningMemory::open(&dir.join(MEMORY_FILE), config).and_then(|memory| {
            UserDictionary::open(&dir.join(USER_DICT_FILE)).map(|user| (memory, user))
        });
        match loaded {
            Ok((memory, user_dict)) => {
                self.memory = memory;
                self.user_dict = user_dict;
                self.unavailable = None;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, dir = %dir.display(), "reload failed, store unavailable");
                self.unavailable = Some(format!("reload failed: {e}"));
                Err(StoreError::Persistence(e))
            }
        }
    }

    pub(crate) fn register_user_word(&mut self, reading: &str, entry: DictEntry) -> bool {
        self.user_dict.register(reading, entry)
    }

    pub(crate) fn unregister_user_word(&mut self, reading: &str, word: &str) -> bool {
        self.user_dict.unregister(reading, word)
    }

    pub(crate) fn list_user_words(&self) -> Vec<(String, String)> {
        self.user_dict.list()
    }

    pub(crate) fn mark_unavailable(&mut self, reason: &str) {
        self.unavailable = Some(reason.to_string());
    }
}

/// Keep the best value per (end, reading, morpheme), then order by end,
/// value (best first) and word.
fn dedup_matches(found: Vec<RangeMatch>) -> Vec<RangeMatch> {
    let mut best: HashMap<(usize, String, MorphemeId), RangeMatch> = HashMap::new();
    for m in found {
        let key = (m.to, m.element.ruby.clone(), MorphemeId::of(&m.element));
        match best.get_mut(&key) {
            Some(existing) if existing.element.value >= m.element.value => {
                existing.element.flags.insert(m.element.flags);
            }
            Some(existing) => {
                let flags = existing.element.flags;
                *existing = m;
                existing.element.flags.insert(flags);
            }
            None => {
                best.insert(key, m);
            }
        }
    }
    let mut out: Vec<RangeMatch> = best.into_values().collect();
    out.sort_by(|a, b| {
        a.to.cmp(&b.to)
            .then_with(|| b.element.value.total_cmp(&a.element.value))
            .then_with(|| a.element.word.cmp(&b.element.word))
            .then_with(|| a.element.ruby.cmp(&b.element.ruby))
            .then_with(|| a.element.lcid.cmp(&b.element.lcid))
            .then_with(|| a.element.mid.cmp(&b.element.mid))
    });
    out
}
