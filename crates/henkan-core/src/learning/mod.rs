//! Learning memory: time-decayed reinforcement of accepted elements and of
//! (previous, next) element pairs.
//!
//! The memory keeps each learned element's base value and adds a boost of
//! `min(frequency * reinforcement, max_boost) * decay` on lookup, so an
//! accepted element never loses value by being accepted again.

mod persistence;

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::converter::{Candidate, PostCompositionPrediction};
use crate::dict::{DicdataElement, ElementFlags};
use crate::settings::settings;

/// Identity of a morpheme within one reading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MorphemeId {
    pub word: String,
    pub lcid: u16,
    pub rcid: u16,
    pub mid: u16,
}

impl MorphemeId {
    pub fn of(element: &DicdataElement) -> Self {
        Self {
            word: element.word.clone(),
            lcid: element.lcid,
            rcid: element.rcid,
            mid: element.mid,
        }
    }
}

/// A learned element's address: its ruby and its identity under that ruby.
pub(crate) type ElementKey = (String, MorphemeId);

pub(crate) fn element_key(element: &DicdataElement) -> ElementKey {
    (element.ruby.clone(), MorphemeId::of(element))
}

/// Reinforcement and eviction policy.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningConfig {
    pub reinforcement: f32,
    pub max_boost: f32,
    pub pair_reinforcement: f32,
    pub max_pair_boost: f32,
    pub half_life_hours: f64,
    pub eviction_threshold: f64,
    pub max_entries: usize,
    pub max_pairs: usize,
}

impl LearningConfig {
    pub fn from_settings() -> Self {
        let s = &settings().learning;
        Self {
            reinforcement: s.reinforcement,
            max_boost: s.max_boost,
            pair_reinforcement: s.pair_reinforcement,
            max_pair_boost: s.max_pair_boost,
            half_life_hours: s.half_life_hours,
            eviction_threshold: s.eviction_threshold,
            max_entries: s.max_entries,
            max_pairs: s.max_pairs,
        }
    }

    fn decay(&self, last_used: u64, now: u64) -> f64 {
        let hours = now.saturating_sub(last_used) as f64 / 3600.0;
        1.0 / (1.0 + hours / self.half_life_hours)
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self::from_settings()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub frequency: u32,
    pub last_used: u64,
}

impl HistoryEntry {
    fn new(now: u64) -> Self {
        Self {
            frequency: 0,
            last_used: now,
        }
    }

    fn touch(&mut self, now: u64) {
        self.frequency = self.frequency.saturating_add(1);
        self.last_used = self.last_used.max(now);
    }

    /// Decayed frequency, the relevance used for eviction.
    fn relevance(&self, config: &LearningConfig, now: u64) -> f64 {
        self.frequency as f64 * config.decay(self.last_used, now)
    }

    fn boost(&self, per_use: f32, cap: f32, config: &LearningConfig, now: u64) -> f32 {
        let raw = (self.frequency as f32 * per_use).min(cap);
        (raw as f64 * config.decay(self.last_used, now)) as f32
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MemoryEntry {
    /// The element as first learned, with its unboosted value.
    pub element: DicdataElement,
    pub history: HistoryEntry,
}

/// A learned (previous → next) pair that applies somewhere in an input.
#[derive(Debug, Clone, PartialEq)]
pub struct PairBonus {
    pub prev: MorphemeId,
    pub next_ruby: String,
    pub next: MorphemeId,
    pub bonus: f32,
}

/// The two kinds of accepted result that feed the learning memory.
#[derive(Debug, Clone, Copy)]
pub enum LearningUpdate<'a> {
    /// A converted candidate, with the element committed just before it.
    Accepted {
        candidate: &'a Candidate,
        previous: Option<&'a DicdataElement>,
    },
    /// A candidate predicted after a commit; it carries its own context.
    PostCompositionPrediction {
        prediction: &'a PostCompositionPrediction,
    },
}

pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone)]
pub struct LearningMemory {
    config: LearningConfig,
    /// ruby → (morpheme → entry)
    entries: HashMap<String, HashMap<MorphemeId, MemoryEntry>>,
    /// prev element → (next element → entry)
    pairs: HashMap<ElementKey, HashMap<ElementKey, HistoryEntry>>,
}

impl Default for LearningMemory {
    fn default() -> Self {
        Self::new(LearningConfig::from_settings())
    }
}

impl LearningMemory {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            pairs: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: LearningConfig) {
        self.config = config;
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pairs.clear();
    }

    /// Apply an accepted result. `bound` overrides `max_entries` for this
    /// update; entries touched by the update are never evicted by it.
    pub fn update(&mut self, update: LearningUpdate<'_>, bound: Option<usize>) {
        self.update_at(update, bound, now_epoch());
    }

    pub(crate) fn update_at(&mut self, update: LearningUpdate<'_>, bound: Option<usize>, now: u64) {
        let (previous, data) = match update {
            LearningUpdate::Accepted {
                candidate,
                previous,
            } => (previous, candidate.data.as_slice()),
            LearningUpdate::PostCompositionPrediction { prediction } => {
                (Some(&prediction.previous), prediction.data.as_slice())
            }
        };

        let mut touched = HashSet::new();
        for element in data {
            touched.insert(element_key(element));
            self.reinforce(element, now);
        }

        let mut touched_pairs = HashSet::new();
        let chain = previous.into_iter().chain(data.iter());
        for (prev, next) in chain.clone().zip(chain.skip(1)) {
            let key = (element_key(prev), element_key(next));
            self.pairs
                .entry(key.0.clone())
                .or_default()
                .entry(key.1.clone())
                .or_insert_with(|| HistoryEntry::new(now))
                .touch(now);
            touched_pairs.insert(key);
        }

        self.evict(bound.unwrap_or(self.config.max_entries), &touched, &touched_pairs, now);
        debug!(
            elements = data.len(),
            entries = self.len(),
            pairs = self.pair_count(),
            "learning update"
        );
    }

    fn reinforce(&mut self, element: &DicdataElement, now: u64) {
        let entry = self
            .entries
            .entry(element.ruby.clone())
            .or_default()
            .entry(MorphemeId::of(element))
            .or_insert_with(|| MemoryEntry {
                element: base_element(element),
                history: HistoryEntry::new(now),
            });
        entry.history.touch(now);
    }

    /// Boost for `element`, or 0.0 when it was never learned.
    pub fn boost(&self, element: &DicdataElement, now: u64) -> f32 {
        self.entry(element).map_or(0.0, |entry| {
            entry.history.boost(
                self.config.reinforcement,
                self.config.max_boost,
                &self.config,
                now,
            )
        })
    }

    /// Learned value of `element`: its base value plus the current boost.
    pub fn retained_value(&self, element: &DicdataElement, now: u64) -> Option<f32> {
        self.entry(element)
            .map(|entry| entry.element.value + self.boost(element, now))
    }

    /// Boost for `next` following `prev`, or 0.0.
    pub fn pair_boost(&self, prev: &DicdataElement, next: &DicdataElement, now: u64) -> f32 {
        self.pairs
            .get(&element_key(prev))
            .and_then(|inner| inner.get(&element_key(next)))
            .map_or(0.0, |entry| {
                entry.boost(
                    self.config.pair_reinforcement,
                    self.config.max_pair_boost,
                    &self.config,
                    now,
                )
            })
    }

    /// Whether a learned element has decayed below the relevance threshold.
    /// Elements the memory does not know are never stale.
    pub fn should_be_removed(&self, element: &DicdataElement, now: u64) -> bool {
        self.entry(element).is_some_and(|entry| {
            entry.history.relevance(&self.config, now) < self.config.eviction_threshold
        })
    }

    /// Learned elements stored under exactly `ruby`, with boosted values.
    pub fn elements_for(&self, ruby: &str, now: u64) -> Vec<DicdataElement> {
        self.entries.get(ruby).map_or_else(Vec::new, |inner| {
            inner
                .values()
                .filter(|entry| {
                    entry.history.relevance(&self.config, now) >= self.config.eviction_threshold
                })
                .map(|entry| self.boosted(entry, now))
                .collect()
        })
    }

    /// Learned elements whose ruby starts with `prefix`.
    pub fn elements_with_prefix(&self, prefix: &str, now: u64) -> Vec<DicdataElement> {
        self.entries
            .iter()
            .filter(|(ruby, _)| ruby.starts_with(prefix))
            .flat_map(|(ruby, _)| self.elements_for(ruby, now))
            .collect()
    }

    /// Learned pairs whose next element's ruby occurs in `input`, and whose
    /// previous element either occurs in `input` or is `context`.
    ///
    /// Linear in the number of learned pairs; runs under the store lock on
    /// every search.
    pub fn pairs_within(
        &self,
        input: &str,
        context: Option<&DicdataElement>,
        now: u64,
    ) -> Vec<PairBonus> {
        let context_key = context.map(element_key);
        let mut out = Vec::new();
        for ((prev_ruby, prev), inner) in &self.pairs {
            let mut nexts = inner
                .iter()
                .filter(|((next_ruby, _), _)| input.contains(next_ruby.as_str()))
                .peekable();
            if nexts.peek().is_none() {
                continue;
            }
            let is_context = context_key
                .as_ref()
                .is_some_and(|(ruby, id)| ruby == prev_ruby && id == prev);
            if !is_context && !input.contains(prev_ruby.as_str()) {
                continue;
            }
            for ((next_ruby, next), entry) in nexts {
                let bonus = entry.boost(
                    self.config.pair_reinforcement,
                    self.config.max_pair_boost,
                    &self.config,
                    now,
                );
                if bonus > 0.0 {
                    out.push(PairBonus {
                        prev: prev.clone(),
                        next_ruby: next_ruby.clone(),
                        next: next.clone(),
                        bonus,
                    });
                }
            }
        }
        out
    }

    /// Learned successors of `prev`, best first.
    pub fn successors(&self, prev: &DicdataElement, now: u64) -> Vec<(DicdataElement, f32)> {
        let Some(inner) = self.pairs.get(&element_key(prev)) else {
            return Vec::new();
        };
        let mut out: Vec<(DicdataElement, f32)> = inner
            .iter()
            .filter_map(|((ruby, next), entry)| {
                let memory = self.entries.get(ruby)?.get(next)?;
                let bonus = entry.boost(
                    self.config.pair_reinforcement,
                    self.config.max_pair_boost,
                    &self.config,
                    now,
                );
                (bonus > 0.0).then(|| (self.boosted(memory, now), bonus))
            })
            .collect();
        out.sort_by(|a, b| {
            (b.0.value + b.1)
                .total_cmp(&(a.0.value + a.1))
                .then_with(|| a.0.word.cmp(&b.0.word))
        });
        out
    }

    fn entry(&self, element: &DicdataElement) -> Option<&MemoryEntry> {
        self.entries
            .get(&element.ruby)
            .and_then(|inner| inner.get(&MorphemeId::of(element)))
    }

    fn boosted(&self, entry: &MemoryEntry, now: u64) -> DicdataElement {
        let mut element = entry.element.clone();
        element.value += entry.history.boost(
            self.config.reinforcement,
            self.config.max_boost,
            &self.config,
            now,
        );
        element
    }

    /// Drop stale entries, then the least relevant ones, until within bounds.
    fn evict(
        &mut self,
        max_entries: usize,
        touched: &HashSet<ElementKey>,
        touched_pairs: &HashSet<(ElementKey, ElementKey)>,
        now: u64,
    ) {
        let config = self.config.clone();

        if self.len() > max_entries {
            let mut victims: Vec<(ElementKey, f64)> = Vec::new();
            for (ruby, inner) in &self.entries {
                for (id, entry) in inner {
                    let key = (ruby.clone(), id.clone());
                    if !touched.contains(&key) {
                        victims.push((key, entry.history.relevance(&config, now)));
                    }
                }
            }
            let removed = select_victims(victims, self.len() - max_entries, config.eviction_threshold);
            for (ruby, id) in &removed {
                if let Some(inner) = self.entries.get_mut(ruby) {
                    inner.remove(id);
                    if inner.is_empty() {
                        self.entries.remove(ruby);
                    }
                }
            }
            debug!(removed = removed.len(), "evicted learned elements");
        }

        if self.pair_count() > config.max_pairs {
            let mut victims = Vec::new();
            for (prev, inner) in &self.pairs {
                for (next, entry) in inner {
                    let key = (prev.clone(), next.clone());
                    if !touched_pairs.contains(&key) {
                        victims.push((key, entry.relevance(&config, now)));
                    }
                }
            }
            let removed = select_victims(
                victims,
                self.pair_count() - config.max_pairs,
                config.eviction_threshold,
            );
            for (prev, next) in removed {
                if let Some(inner) = self.pairs.get_mut(&prev) {
                    inner.remove(&next);
                    if inner.is_empty() {
                        self.pairs.remove(&prev);
                    }
                }
            }
        }
    }
}

/// Everything below `threshold`, plus the lowest-relevance keys needed to
/// remove at least `excess` in total.
fn select_victims<K>(mut candidates: Vec<(K, f64)>, excess: usize, threshold: f64) -> Vec<K> {
    let stale = candidates.iter().filter(|(_, r)| *r < threshold).count();
    let to_remove = excess.max(stale).min(candidates.len());
    if to_remove == 0 {
        return Vec::new();
    }
    // Partition so the `to_remove` least relevant entries come first.
    candidates.select_nth_unstable_by(to_remove - 1, |a, b| a.1.total_cmp(&b.1));
    candidates.truncate(to_remove);
    candidates.into_iter().map(|(key, _)| key).collect()
}

/// The unboosted form of an accepted element, flagged as learned.
fn base_element(element: &DicdataElement) -> DicdataElement {
    let mut base = element.clone();
    base.flags.remove(ElementFlags::IS_TYPO_CORRECTED);
    base.flags.insert(ElementFlags::IS_LEARNED);
    base
}
