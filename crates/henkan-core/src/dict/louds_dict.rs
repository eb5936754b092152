use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use memmap2::Mmap;

use super::louds::{FuzzyMatch, Louds};
use super::{DictEntry, DictError};
use crate::top_k::{Scored, TopKHeap};

const MAGIC: &[u8; 4] = b"HKDX";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 4 + 1 + 4 + 4; // magic + version + trie_len + values_len = 13

/// Read-only system dictionary: a LOUDS trie over readings plus the entries
/// stored under each reading.
pub struct LoudsDictionary {
    trie: Louds,
    values: Vec<Vec<DictEntry>>,
}

/// A prefix match that may have needed substituted characters.
pub struct TypoMatch<'a> {
    pub reading: String,
    pub len: usize,
    pub typos: u8,
    pub entries: &'a [DictEntry],
}

impl LoudsDictionary {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<DictEntry>)>) -> Self {
        let mut merged: BTreeMap<Vec<char>, Vec<DictEntry>> = BTreeMap::new();
        for (reading, candidates) in entries {
            if reading.is_empty() {
                continue;
            }
            merged
                .entry(reading.chars().collect())
                .or_default()
                .extend(candidates);
        }
        for candidates in merged.values_mut() {
            candidates.sort_by(|a, b| b.value.total_cmp(&a.value));
        }

        let (keys, mut values): (Vec<Vec<char>>, Vec<Vec<DictEntry>>) = merged.into_iter().unzip();
        let (trie, order) = Louds::build(&keys);
        let values = order
            .into_iter()
            .map(|key_idx| std::mem::take(&mut values[key_idx]))
            .collect();

        Self { trie, values }
    }

    /// Entries stored under exactly `reading`.
    pub fn lookup(&self, reading: &str) -> &[DictEntry] {
        let key: Vec<char> = reading.chars().collect();
        self.trie
            .exact_match(&key)
            .map(|idx| self.values[idx].as_slice())
            .unwrap_or(&[])
    }

    /// Readings that are prefixes of `query`, as (char length, entries).
    pub fn common_prefix_search(&self, query: &[char]) -> Vec<(usize, &[DictEntry])> {
        self.trie
            .common_prefix_search(query)
            .into_iter()
            .map(|(len, idx)| (len, self.values[idx].as_slice()))
            .collect()
    }

    /// Like `common_prefix_search`, but also matching readings that differ
    /// from `query` by up to `max_typos` confusable kana.
    pub fn typo_prefix_search(&self, query: &[char], max_typos: u8) -> Vec<TypoMatch<'_>> {
        self.trie
            .fuzzy_prefix_search(query, max_typos, crate::unicode::confusable_kana)
            .into_iter()
            .map(
                |FuzzyMatch {
                     reading,
                     len,
                     typos,
                     value_index,
                 }| TypoMatch {
                    reading,
                    len,
                    typos,
                    entries: self.values[value_index].as_slice(),
                },
            )
            .collect()
    }

    /// Readings starting with `prefix`, lexicographically, up to `limit`.
    pub fn predict(&self, prefix: &str, limit: usize) -> Vec<(String, &[DictEntry])> {
        let key: Vec<char> = prefix.chars().collect();
        self.trie
            .predictive_search(&key, limit)
            .into_iter()
            .map(|(reading, idx)| (reading, self.values[idx].as_slice()))
            .collect()
    }

    /// The `limit` best-valued entries under readings that strictly extend
    /// `prefix`, best first. Every reading under the prefix is considered.
    pub fn predict_best(&self, prefix: &str, limit: usize) -> Vec<(String, DictEntry)> {
        let key: Vec<char> = prefix.chars().collect();
        let mut heap: TopKHeap<Scored<(String, DictEntry)>> = TopKHeap::new(limit);
        self.trie.predictive_walk(&key, |reading, idx| {
            if reading.len() > prefix.len() {
                for entry in &self.values[idx] {
                    let beats_worst = heap.min().map_or(true, |worst| entry.value > worst.score);
                    if !heap.is_full() || beats_worst {
                        heap.insert_if_possible(Scored::new(
                            entry.value,
                            (reading.to_string(), entry.clone()),
                        ));
                    }
                }
            }
            true
        });
        heap.drain_sorted_desc()
            .into_iter()
            .map(|scored| scored.item)
            .collect()
    }

    /// Returns (reading_count, entry_count).
    pub fn stats(&self) -> (usize, usize) {
        let readings = self.values.len();
        let entries: usize = self.values.iter().map(|v| v.len()).sum();
        (readings, entries)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DictError> {
        let trie_data = bincode::serialize(&self.trie).map_err(DictError::Serialize)?;
        let values_data = bincode::serialize(&self.values).map_err(DictError::Serialize)?;

        let trie_len: u32 = trie_data
            .len()
            .try_into()
            .map_err(|_| DictError::Parse("trie data exceeds u32::MAX".to_string()))?;
        let values_len: u32 = values_data
            .len()
            .try_into()
            .map_err(|_| DictError::Parse("values data exceeds u32::MAX".to_string()))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + trie_data.len() + values_data.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&trie_len.to_le_bytes());
        buf.extend_from_slice(&values_len.to_le_bytes());
        buf.extend_from_slice(&trie_data);
        buf.extend_from_slice(&values_data);
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DictError> {
        if data.len() < 5 {
            return Err(DictError::InvalidHeader);
        }
        if &data[..4] != MAGIC {
            return Err(DictError::InvalidMagic);
        }
        if data[4] != VERSION {
            return Err(DictError::UnsupportedVersion(data[4]));
        }
        if data.len() < HEADER_SIZE {
            return Err(DictError::InvalidHeader);
        }

        let trie_len = read_u32(&data[5..9]) as usize;
        let values_len = read_u32(&data[9..13]) as usize;
        if data.len() < HEADER_SIZE + trie_len + values_len {
            return Err(DictError::InvalidHeader);
        }

        let trie_start = HEADER_SIZE;
        let values_start = trie_start + trie_len;
        let trie: Louds = bincode::deserialize(&data[trie_start..values_start])
            .map_err(DictError::Deserialize)?;
        let values: Vec<Vec<DictEntry>> =
            bincode::deserialize(&data[values_start..values_start + values_len])
                .map_err(DictError::Deserialize)?;
        if values.len() != trie.terminal_count() {
            return Err(DictError::Parse(format!(
                "trie has {} readings but {} value lists",
                trie.terminal_count(),
                values.len()
            )));
        }

        Ok(Self { trie, values })
    }

    /// Open a dictionary image, using mmap to avoid doubling peak memory.
    pub fn open(path: &Path) -> Result<Self, DictError> {
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and the mapping is dropped
        // once deserialization completes.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    pub fn save(&self, path: &Path) -> Result<(), DictError> {
        Ok(fs::write(path, self.to_bytes()?)?)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}
