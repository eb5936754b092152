//! Runtime-registered words.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dict::DictEntry;

const MAGIC: &[u8; 4] = b"HKUW";
const VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct UserWordRecord {
    reading: String,
    entry: DictEntry,
}

/// reading → entries, ordered by reading so prefix scans are range queries.
#[derive(Debug, Clone, Default)]
pub struct UserDictionary {
    entries: BTreeMap<String, Vec<DictEntry>>,
}

impl UserDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a word. Returns `true` if newly added, `false` if the same
    /// word and classes already exist under `reading` (its value is updated).
    pub fn register(&mut self, reading: &str, entry: DictEntry) -> bool {
        let entries = self.entries.entry(reading.to_string()).or_default();
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.word == entry.word && e.lcid == entry.lcid && e.rcid == entry.rcid)
        {
            existing.value = entry.value;
            existing.mid = entry.mid;
            return false;
        }
        entries.push(entry);
        true
    }

    /// Unregister every entry for `word` under `reading`. Returns `true` if
    /// anything was removed.
    pub fn unregister(&mut self, reading: &str, word: &str) -> bool {
        let Some(entries) = self.entries.get_mut(reading) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.word != word);
        let removed = entries.len() < before;
        if entries.is_empty() {
            self.entries.remove(reading);
        }
        removed
    }

    /// All entries as (reading, word) pairs, sorted.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut result: Vec<(String, String)> = self
            .entries
            .iter()
            .flat_map(|(reading, entries)| {
                entries.iter().map(move |e| (reading.clone(), e.word.clone()))
            })
            .collect();
        result.sort();
        result
    }

    pub fn lookup(&self, reading: &str) -> &[DictEntry] {
        self.entries.get(reading).map_or(&[], Vec::as_slice)
    }

    /// Entries whose reading starts with `prefix`, in reading order.
    pub fn prefix(&self, prefix: &str) -> impl Iterator<Item = (&str, &DictEntry)> + '_ {
        let prefix = prefix.to_string();
        self.entries
            .range(prefix.clone()..)
            .take_while(move |(reading, _)| reading.starts_with(prefix.as_str()))
            .flat_map(|(reading, entries)| entries.iter().map(move |e| (reading.as_str(), e)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to bytes (HKUW format).
    pub fn to_bytes(&self) -> Result<Vec<u8>, io::Error> {
        let records: Vec<UserWordRecord> = self
            .entries
            .iter()
            .flat_map(|(reading, entries)| {
                entries.iter().map(move |e| UserWordRecord {
                    reading: reading.clone(),
                    entry: e.clone(),
                })
            })
            .collect();

        let body = bincode::serialize(&records).map_err(io::Error::other)?;
        let mut buf = Vec::with_capacity(5 + body.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Deserialize from bytes (HKUW format).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, io::Error> {
        if bytes.len() < 5 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "too short"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
        }
        if bytes[4] != VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported version",
            ));
        }
        let records: Vec<UserWordRecord> = bincode::deserialize(&bytes[5..])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut dict = Self::new();
        for rec in records {
            dict.register(&rec.reading, rec.entry);
        }
        Ok(dict)
    }

    /// Atomic write: write to .tmp then rename.
    pub fn save(&self, path: &Path) -> Result<(), io::Error> {
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("tmp");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Open from file, returning an empty dictionary if the file doesn't exist.
    pub fn open(path: &Path) -> Result<Self, io::Error> {
        match fs::read(path) {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e),
        }
    }
}
