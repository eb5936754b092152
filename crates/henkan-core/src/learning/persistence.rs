use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{HistoryEntry, LearningConfig, LearningMemory, MemoryEntry, MorphemeId};
use crate::dict::DicdataElement;

const MAGIC: &[u8; 4] = b"HKLM";
const VERSION: u8 = 1;
/// magic(4) + version(1) + crc32(4)
const HEADER_SIZE: usize = 9;

/// Flat serialization format for bincode.
#[derive(Serialize, Deserialize)]
struct MemoryData {
    entries: Vec<EntryRecord>,
    pairs: Vec<PairRecord>,
}

#[derive(Serialize, Deserialize)]
struct EntryRecord {
    element: DicdataElement,
    frequency: u32,
    last_used: u64,
}

#[derive(Serialize, Deserialize)]
struct PairRecord {
    prev_ruby: String,
    prev: MorphemeId,
    next_ruby: String,
    next: MorphemeId,
    frequency: u32,
    last_used: u64,
}

impl LearningMemory {
    /// Serialize to bytes (HKLM format).
    pub fn to_bytes(&self) -> Result<Vec<u8>, io::Error> {
        let body = bincode::serialize(&self.to_data()).map_err(io::Error::other)?;
        let crc = crc32fast::hash(&body);

        let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Deserialize from bytes (HKLM format), using `config` as the policy.
    pub fn from_bytes(bytes: &[u8], config: LearningConfig) -> Result<Self, io::Error> {
        if bytes.len() < HEADER_SIZE {
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
        let stored = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let body = &bytes[HEADER_SIZE..];
        if crc32fast::hash(body) != stored {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "checksum mismatch"));
        }
        let data: MemoryData = bincode::deserialize(body)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Self::from_data(data, config))
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

    /// Open from file, returning an empty memory if the file doesn't exist.
    pub fn open(path: &Path, config: LearningConfig) -> Result<Self, io::Error> {
        match fs::read(path) {
            Ok(bytes) => Self::from_bytes(&bytes, config),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new(config)),
            Err(e) => Err(e),
        }
    }

    fn to_data(&self) -> MemoryData {
        let entries = self
            .entries
            .values()
            .flat_map(HashMap::values)
            .map(|entry| EntryRecord {
                element: entry.element.clone(),
                frequency: entry.history.frequency,
                last_used: entry.history.last_used,
            })
            .collect();

        let mut pairs = Vec::new();
        for ((prev_ruby, prev), inner) in &self.pairs {
            for ((next_ruby, next), entry) in inner {
                pairs.push(PairRecord {
                    prev_ruby: prev_ruby.clone(),
                    prev: prev.clone(),
                    next_ruby: next_ruby.clone(),
                    next: next.clone(),
                    frequency: entry.frequency,
                    last_used: entry.last_used,
                });
            }
        }

        MemoryData { entries, pairs }
    }

    fn from_data(data: MemoryData, config: LearningConfig) -> Self {
        let mut memory = Self::new(config);
        for rec in data.entries {
            memory
                .entries
                .entry(rec.element.ruby.clone())
                .or_default()
                .insert(
                    MorphemeId::of(&rec.element),
                    MemoryEntry {
                        element: rec.element,
                        history: HistoryEntry {
                            frequency: rec.frequency,
                            last_used: rec.last_used,
                        },
                    },
                );
        }
        for rec in data.pairs {
            memory.pairs.entry((rec.prev_ruby, rec.prev)).or_default().insert(
                (rec.next_ruby, rec.next),
                HistoryEntry {
                    frequency: rec.frequency,
                    last_used: rec.last_used,
                },
            );
        }
        memory
    }
}
