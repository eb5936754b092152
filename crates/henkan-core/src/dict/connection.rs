use std::collections::HashMap;

use super::DictError;

/// Class-pair ("CC") transition values indexed by (rcid, lcid).
///
/// Values are log-probability-like: higher means the pair is more natural.
#[derive(Debug, Clone)]
pub struct ConnectionMatrix {
    num_ids: u16,
    values: Vec<f32>,
}

impl ConnectionMatrix {
    /// Build from a row-major `num_ids * num_ids` table. Rows are the
    /// preceding element's rcid.
    pub fn from_values(num_ids: u16, values: Vec<f32>) -> Result<Self, DictError> {
        let expected = num_ids as usize * num_ids as usize;
        if values.len() != expected {
            return Err(DictError::Parse(format!(
                "expected {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { num_ids, values })
    }

    /// A matrix where every transition is neutral.
    pub fn uniform(num_ids: u16) -> Self {
        Self {
            num_ids,
            values: vec![0.0; num_ids as usize * num_ids as usize],
        }
    }

    /// Parse `num_ids` on the first line, then `rcid lcid value` per line.
    /// Pairs not listed stay at 0.0.
    pub fn from_text(text: &str) -> Result<Self, DictError> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| DictError::Parse("empty file".to_string()))?;
        let num_ids: u16 = header
            .trim()
            .parse()
            .map_err(|e| DictError::Parse(format!("invalid num_ids: {e}")))?;

        let mut matrix = Self::uniform(num_ids);
        for line in lines {
            let (rcid, lcid, value) = parse_triplet(line)?;
            if rcid >= num_ids || lcid >= num_ids {
                return Err(DictError::Parse(format!(
                    "index out of bounds: ({rcid}, {lcid})"
                )));
            }
            let idx = rcid as usize * num_ids as usize + lcid as usize;
            matrix.values[idx] = value;
        }
        Ok(matrix)
    }

    /// Transition value from an element with `rcid` to one with `lcid`.
    /// Out-of-bounds returns 0.
    pub fn value(&self, rcid: u16, lcid: u16) -> f32 {
        if rcid >= self.num_ids || lcid >= self.num_ids {
            return 0.0;
        }
        self.values[rcid as usize * self.num_ids as usize + lcid as usize]
    }

    pub fn num_ids(&self) -> u16 {
        self.num_ids
    }
}

/// Morpheme-pair ("MM") values, sparse over (previous mid, next mid).
#[derive(Debug, Clone, Default)]
pub struct MorphemePairTable {
    values: HashMap<(u16, u16), f32>,
}

impl MorphemePairTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prev_mid: u16, next_mid: u16, value: f32) {
        self.values.insert((prev_mid, next_mid), value);
    }

    /// Parse `prev_mid next_mid value` per line.
    pub fn from_text(text: &str) -> Result<Self, DictError> {
        let mut table = Self::new();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let (prev, next, value) = parse_triplet(line)?;
            table.insert(prev, next, value);
        }
        Ok(table)
    }

    /// Missing pairs are neutral (0.0).
    pub fn value(&self, prev_mid: u16, next_mid: u16) -> f32 {
        self.values
            .get(&(prev_mid, next_mid))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The read-only scoring tables, shared between the store and its readers.
#[derive(Debug, Clone)]
pub struct Connectivity {
    pub cc: ConnectionMatrix,
    pub mm: MorphemePairTable,
}

impl Connectivity {
    pub fn new(cc: ConnectionMatrix, mm: MorphemePairTable) -> Self {
        Self { cc, mm }
    }
}

fn parse_triplet(line: &str) -> Result<(u16, u16, f32), DictError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(DictError::Parse(format!(
            "expected 3 fields, got {}",
            fields.len()
        )));
    }
    let a: u16 = fields[0]
        .parse()
        .map_err(|e| DictError::Parse(format!("id '{}': {e}", fields[0])))?;
    let b: u16 = fields[1]
        .parse()
        .map_err(|e| DictError::Parse(format!("id '{}': {e}", fields[1])))?;
    let value: f32 = fields[2]
        .parse()
        .map_err(|e| DictError::Parse(format!("value '{}': {e}", fields[2])))?;
    Ok((a, b, value))
}
