//! Prefix constraint on the converted text, and its snapshot form.
//!
//! The prefix is raw UTF-8 bytes: a scorer may commit to part of a
//! multi-byte character, and the constraint must carry that through.

const FLAG_EOS: u8 = 1 << 0;
const FLAG_IGNORE_MEMORY: u8 = 1 << 1;
/// flags(1) + prefix length(4)
const SNAPSHOT_HEADER_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    #[error("malformed constraint snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("constraint can only narrow: {0}")]
    Widening(String),
}

/// Restricts lattice paths to those whose text starts with `prefix`.
///
/// With `has_eos`, the text must be exactly `prefix`. Once set, a constraint
/// only narrows for the rest of a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefixConstraint {
    prefix: Vec<u8>,
    has_eos: bool,
    ignore_memory_and_user_dict: bool,
}

impl PrefixConstraint {
    /// Matches anything.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn new(prefix: impl Into<Vec<u8>>, has_eos: bool, ignore_memory_and_user_dict: bool) -> Self {
        Self {
            prefix: prefix.into(),
            has_eos,
            ignore_memory_and_user_dict,
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn has_eos(&self) -> bool {
        self.has_eos
    }

    pub fn ignore_memory_and_user_dict(&self) -> bool {
        self.ignore_memory_and_user_dict
    }

    /// Whether this constraint admits every path.
    pub fn is_open(&self) -> bool {
        self.prefix.is_empty() && !self.has_eos
    }

    /// Whether a (possibly partial) path text can still satisfy the
    /// constraint.
    pub fn has_prefix(&self, text: &str) -> bool {
        self.admits(0, text)
    }

    /// Whether `word`, appended to a path text of `offset` bytes that is
    /// itself admitted, keeps the path admissible.
    pub fn admits(&self, offset: usize, word: &str) -> bool {
        let word = word.as_bytes();
        let end = offset + word.len();
        if self.has_eos && end > self.prefix.len() {
            return false;
        }
        match self.prefix.get(offset..) {
            Some(rest) => {
                let overlap = rest.len().min(word.len());
                rest[..overlap] == word[..overlap]
            }
            None => true,
        }
    }

    /// Whether a complete path text of `len` bytes satisfies the constraint,
    /// given that every piece of it was admitted.
    pub fn is_satisfied_by(&self, len: usize) -> bool {
        if self.has_eos {
            len == self.prefix.len()
        } else {
            len >= self.prefix.len()
        }
    }

    /// Replace the prefix with a longer one.
    ///
    /// The new prefix must extend the current one; an end-of-sequence
    /// constraint cannot be extended or lifted.
    pub fn narrow(&mut self, prefix: impl Into<Vec<u8>>, has_eos: bool) -> Result<(), ConstraintError> {
        let prefix = prefix.into();
        if !prefix.starts_with(&self.prefix) {
            return Err(ConstraintError::Widening(
                "new prefix does not extend the current prefix".to_string(),
            ));
        }
        if self.has_eos && (!has_eos || prefix.len() != self.prefix.len()) {
            return Err(ConstraintError::Widening(
                "constraint already ends the sequence".to_string(),
            ));
        }
        self.prefix = prefix;
        self.has_eos = has_eos;
        Ok(())
    }

    /// Stop matching memory and user dictionary entries. Never lifted.
    pub fn ignore_memory(&mut self) {
        self.ignore_memory_and_user_dict = true;
    }

    pub fn snapshot(&self) -> ConstraintSnapshot {
        ConstraintSnapshot {
            prefix_len: self.prefix.len() as i64,
            prefix: self.prefix.clone(),
            has_eos: self.has_eos,
            ignore_memory_and_user_dict: self.ignore_memory_and_user_dict,
        }
    }

    pub fn from_snapshot(snapshot: &ConstraintSnapshot) -> Result<Self, ConstraintError> {
        if snapshot.prefix_len < 0 {
            return Err(ConstraintError::MalformedSnapshot(format!(
                "negative prefix length {}",
                snapshot.prefix_len
            )));
        }
        if snapshot.prefix_len as u64 != snapshot.prefix.len() as u64 {
            return Err(ConstraintError::MalformedSnapshot(format!(
                "prefix length {} does not match {} prefix bytes",
                snapshot.prefix_len,
                snapshot.prefix.len()
            )));
        }
        Ok(Self {
            prefix: snapshot.prefix.clone(),
            has_eos: snapshot.has_eos,
            ignore_memory_and_user_dict: snapshot.ignore_memory_and_user_dict,
        })
    }
}

/// Value-type copy of a `PrefixConstraint`, for crossing a call boundary.
///
/// Fields are public so a snapshot can arrive from elsewhere; validation
/// happens in `PrefixConstraint::from_snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSnapshot {
    pub prefix_len: i64,
    pub prefix: Vec<u8>,
    pub has_eos: bool,
    pub ignore_memory_and_user_dict: bool,
}

impl ConstraintSnapshot {
    /// flags(1) + prefix length(4, LE) + prefix bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConstraintError> {
        let len = u32::try_from(self.prefix_len).map_err(|_| {
            ConstraintError::MalformedSnapshot(format!("prefix length {} out of range", self.prefix_len))
        })?;
        let mut flags = 0u8;
        if self.has_eos {
            flags |= FLAG_EOS;
        }
        if self.ignore_memory_and_user_dict {
            flags |= FLAG_IGNORE_MEMORY;
        }
        let mut buf = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + self.prefix.len());
        buf.push(flags);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&self.prefix);
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConstraintError> {
        if bytes.len() < SNAPSHOT_HEADER_SIZE {
            return Err(ConstraintError::MalformedSnapshot("truncated header".to_string()));
        }
        let flags = bytes[0];
        if flags & !(FLAG_EOS | FLAG_IGNORE_MEMORY) != 0 {
            return Err(ConstraintError::MalformedSnapshot(format!(
                "unknown flag bits {flags:#04x}"
            )));
        }
        let len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let prefix = &bytes[SNAPSHOT_HEADER_SIZE..];
        if prefix.len() as u64 != u64::from(len) {
            return Err(ConstraintError::MalformedSnapshot(format!(
                "declared {len} prefix bytes, found {}",
                prefix.len()
            )));
        }
        Ok(Self {
            prefix_len: i64::from(len),
            prefix: prefix.to_vec(),
            has_eos: flags & FLAG_EOS != 0,
            ignore_memory_and_user_dict: flags & FLAG_IGNORE_MEMORY != 0,
        })
    }
}
