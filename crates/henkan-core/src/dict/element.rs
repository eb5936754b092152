use serde::{Deserialize, Serialize};

/// Metadata bits carried by a `DicdataElement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ElementFlags(u8);

impl ElementFlags {
    pub const NONE: Self = Self(0);
    /// Value was adjusted by (or the element originates from) the learning memory.
    pub const IS_LEARNED: Self = Self(1 << 0);
    /// Element comes from the user dictionary.
    pub const IS_FROM_USER_DICTIONARY: Self = Self(1 << 1);
    /// Element matched a phonetically adjacent key, not the exact input.
    pub const IS_TYPO_CORRECTED: Self = Self(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for ElementFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A dictionary entry as stored in the trie: everything but the reading,
/// which is the trie key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictEntry {
    pub word: String,
    pub lcid: u16,
    pub rcid: u16,
    pub mid: u16,
    pub value: f32,
}

/// One dictionary entry occurrence handed out by lookups.
///
/// Callers receive copies; learning updates change the store, never an
/// element already returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DicdataElement {
    pub word: String,
    pub ruby: String,
    pub lcid: u16,
    pub rcid: u16,
    pub mid: u16,
    pub value: f32,
    pub flags: ElementFlags,
}

impl DicdataElement {
    pub fn new(word: &str, ruby: &str, lcid: u16, rcid: u16, mid: u16, value: f32) -> Self {
        Self {
            word: word.to_string(),
            ruby: ruby.to_string(),
            lcid,
            rcid,
            mid,
            value,
            flags: ElementFlags::NONE,
        }
    }

    pub(crate) fn from_entry(ruby: &str, entry: &DictEntry) -> Self {
        Self::new(
            &entry.word,
            ruby,
            entry.lcid,
            entry.rcid,
            entry.mid,
            entry.value,
        )
    }

    pub fn with_flags(mut self, flags: ElementFlags) -> Self {
        self.flags.insert(flags);
        self
    }

    /// Reading length in characters.
    pub fn ruby_count(&self) -> usize {
        self.ruby.chars().count()
    }

    /// Identity of the morpheme, ignoring value and flags.
    pub fn same_morpheme(&self, other: &Self) -> bool {
        self.word == other.word
            && self.ruby == other.ruby
            && self.lcid == other.lcid
            && self.rcid == other.rcid
            && self.mid == other.mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_set_operations() {
        let mut flags = ElementFlags::NONE;
        assert!(!flags.intersects(ElementFlags::IS_LEARNED));
        flags.insert(ElementFlags::IS_LEARNED);
        assert!(flags.contains(ElementFlags::IS_LEARNED));
        assert!(!flags.contains(ElementFlags::IS_LEARNED | ElementFlags::IS_FROM_USER_DICTIONARY));
        flags.insert(ElementFlags::IS_FROM_USER_DICTIONARY);
        assert_eq!(flags.bits(), 0b11);
        flags.remove(ElementFlags::IS_LEARNED);
        assert_eq!(flags, ElementFlags::IS_FROM_USER_DICTIONARY);
    }

    #[test]
    fn test_same_morpheme_ignores_value() {
        let a = DicdataElement::new("今日", "きょう", 100, 100, 5, -5.0);
        let mut b = a.clone().with_flags(ElementFlags::IS_LEARNED);
        b.value = -1.0;
        assert!(a.same_morpheme(&b));
        let c = DicdataElement::new("京", "きょう", 100, 100, 5, -5.0);
        assert!(!a.same_morpheme(&c));
    }
}
