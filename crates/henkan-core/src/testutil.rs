//! Shared fixtures for unit tests.

use crate::dict::{
    ConnectionMatrix, Connectivity, DicdataElement, DictEntry, LoudsDictionary, MorphemePairTable,
};
use crate::learning::LearningConfig;
use crate::store::{ConcurrentStoreHandle, DictionaryStore};

pub const BOS_EOS: u16 = 0;
pub const NOUN: u16 = 1;
pub const PARTICLE: u16 = 2;
pub const ADJECTIVE: u16 = 3;
pub const AUXILIARY: u16 = 4;

fn e(word: &str, class: u16, mid: u16, value: f32) -> DictEntry {
    DictEntry {
        word: word.to_string(),
        lcid: class,
        rcid: class,
        mid,
        value,
    }
}

pub fn sample_dictionary() -> LoudsDictionary {
    let rows: Vec<(&str, Vec<DictEntry>)> = vec![
        (
            "きょう",
            vec![
                e("今日", NOUN, 10, -3.0),
                e("京", NOUN, 11, -6.0),
                e("強", NOUN, 12, -7.0),
            ],
        ),
        ("き", vec![e("木", NOUN, 13, -4.0), e("気", NOUN, 14, -3.5)]),
        ("きょうと", vec![e("京都", NOUN, 15, -4.5)]),
        (
            "は",
            vec![
                e("は", PARTICLE, 20, -1.0),
                e("葉", NOUN, 21, -6.0),
                e("歯", NOUN, 22, -6.5),
            ],
        ),
        (
            "いい",
            vec![e("いい", ADJECTIVE, 30, -3.5), e("良い", ADJECTIVE, 31, -4.0)],
        ),
        ("い", vec![e("胃", NOUN, 32, -7.0)]),
        (
            "てんき",
            vec![e("天気", NOUN, 40, -4.0), e("転機", NOUN, 41, -7.0)],
        ),
        ("です", vec![e("です", AUXILIARY, 50, -1.5)]),
        (
            "かんじ",
            vec![
                e("漢字", NOUN, 60, -4.0),
                e("感じ", NOUN, 61, -4.5),
                e("幹事", NOUN, 62, -6.0),
            ],
        ),
        ("かん", vec![e("缶", NOUN, 63, -6.0)]),
        ("じ", vec![e("字", NOUN, 64, -6.0), e("時", NOUN, 65, -5.5)]),
        ("がっこう", vec![e("学校", NOUN, 70, -4.0)]),
        ("わたし", vec![e("私", NOUN, 80, -3.0)]),
        ("の", vec![e("の", PARTICLE, 81, -1.0)]),
        ("なまえ", vec![e("名前", NOUN, 82, -4.0)]),
    ];
    LoudsDictionary::from_entries(
        rows.into_iter()
            .map(|(reading, entries)| (reading.to_string(), entries)),
    )
}

pub fn sample_connectivity() -> Connectivity {
    let cc = ConnectionMatrix::from_text(
        "6\n\
         1 2 1.0\n\
         2 1 0.5\n\
         2 3 0.5\n\
         3 1 0.5\n\
         1 4 1.0\n\
         1 1 -1.0\n\
         2 2 -2.0\n\
         4 0 0.5\n\
         2 0 -1.0\n",
    )
    .unwrap();
    let mut mm = MorphemePairTable::new();
    mm.insert(10, 20, 0.5);
    Connectivity::new(cc, mm)
}

pub fn zero_hint() -> Vec<DicdataElement> {
    vec![
        DicdataElement::new("は", "は", PARTICLE, PARTICLE, 20, -1.0),
        DicdataElement::new("の", "の", PARTICLE, PARTICLE, 81, -1.0),
        DicdataElement::new("です", "です", AUXILIARY, AUXILIARY, 50, -1.5),
    ]
}

pub fn learning_config() -> LearningConfig {
    LearningConfig {
        reinforcement: 1.5,
        max_boost: 12.0,
        pair_reinforcement: 1.0,
        max_pair_boost: 6.0,
        half_life_hours: 168.0,
        eviction_threshold: 0.05,
        max_entries: 1000,
        max_pairs: 1000,
    }
}

pub fn sample_store() -> DictionaryStore {
    DictionaryStore::new(sample_dictionary(), sample_connectivity())
        .with_zero_hint(zero_hint())
        .with_learning_config(learning_config())
}

pub fn sample_handle() -> ConcurrentStoreHandle {
    ConcurrentStoreHandle::new(sample_store())
}

pub fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}
