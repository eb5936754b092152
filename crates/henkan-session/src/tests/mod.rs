mod isolation;
mod learning;

use std::path::PathBuf;
use std::sync::Arc;

use henkan_core::dict::{
    ConnectionMatrix, Connectivity, DicdataElement, DictEntry, LoudsDictionary, MorphemePairTable,
};
use henkan_core::learning::LearningConfig;
use henkan_core::store::{ConcurrentStoreHandle, DictionaryStore};

pub(super) const NOUN: u16 = 1;
pub(super) const PARTICLE: u16 = 2;
pub(super) const ADJECTIVE: u16 = 3;
pub(super) const AUXILIARY: u16 = 4;

fn entry(word: &str, class: u16, mid: u16, value: f32) -> DictEntry {
    DictEntry {
        word: word.to_string(),
        lcid: class,
        rcid: class,
        mid,
        value,
    }
}

fn make_test_dict() -> LoudsDictionary {
    let rows: Vec<(String, Vec<DictEntry>)> = vec![
        (
            "きょう".into(),
            vec![
                entry("今日", NOUN, 10, -3.0),
                entry("京", NOUN, 11, -6.0),
                entry("強", NOUN, 12, -7.0),
            ],
        ),
        ("き".into(), vec![entry("木", NOUN, 13, -4.0), entry("気", NOUN, 14, -3.5)]),
        (
            "は".into(),
            vec![
                entry("は", PARTICLE, 20, -1.0),
                entry("葉", NOUN, 21, -6.0),
                entry("歯", NOUN, 22, -6.5),
            ],
        ),
        (
            "いい".into(),
            vec![entry("いい", ADJECTIVE, 30, -3.5), entry("良い", ADJECTIVE, 31, -4.0)],
        ),
        (
            "てんき".into(),
            vec![entry("天気", NOUN, 40, -4.0), entry("転機", NOUN, 41, -7.0)],
        ),
        ("です".into(), vec![entry("です", AUXILIARY, 50, -1.5)]),
        (
            "かんじ".into(),
            vec![
                entry("漢字", NOUN, 60, -4.0),
                entry("感じ", NOUN, 61, -4.5),
                entry("幹事", NOUN, 62, -6.0),
            ],
        ),
        ("わたし".into(), vec![entry("私", NOUN, 80, -3.0)]),
        ("の".into(), vec![entry("の", PARTICLE, 81, -1.0)]),
        ("なまえ".into(), vec![entry("名前", NOUN, 82, -4.0)]),
    ];
    LoudsDictionary::from_entries(rows)
}

fn make_test_connectivity() -> Connectivity {
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

pub(super) fn make_test_store() -> DictionaryStore {
    DictionaryStore::new(make_test_dict(), make_test_connectivity())
        .with_zero_hint(vec![
            DicdataElement::new("は", "は", PARTICLE, PARTICLE, 20, -1.0),
            DicdataElement::new("の", "の", PARTICLE, PARTICLE, 81, -1.0),
            DicdataElement::new("です", "です", AUXILIARY, AUXILIARY, 50, -1.5),
        ])
        .with_learning_config(LearningConfig {
            reinforcement: 1.5,
            max_boost: 12.0,
            pair_reinforcement: 1.0,
            max_pair_boost: 6.0,
            half_life_hours: 168.0,
            eviction_threshold: 0.05,
            max_entries: 1000,
            max_pairs: 1000,
        })
}

pub(super) fn make_test_handle() -> Arc<ConcurrentStoreHandle> {
    Arc::new(ConcurrentStoreHandle::new(make_test_store()))
}

pub(super) fn make_persistent_handle(dir: PathBuf) -> Arc<ConcurrentStoreHandle> {
    Arc::new(ConcurrentStoreHandle::new(
        make_test_store().with_persist_dir(dir),
    ))
}

pub(super) fn texts(candidates: &[henkan_core::converter::Candidate]) -> Vec<String> {
    candidates.iter().map(|c| c.text.clone()).collect()
}
