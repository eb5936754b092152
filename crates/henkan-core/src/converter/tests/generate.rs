use crate::converter::{
    generate_candidates, Candidate, ComposingCount, GenerateOptions, LatticeSearch, PrefixConstraint,
};
use crate::dict::{DictEntry, ElementFlags};
use crate::store::ConcurrentStoreHandle;
use crate::testutil::{sample_handle, NOUN};

fn generate(
    handle: &ConcurrentStoreHandle,
    input: &str,
    constraint: &PrefixConstraint,
    opts: &GenerateOptions,
) -> Vec<Candidate> {
    let mut search = LatticeSearch::new();
    generate_candidates(&mut search, handle, input, None, constraint, opts).unwrap()
}

fn texts(candidates: &[Candidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.text.as_str()).collect()
}

#[test]
fn test_grouped_number_comes_first() {
    let handle = sample_handle();
    let results = generate(&handle, "49000", &PrefixConstraint::open(), &GenerateOptions::default());
    assert_eq!(results[0].text, "49,000");
    assert_eq!(results[0].composing_count, ComposingCount::SurfaceCount(5));
    assert!(texts(&results).contains(&"49000"));
}

#[test]
fn test_short_number_is_not_grouped() {
    let handle = sample_handle();
    let results = generate(&handle, "12", &PrefixConstraint::open(), &GenerateOptions::default());
    assert!(results.iter().all(|c| !c.text.contains(',')));
}

#[test]
fn test_kana_fallbacks_close_the_list() {
    let handle = sample_handle();
    let results = generate(&handle, "きょう", &PrefixConstraint::open(), &GenerateOptions::default());
    assert_eq!(results[0].text, "今日");
    let names = texts(&results);
    let n = names.len();
    assert_eq!(&names[n - 2..], &["きょう", "キョウ"]);
    assert!(!names.contains(&"京都"));
}

#[test]
fn test_japanese_prediction() {
    let handle = sample_handle();
    let opts = GenerateOptions {
        japanese_prediction: true,
        ..GenerateOptions::default()
    };
    let results = generate(&handle, "きょう", &PrefixConstraint::open(), &opts);
    let kyoto = results
        .iter()
        .find(|c| c.text == "京都")
        .expect("prediction present");
    assert_eq!(kyoto.composing_count, ComposingCount::InputCount(3));
    let pos = |text: &str| results.iter().position(|c| c.text == text).unwrap();
    assert!(pos("今日") < pos("京都"));
    assert!(pos("京都") < pos("キョウ"));
}

#[test]
fn test_english_echo_and_user_words() {
    let handle = sample_handle();
    handle
        .register_user_word(
            "hello",
            DictEntry {
                word: "Hello".to_string(),
                lcid: NOUN,
                rcid: NOUN,
                mid: 90,
                value: -2.0,
            },
        )
        .unwrap();
    let opts = GenerateOptions {
        english_prediction: true,
        ..GenerateOptions::default()
    };
    let results = generate(&handle, "hel", &PrefixConstraint::open(), &opts);
    assert_eq!(results[0].text, "hel");
    let hello = results.iter().find(|c| c.text == "Hello").expect("user word");
    assert_eq!(hello.composing_count, ComposingCount::SurfaceCount(3));
    assert!(hello.has_flag(ElementFlags::IS_FROM_USER_DICTIONARY));
    assert_eq!(texts(&results).iter().filter(|t| **t == "hel").count(), 1);
}

#[test]
fn test_constraint_filters_every_source() {
    let handle = sample_handle();
    let opts = GenerateOptions {
        japanese_prediction: true,
        ..GenerateOptions::default()
    };
    let results = generate(&handle, "きょう", &PrefixConstraint::new("京", false, false), &opts);
    assert!(!results.is_empty());
    assert!(results.iter().all(|c| c.text.starts_with('京')));
    assert!(texts(&results).contains(&"京都"));

    let exact = generate(&handle, "きょう", &PrefixConstraint::new("京", true, false), &opts);
    assert_eq!(texts(&exact), vec!["京"]);
}

#[test]
fn test_max_results_truncates() {
    let handle = sample_handle();
    let opts = GenerateOptions {
        max_results: 2,
        ..GenerateOptions::default()
    };
    let results = generate(&handle, "かんじ", &PrefixConstraint::open(), &opts);
    assert_eq!(texts(&results), vec!["漢字", "感じ"]);
}
