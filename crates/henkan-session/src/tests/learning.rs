use henkan_core::converter::Candidate;
use henkan_core::store::StoreNotification;

use super::*;
use crate::{ConversionSession, ConvertRequestOptions, LearningMode};

fn find(candidates: &[Candidate], text: &str) -> Option<(usize, Candidate)> {
    candidates
        .iter()
        .position(|c| c.text == text)
        .map(|i| (i, candidates[i].clone()))
}

fn top(session: &mut ConversionSession, input: &str, opts: &ConvertRequestOptions) -> String {
    session.reset();
    session.request_candidates(input, opts).unwrap()[0].text.clone()
}

/// Accept `text` for `input` from a clean context.
fn learn(session: &mut ConversionSession, input: &str, text: &str, opts: &ConvertRequestOptions) {
    session.reset();
    let candidates = session.request_candidates(input, opts).unwrap();
    let (_, candidate) = find(&candidates, text).unwrap();
    session.accept(&candidate, opts).unwrap();
}

#[test]
fn test_accepting_never_lowers_rank_or_value() {
    let mut session = ConversionSession::new(make_test_handle());
    let opts = ConvertRequestOptions::default();
    let mut last: Option<(usize, f32)> = None;
    for _ in 0..5 {
        session.reset();
        let candidates = session.request_candidates("きょうは", &opts).unwrap();
        let (rank, candidate) = find(&candidates, "京は").unwrap();
        if let Some((prev_rank, prev_value)) = last {
            assert!(rank <= prev_rank);
            assert!(candidate.value >= prev_value);
        }
        last = Some((rank, candidate.value));
        session.accept(&candidate, &opts).unwrap();
    }
    assert_eq!(last.map(|(rank, _)| rank), Some(0));
}

#[test]
fn test_read_only_does_not_record() {
    let handle = make_test_handle();
    let mut session = ConversionSession::new(Arc::clone(&handle));
    let opts = ConvertRequestOptions {
        learning: LearningMode::ReadOnly,
        ..ConvertRequestOptions::default()
    };
    learn(&mut session, "きょうは", "京は", &opts);
    let candidates = session.request_candidates("きょうは", &opts).unwrap();
    let (_, kyo) = find(&candidates, "京は").unwrap();
    assert_eq!(handle.retained_value(&kyo.data[0]).unwrap(), None);
    assert_eq!(top(&mut session, "きょうは", &opts), "今日は");
}

#[test]
fn test_learning_off_ignores_memory() {
    let mut session = ConversionSession::new(make_test_handle());
    let write = ConvertRequestOptions::default();
    for _ in 0..3 {
        learn(&mut session, "きょうは", "京は", &write);
    }
    assert_eq!(top(&mut session, "きょうは", &write), "京は");

    let off = ConvertRequestOptions {
        learning: LearningMode::Off,
        ..ConvertRequestOptions::default()
    };
    assert_eq!(top(&mut session, "きょうは", &off), "今日は");
}

#[test]
fn test_memory_bound_evicts_least_used() {
    let handle = make_test_handle();
    let mut session = ConversionSession::new(Arc::clone(&handle));
    let opts = ConvertRequestOptions {
        memory_bound: Some(2),
        ..ConvertRequestOptions::default()
    };
    learn(&mut session, "わたし", "私", &opts);
    learn(&mut session, "なまえ", "名前", &opts);
    learn(&mut session, "なまえ", "名前", &opts);
    learn(&mut session, "かんじ", "漢字", &opts);

    let element = |input: &str, text: &str, session: &mut ConversionSession| {
        session.reset();
        let candidates = session.request_candidates(input, &opts).unwrap();
        find(&candidates, text).unwrap().1.data[0].clone()
    };
    let watashi = element("わたし", "私", &mut session);
    let namae = element("なまえ", "名前", &mut session);
    let kanji = element("かんじ", "漢字", &mut session);
    assert_eq!(handle.retained_value(&watashi).unwrap(), None);
    assert!(handle.retained_value(&namae).unwrap().is_some());
    assert!(handle.retained_value(&kanji).unwrap().is_some());
}

#[test]
fn test_learned_pair_leads_next_prediction() {
    let mut session = ConversionSession::new(make_test_handle());
    let opts = ConvertRequestOptions::default();
    learn(&mut session, "わたしの", "私の", &opts);

    let previous = session.previous().cloned().unwrap();
    assert_eq!(previous.word, "の");
    let watashi = henkan_core::dict::DicdataElement::new("私", "わたし", NOUN, NOUN, 80, -3.0);
    let predictions = session.predict_next(&watashi, 3, &opts).unwrap();
    assert_eq!(predictions[0].text, "の");
    assert!(predictions[0].value > predictions[1].value);
    assert_eq!(predictions.iter().filter(|p| p.text == "の").count(), 1);
}

#[test]
fn test_accepted_prediction_is_recorded() {
    let handle = make_test_handle();
    let mut session = ConversionSession::new(Arc::clone(&handle));
    let opts = ConvertRequestOptions::default();
    learn(&mut session, "わたし", "私", &opts);

    let predictions = session.predict_after_commit(3, &opts).unwrap();
    let no = predictions.iter().find(|p| p.text == "の").unwrap().clone();
    session.accept_prediction(&no, &opts).unwrap();
    assert_eq!(session.left_context(), "私の");
    let first = handle.retained_value(&no.data[0]).unwrap().unwrap();

    session.accept_prediction(&no, &opts).unwrap();
    let second = handle.retained_value(&no.data[0]).unwrap().unwrap();
    assert!(second > first);
}

#[test]
fn test_forget_memory() {
    let handle = make_test_handle();
    let mut session = ConversionSession::new(Arc::clone(&handle));
    let opts = ConvertRequestOptions::default();
    for _ in 0..3 {
        learn(&mut session, "きょうは", "京は", &opts);
    }
    assert_eq!(top(&mut session, "きょうは", &opts), "京は");
    handle.notify(StoreNotification::ForgetMemory).unwrap();
    assert_eq!(top(&mut session, "きょうは", &opts), "今日は");
}

#[test]
fn test_flush_and_reload_restore_learning() {
    let dir = tempfile::tempdir().unwrap();
    let opts = ConvertRequestOptions::default();
    {
        let handle = make_persistent_handle(dir.path().to_path_buf());
        let mut session = ConversionSession::new(Arc::clone(&handle));
        for _ in 0..3 {
            learn(&mut session, "きょうは", "京は", &opts);
        }
        handle.notify(StoreNotification::Flush).unwrap();
    }

    let handle = make_persistent_handle(dir.path().to_path_buf());
    let mut session = ConversionSession::new(Arc::clone(&handle));
    assert_eq!(top(&mut session, "きょうは", &opts), "今日は");
    handle.notify(StoreNotification::Reload).unwrap();
    assert_eq!(top(&mut session, "きょうは", &opts), "京は");
}
