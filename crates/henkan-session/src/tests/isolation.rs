//! Sessions sharing one handle never observe each other's state.

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use henkan_core::converter::{Candidate, PrefixConstraint};

use super::*;
use crate::{ConversionSession, ConvertRequestOptions, LearningMode};

const INPUTS: &[&str] = &[
    "きょうはいいてんきです",
    "わたしのなまえ",
    "かんじ",
    "きょうは",
    "49000",
    "てんき",
];

fn read_only() -> ConvertRequestOptions {
    ConvertRequestOptions {
        learning: LearningMode::ReadOnly,
        ..ConvertRequestOptions::default()
    }
}

#[derive(Debug, Clone)]
enum Op {
    Request { input: usize, constrained: bool },
    AcceptFirst,
    SetContext(&'static str),
    Reset,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..INPUTS.len(), any::<bool>())
            .prop_map(|(input, constrained)| Op::Request { input, constrained }),
        2 => Just(Op::AcceptFirst),
        1 => prop::sample::select(vec!["私は", "今日", ""]).prop_map(Op::SetContext),
        1 => Just(Op::Reset),
    ]
}

/// Per-session replay state: the session and its last result.
struct Driver {
    session: ConversionSession,
    last: Vec<Candidate>,
}

impl Driver {
    fn new(handle: Arc<henkan_core::store::ConcurrentStoreHandle>) -> Self {
        Self {
            session: ConversionSession::new(handle),
            last: Vec::new(),
        }
    }

    /// Apply `op` and return what it observed.
    fn apply(&mut self, op: &Op) -> (Vec<String>, String) {
        let opts = read_only();
        match op {
            Op::Request { input, constrained } => {
                self.last = if *constrained {
                    let snapshot = PrefixConstraint::new("今", false, false).snapshot();
                    self.session
                        .request_candidates_with_constraint(INPUTS[*input], &opts, &snapshot)
                        .unwrap()
                } else {
                    self.session.request_candidates(INPUTS[*input], &opts).unwrap()
                };
            }
            Op::AcceptFirst => {
                if let Some(first) = self.last.first().cloned() {
                    self.session.accept(&first, &opts).unwrap();
                }
            }
            Op::SetContext(context) => self.session.set_left_context(context),
            Op::Reset => self.session.reset(),
        }
        (texts(&self.last), self.session.left_context().to_string())
    }
}

#[test]
fn test_sessions_keep_separate_context() {
    let handle = make_test_handle();
    let opts = read_only();
    let mut a = ConversionSession::new(Arc::clone(&handle));
    let mut b = ConversionSession::new(Arc::clone(&handle));

    a.set_left_context("私は");
    let first = a.request_candidates("わたし", &opts).unwrap();
    a.accept(&first[0], &opts).unwrap();

    assert_eq!(a.left_context(), "私は私");
    assert_eq!(b.left_context(), "");
    assert!(b.previous().is_none());

    // The same query gives the same answer in a fresh session.
    let from_b = b.request_candidates("かんじ", &opts).unwrap();
    let fresh = ConversionSession::new(handle)
        .request_candidates("かんじ", &opts)
        .unwrap();
    assert_eq!(from_b, fresh);
}

#[test]
fn test_parallel_sessions_match_sequential_results() {
    let handle = make_test_handle();
    let opts = read_only();
    let mut reference = ConversionSession::new(Arc::clone(&handle));
    let expected: Vec<Vec<String>> = INPUTS
        .iter()
        .map(|input| texts(&reference.request_candidates(input, &opts).unwrap()))
        .collect();
    let expected = Arc::new(expected);

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let handle = Arc::clone(&handle);
            let expected = Arc::clone(&expected);
            thread::spawn(move || {
                let mut session = ConversionSession::new(handle);
                let opts = read_only();
                for round in 0..20 {
                    let i = (worker + round) % INPUTS.len();
                    let got = session.request_candidates(INPUTS[i], &opts).unwrap();
                    assert_eq!(texts(&got), expected[i], "worker {worker} round {round}");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_parallel_learning_updates_are_not_lost() {
    let handle = make_test_handle();
    let opts = ConvertRequestOptions::default();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                let mut session = ConversionSession::new(handle);
                let opts = ConvertRequestOptions::default();
                for _ in 0..2 {
                    let candidates = session.request_candidates("なまえ", &opts).unwrap();
                    let name = candidates.iter().find(|c| c.text == "名前").unwrap().clone();
                    session.reset();
                    session.accept(&name, &opts).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut session = ConversionSession::new(Arc::clone(&handle));
    let name = session.request_candidates("なまえ", &opts).unwrap()[0].clone();
    let element = &name.data[0];
    // Eight uses saturate the boost: -4.0 + min(8 * 1.5, 12.0).
    let retained = handle.retained_value(element).unwrap().unwrap();
    assert!((retained - 8.0).abs() < 0.01, "retained {retained}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn interleaved_sessions_match_solo_replay(
        ops in prop::collection::vec((0..3usize, arb_op()), 1..40)
    ) {
        let handle = make_test_handle();
        let mut drivers: Vec<Driver> = (0..3).map(|_| Driver::new(Arc::clone(&handle))).collect();
        let mut observed: Vec<Vec<(Vec<String>, String)>> = vec![Vec::new(); 3];
        for (who, op) in &ops {
            observed[*who].push(drivers[*who].apply(op));
        }

        for who in 0..3 {
            let mut solo = Driver::new(Arc::clone(&handle));
            let replayed: Vec<(Vec<String>, String)> = ops
                .iter()
                .filter(|(w, _)| *w == who)
                .map(|(_, op)| solo.apply(op))
                .collect();
            prop_assert_eq!(&replayed, &observed[who]);
        }
    }
}
