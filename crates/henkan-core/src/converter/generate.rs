//! Candidate list assembly around the lattice search.

use std::collections::HashSet;

use tracing::{debug, debug_span};

use super::candidate::{Candidate, ComposingCount};
use super::constraint::PrefixConstraint;
use super::numeric::group_digits;
use super::search::{LatticeSearch, SearchRequest};
use crate::dict::DicdataElement;
use crate::settings::settings;
use crate::store::{ConcurrentStoreHandle, LookupOptions, StoreError};
use crate::unicode::{hiragana_to_katakana, is_hiragana_reading};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub n_best: usize,
    pub typo_correction: bool,
    /// Append candidates whose reading extends the input.
    pub japanese_prediction: bool,
    /// Offer ASCII input as-is, with dictionary words it starts.
    pub english_prediction: bool,
    pub use_memory: bool,
    pub prediction_limit: usize,
    pub max_results: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        let s = &settings().candidates;
        Self {
            n_best: s.nbest,
            typo_correction: false,
            japanese_prediction: false,
            english_prediction: false,
            use_memory: true,
            prediction_limit: s.prediction_limit,
            max_results: s.max_results,
        }
    }
}

/// Ranked candidates for `input`.
///
/// Order: grouped number, English echo, lattice N-best, predictions, then
/// the kana forms of the input as a last resort. Every candidate satisfies
/// `constraint`, and texts are distinct.
pub fn generate_candidates(
    search: &mut LatticeSearch,
    handle: &ConcurrentStoreHandle,
    input: &str,
    previous: Option<&DicdataElement>,
    constraint: &PrefixConstraint,
    opts: &GenerateOptions,
) -> Result<Vec<Candidate>, StoreError> {
    let _span = debug_span!("generate_candidates", input).entered();
    let mut seen = HashSet::new();
    let mut out: Vec<Candidate> = Vec::new();
    let admitted = |c: &Candidate| {
        constraint.has_prefix(&c.text) && constraint.is_satisfied_by(c.text.len())
    };
    let input_len = input.chars().count();
    let lookup = LookupOptions {
        typo_correction: false,
        ignore_memory_and_user_dict: constraint.ignore_memory_and_user_dict(),
        use_memory: opts.use_memory && !constraint.ignore_memory_and_user_dict(),
    };

    let mut push = |candidate: Candidate, out: &mut Vec<Candidate>| {
        if admitted(&candidate) && seen.insert(candidate.text.clone()) {
            out.push(candidate);
        }
    };

    if let Some(grouped) = group_digits(input) {
        push(surface_candidate(grouped, input_len), &mut out);
    }

    if opts.english_prediction && !input.is_empty() && input.bytes().all(|b| b.is_ascii_alphabetic()) {
        push(surface_candidate(input.to_string(), input_len), &mut out);
        for element in handle.predict(&input.to_ascii_lowercase(), opts.prediction_limit, lookup)? {
            if element.ruby.is_ascii() {
                let value = element.value;
                let mut candidate = Candidate::from_path(vec![element], value);
                candidate.composing_count = ComposingCount::SurfaceCount(input_len);
                push(candidate, &mut out);
            }
        }
    }

    let request = SearchRequest {
        input,
        n_best: opts.n_best,
        typo_correction: opts.typo_correction,
        use_memory: opts.use_memory,
        previous,
        constraint,
    };
    for candidate in search.search(handle, &request)? {
        push(candidate, &mut out);
    }

    if opts.japanese_prediction && !input.is_empty() {
        let rcid = previous.map_or(settings().lattice.bos_eos_id, |e| e.rcid);
        for element in handle.predict(input, opts.prediction_limit, lookup)? {
            let value = handle.cc_value(rcid, element.lcid) + element.value;
            let mut candidate = Candidate::from_path(vec![element], value);
            candidate.composing_count = ComposingCount::InputCount(input_len);
            push(candidate, &mut out);
        }
    }

    if is_hiragana_reading(input) {
        let fallback = settings().lattice.unknown_word_value * input_len as f32;
        push(kana_candidate(input, input, fallback), &mut out);
        push(
            kana_candidate(&hiragana_to_katakana(input), input, fallback),
            &mut out,
        );
    }

    out.truncate(opts.max_results);
    debug!(count = out.len(), "candidates generated");
    Ok(out)
}

/// A candidate that echoes the input's own surface form.
fn surface_candidate(text: String, input_len: usize) -> Candidate {
    Candidate {
        text,
        value: 0.0,
        composing_count: ComposingCount::SurfaceCount(input_len),
        last_mid: 0,
        data: Vec::new(),
    }
}

/// A whole-input kana candidate backed by a single unknown-class element.
fn kana_candidate(text: &str, ruby: &str, value: f32) -> Candidate {
    let class = settings().lattice.unknown_class_id;
    let element = DicdataElement::new(text, ruby, class, class, 0, value);
    Candidate::from_path(vec![element], value)
}
