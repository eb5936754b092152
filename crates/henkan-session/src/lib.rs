//! Conversion sessions over a shared dictionary store.
//!
//! A `ConversionSession` holds the per-conversation state: lattice scratch
//! buffers, the committed left context, the last committed element and an
//! optional neural scorer. Sessions share nothing but the store handle, so
//! any number of them can run on separate threads.

mod assist;
mod error;
mod options;
mod trace_init;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, debug_span};

use henkan_core::converter::{
    generate_candidates, Candidate, ConstraintSnapshot, LatticeSearch, PostCompositionPrediction,
    PrefixConstraint,
};
use henkan_core::dict::DicdataElement;
use henkan_core::learning::LearningUpdate;
use henkan_core::neural::NeuralScorer;
use henkan_core::settings::settings;
use henkan_core::store::ConcurrentStoreHandle;

pub use error::ConversionError;
pub use options::{ConvertRequestOptions, LearningMode};
pub use trace_init::init_tracing;

pub struct ConversionSession {
    handle: Arc<ConcurrentStoreHandle>,
    search: LatticeSearch,
    scorer: Option<Box<dyn NeuralScorer + Send>>,
    max_iterations: usize,
    /// Text committed so far, trimmed to the prompt context length.
    left_context: String,
    /// Last element committed in this session.
    previous: Option<DicdataElement>,
}

impl ConversionSession {
    pub fn new(handle: Arc<ConcurrentStoreHandle>) -> Self {
        Self {
            handle,
            search: LatticeSearch::new(),
            scorer: None,
            max_iterations: settings().neural.max_iterations,
            left_context: String::new(),
            previous: None,
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn NeuralScorer + Send>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Cap on scorer calls per neural-assisted request.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn handle(&self) -> &Arc<ConcurrentStoreHandle> {
        &self.handle
    }

    pub fn left_context(&self) -> &str {
        &self.left_context
    }

    pub fn set_left_context(&mut self, context: &str) {
        self.left_context.clear();
        self.push_context(context);
    }

    pub fn previous(&self) -> Option<&DicdataElement> {
        self.previous.as_ref()
    }

    /// Forget the committed context.
    pub fn reset(&mut self) {
        self.left_context.clear();
        self.previous = None;
    }

    /// Ranked candidates for `input`.
    pub fn request_candidates(
        &mut self,
        input: &str,
        opts: &ConvertRequestOptions,
    ) -> Result<Vec<Candidate>, ConversionError> {
        self.convert(input, opts, PrefixConstraint::open())
    }

    /// Ranked candidates for `input` that satisfy a constraint restored from
    /// `snapshot`.
    pub fn request_candidates_with_constraint(
        &mut self,
        input: &str,
        opts: &ConvertRequestOptions,
        snapshot: &ConstraintSnapshot,
    ) -> Result<Vec<Candidate>, ConversionError> {
        let constraint = PrefixConstraint::from_snapshot(snapshot)?;
        self.convert(input, opts, constraint)
    }

    fn convert(
        &mut self,
        input: &str,
        opts: &ConvertRequestOptions,
        constraint: PrefixConstraint,
    ) -> Result<Vec<Candidate>, ConversionError> {
        let _span = debug_span!("request_candidates", input).entered();
        let candidates = match (&opts.neural, self.scorer.is_some()) {
            (Some(config), true) => {
                let config = config.clone();
                self.assisted(input, opts, constraint, config)?
            }
            _ => self.generate(input, opts, &constraint)?,
        };
        debug!(count = candidates.len(), "candidates ready");
        Ok(candidates)
    }

    fn generate(
        &mut self,
        input: &str,
        opts: &ConvertRequestOptions,
        constraint: &PrefixConstraint,
    ) -> Result<Vec<Candidate>, ConversionError> {
        Ok(generate_candidates(
            &mut self.search,
            &self.handle,
            input,
            self.previous.as_ref(),
            constraint,
            &opts.generate_options(),
        )?)
    }

    /// Commit `candidate`: record it in the learning memory (when the
    /// request's learning mode writes) and extend the session context.
    pub fn accept(
        &mut self,
        candidate: &Candidate,
        opts: &ConvertRequestOptions,
    ) -> Result<(), ConversionError> {
        if opts.learning.writes() && !candidate.data.is_empty() {
            self.handle.update_learning(
                LearningUpdate::Accepted {
                    candidate,
                    previous: self.previous.as_ref(),
                },
                opts.memory_bound,
            )?;
        }
        self.push_context(&candidate.text);
        if let Some(last) = candidate.last_element() {
            self.previous = Some(last.clone());
        }
        Ok(())
    }

    /// Commit a post-composition prediction.
    pub fn accept_prediction(
        &mut self,
        prediction: &PostCompositionPrediction,
        opts: &ConvertRequestOptions,
    ) -> Result<(), ConversionError> {
        if opts.learning.writes() {
            self.handle.update_learning(
                LearningUpdate::PostCompositionPrediction { prediction },
                opts.memory_bound,
            )?;
        }
        self.push_context(&prediction.text);
        if let Some(last) = prediction.data.last() {
            self.previous = Some(last.clone());
        }
        Ok(())
    }

    /// Candidates to follow `previous` with no further input: learned
    /// successors, then zero-hint elements.
    pub fn predict_next(
        &self,
        previous: &DicdataElement,
        limit: usize,
        opts: &ConvertRequestOptions,
    ) -> Result<Vec<PostCompositionPrediction>, ConversionError> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        if opts.learning.reads() {
            for (element, bonus) in self.handle.learned_successors(previous)? {
                let value = self.handle.cc_value(previous.rcid, element.lcid) + element.value + bonus;
                if seen.insert(element.word.clone()) {
                    out.push(PostCompositionPrediction::new(previous.clone(), vec![element], value));
                }
            }
        }
        for element in self.handle.zero_hint_predictions(previous.rcid, limit)? {
            let value = self.handle.cc_value(previous.rcid, element.lcid) + element.value;
            if seen.insert(element.word.clone()) {
                out.push(PostCompositionPrediction::new(previous.clone(), vec![element], value));
            }
        }
        out.truncate(limit);
        Ok(out)
    }

    /// [`predict_next`](Self::predict_next) after the last committed
    /// element, or nothing before the first commit.
    pub fn predict_after_commit(
        &self,
        limit: usize,
        opts: &ConvertRequestOptions,
    ) -> Result<Vec<PostCompositionPrediction>, ConversionError> {
        match &self.previous {
            Some(previous) => self.predict_next(previous, limit, opts),
            None => Ok(Vec::new()),
        }
    }

    fn push_context(&mut self, text: &str) {
        self.left_context.push_str(text);
        let max = settings().neural.max_left_context_chars;
        let excess = self.left_context.chars().count().saturating_sub(max);
        if excess > 0 {
            let cut = self
                .left_context
                .char_indices()
                .nth(excess)
                .map_or(self.left_context.len(), |(i, _)| i);
            self.left_context.drain(..cut);
        }
    }
}
