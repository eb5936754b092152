//! Neural-assisted conversion.
//!
//! The scorer sees an evaluation prompt whose output is the current prefix
//! constraint. A continuation that disagrees with the best candidate
//! narrows the constraint up to the first differing character and the
//! search reruns. A score response switches to reranking the head of the
//! list instead.

use tracing::{debug, debug_span, warn};

use henkan_core::converter::{Candidate, PrefixConstraint};
use henkan_core::dict::ElementFlags;
use henkan_core::neural::{DictionaryHint, PromptBuilder, PromptConfig, ScorerResponse};
use henkan_core::settings::settings;

use crate::{ConversionError, ConversionSession, ConvertRequestOptions};

impl ConversionSession {
    pub(crate) fn assisted(
        &mut self,
        input: &str,
        opts: &ConvertRequestOptions,
        mut constraint: PrefixConstraint,
        config: PromptConfig,
    ) -> Result<Vec<Candidate>, ConversionError> {
        let _span = debug_span!("neural_assist", input).entered();
        let builder = PromptBuilder::new(config);
        let mut candidates = self.generate(input, opts, &constraint)?;

        for iteration in 0..self.max_iterations {
            let Some(best) = candidates.first() else {
                break;
            };
            let output = valid_prefix(constraint.prefix()).to_string();
            let prompt = builder.evaluation_prompt(
                &self.left_context,
                input,
                &dictionary_hints(&candidates),
                &output,
            );

            let snapshot = constraint.snapshot();
            let response = match self.scorer.as_mut().map(|s| s.evaluate(&prompt)) {
                Some(Ok(response)) => response,
                Some(Err(e)) => {
                    warn!(error = %e, iteration, "scorer failed, keeping lattice ranking");
                    break;
                }
                None => break,
            };
            constraint = PrefixConstraint::from_snapshot(&snapshot)?;

            let continuation = match response {
                ScorerResponse::Continuation(text) => text,
                ScorerResponse::Score(_) => {
                    self.rerank(&builder, input, &mut candidates);
                    break;
                }
            };
            if continuation.is_empty() {
                break;
            }
            let wanted = format!("{output}{continuation}");
            let Some((prefix, has_eos)) = next_prefix(&best.text, &wanted) else {
                debug!(iteration, "scorer agrees with best candidate");
                break;
            };
            if let Err(e) = constraint.narrow(prefix.into_bytes(), has_eos) {
                debug!(error = %e, "continuation does not narrow the constraint");
                break;
            }
            let narrowed = self.generate(input, opts, &constraint)?;
            if narrowed.is_empty() {
                debug!(iteration, "no candidate satisfies the scorer's prefix");
                break;
            }
            candidates = narrowed;
        }
        Ok(candidates)
    }

    /// Reorder the first `rerank_window` candidates by scorer score. Any
    /// failure leaves the order as it was.
    fn rerank(&mut self, builder: &PromptBuilder, input: &str, candidates: &mut [Candidate]) {
        let Some(scorer) = self.scorer.as_mut() else {
            return;
        };
        let window = settings().neural.rerank_window.min(candidates.len());
        let mut scored = Vec::with_capacity(window);
        for (i, candidate) in candidates[..window].iter().enumerate() {
            let prompt = builder.evaluation_prompt(&self.left_context, input, &[], &candidate.text);
            match scorer.evaluate(&prompt) {
                Ok(ScorerResponse::Score(score)) => scored.push((score, i)),
                Ok(ScorerResponse::Continuation(_)) => {
                    warn!("scorer answered a rerank prompt with text");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "rerank failed, keeping lattice ranking");
                    return;
                }
            }
        }
        // Stable on ties, so lattice order breaks them.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        let reordered: Vec<Candidate> = scored.iter().map(|&(_, i)| candidates[i].clone()).collect();
        candidates[..window].clone_from_slice(&reordered);
    }
}

/// User dictionary words among the candidates, shown to the scorer.
fn dictionary_hints(candidates: &[Candidate]) -> Vec<DictionaryHint> {
    let mut hints: Vec<DictionaryHint> = Vec::new();
    for element in candidates.iter().flat_map(|c| c.data.iter()) {
        if element.flags.contains(ElementFlags::IS_FROM_USER_DICTIONARY)
            && !hints.iter().any(|h| h.word == element.word && h.ruby == element.ruby)
        {
            hints.push(DictionaryHint {
                word: element.word.clone(),
                ruby: element.ruby.clone(),
            });
        }
    }
    hints
}

/// The longest prefix of `bytes` that is valid UTF-8.
fn valid_prefix(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// The constraint that steers the search from `best` toward `wanted`, or
/// `None` when they agree.
///
/// When `wanted` stops short of `best`, the result ends the sequence there.
/// Otherwise it keeps the agreed part plus `wanted`'s next character.
pub(crate) fn next_prefix(best: &str, wanted: &str) -> Option<(String, bool)> {
    if best == wanted {
        return None;
    }
    if best.starts_with(wanted) {
        return Some((wanted.to_string(), true));
    }
    let common: usize = best
        .chars()
        .zip(wanted.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    let next = wanted[common..].chars().next()?;
    Some((format!("{}{next}", &wanted[..common]), false))
}
