//! Kana-to-kanji conversion: lattice construction, N-best path search and
//! candidate assembly.
//!
//! `LatticeSearch` expands a reading into scored morpheme paths using the
//! store's range lookups and connectivity tables; `generate_candidates` wraps
//! it with numeric, English, predictive and kana candidates.

mod candidate;
mod constraint;
mod generate;
pub mod numeric;
mod search;
#[cfg(test)]
mod tests;

pub use candidate::{Candidate, ComposingCount, PostCompositionPrediction};
pub use constraint::{ConstraintError, ConstraintSnapshot, PrefixConstraint};
pub use generate::{generate_candidates, GenerateOptions};
pub use search::{LatticeSearch, SearchRequest};
