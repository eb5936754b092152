//! Neural-assist interface: prompt construction and the external scorer seam.
//!
//! The model itself lives outside this crate. A scorer receives a prompt
//! built by [`PromptBuilder`] and answers with either a text continuation
//! or a score for the prompt's output.

mod prompt;
#[cfg(test)]
mod tests;

pub use prompt::{
    DictionaryHint, PromptBuilder, PromptConfig, V2Config, V3Config, CHAR_CONTEXT,
    CHAR_DICTIONARY, CHAR_INPUT, CHAR_OUTPUT, CHAR_PREFERENCE, CHAR_PROFILE, CHAR_STYLE,
    CHAR_TOPIC,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ScorerResponse {
    /// Text the model expects after the prompt's output marker.
    Continuation(String),
    /// Log-probability-like score of the prompt's output, higher is better.
    Score(f32),
}

#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("scorer unavailable: {0}")]
    Unavailable(String),

    #[error("scorer failed: {0}")]
    Failed(String),
}

/// An external model consulted during conversion.
///
/// Called once per prompt; a failure is reported, never retried here.
pub trait NeuralScorer {
    fn evaluate(&mut self, prompt: &str) -> Result<ScorerResponse, ScorerError>;
}
