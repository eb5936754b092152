use henkan_core::converter::GenerateOptions;
use henkan_core::neural::PromptConfig;
use henkan_core::settings::settings;

/// How a request interacts with the learning memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearningMode {
    /// Neither apply boosts nor record acceptances.
    Off,
    /// Apply boosts, record nothing.
    ReadOnly,
    #[default]
    ReadWrite,
}

impl LearningMode {
    pub fn reads(self) -> bool {
        !matches!(self, LearningMode::Off)
    }

    pub fn writes(self) -> bool {
        matches!(self, LearningMode::ReadWrite)
    }
}

/// Per-request knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertRequestOptions {
    pub n_best: usize,
    pub typo_correction: bool,
    pub japanese_prediction: bool,
    pub english_prediction: bool,
    pub learning: LearningMode,
    /// Caps the learning memory on the next accepted update.
    pub memory_bound: Option<usize>,
    /// Neural assist is off when `None`.
    pub neural: Option<PromptConfig>,
}

impl Default for ConvertRequestOptions {
    fn default() -> Self {
        Self {
            n_best: settings().candidates.nbest,
            typo_correction: false,
            japanese_prediction: false,
            english_prediction: false,
            learning: LearningMode::default(),
            memory_bound: None,
            neural: None,
        }
    }
}

impl ConvertRequestOptions {
    pub(crate) fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            n_best: self.n_best,
            typo_correction: self.typo_correction,
            japanese_prediction: self.japanese_prediction,
            english_prediction: self.english_prediction,
            use_memory: self.learning.reads(),
            ..GenerateOptions::default()
        }
    }
}
