//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`

use std::sync::OnceLock;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let custom = CUSTOM_TOML
            .get()
            .and_then(|s| parse_settings_toml(s).ok());
        match custom {
            Some(s) => s,
            // The embedded TOML is validated by build.rs and by `parse_default_toml`.
            None => parse_settings_toml(DEFAULT_SETTINGS_TOML)
                .unwrap_or_else(|e| panic!("embedded settings TOML is invalid: {e}")),
        }
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub lattice: LatticeSettings,
    pub typo: TypoSettings,
    pub learning: LearningSettings,
    pub candidates: CandidateSettings,
    pub neural: NeuralSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatticeSettings {
    pub max_span: usize,
    pub node_fanout: usize,
    pub path_beam: usize,
    pub unknown_word_value: f32,
    pub bos_eos_id: u16,
    pub unknown_class_id: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypoSettings {
    pub penalty: f32,
    pub max_typos: u8,
}

/// Reinforcement and eviction policy for the learning memory.
///
/// These are policy constants, so they stay configurable instead of being
/// baked into `LearningMemory`.
#[derive(Debug, Clone, Deserialize)]
pub struct LearningSettings {
    /// Value added to an element per accepted use.
    pub reinforcement: f32,
    /// Cap on the accumulated element boost.
    pub max_boost: f32,
    /// Value added to a (previous, next) pair per accepted use.
    pub pair_reinforcement: f32,
    pub max_pair_boost: f32,
    pub half_life_hours: f64,
    /// Decayed relevance below which an entry is considered stale.
    pub eviction_threshold: f64,
    pub max_entries: usize,
    pub max_pairs: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateSettings {
    pub nbest: usize,
    pub max_results: usize,
    pub prediction_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeuralSettings {
    pub max_iterations: usize,
    pub max_left_context_chars: usize,
    pub max_persona_chars: usize,
    pub rerank_window: usize,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! invalid {
        ($section:ident . $field:ident, $reason:expr) => {
            return Err(SettingsError::InvalidValue {
                field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                reason: $reason.to_string(),
            })
        };
    }
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                invalid!($section.$field, "must be positive");
            }
        };
    }
    macro_rules! check_non_negative_f {
        ($section:ident . $field:ident) => {
            if !(s.$section.$field >= 0.0) {
                invalid!($section.$field, "must be non-negative");
            }
        };
    }

    check_positive!(lattice.max_span);
    check_positive!(lattice.node_fanout);
    check_positive!(lattice.path_beam);
    if s.lattice.unknown_word_value.is_nan() {
        invalid!(lattice.unknown_word_value, "must be a number");
    }

    if !(s.typo.penalty <= 0.0) {
        invalid!(typo.penalty, "must be zero or negative");
    }

    check_non_negative_f!(learning.reinforcement);
    check_non_negative_f!(learning.max_boost);
    check_non_negative_f!(learning.pair_reinforcement);
    check_non_negative_f!(learning.max_pair_boost);
    check_non_negative_f!(learning.eviction_threshold);
    if !(s.learning.half_life_hours > 0.0) {
        invalid!(learning.half_life_hours, "must be positive");
    }
    check_positive!(learning.max_entries);
    check_positive!(learning.max_pairs);

    check_positive!(candidates.nbest);
    check_positive!(candidates.max_results);

    check_positive!(neural.max_left_context_chars);
    check_positive!(neural.max_persona_chars);
    check_positive!(neural.rerank_window);

    Ok(())
}
