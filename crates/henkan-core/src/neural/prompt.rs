use crate::settings::settings;
use crate::unicode::hiragana_to_katakana;

/// Reserved private-use markers delimiting prompt fields.
pub const CHAR_INPUT: char = '\u{EE00}';
pub const CHAR_OUTPUT: char = '\u{EE01}';
pub const CHAR_CONTEXT: char = '\u{EE02}';
pub const CHAR_PROFILE: char = '\u{EE03}';
pub const CHAR_TOPIC: char = '\u{EE04}';
pub const CHAR_STYLE: char = '\u{EE05}';
pub const CHAR_PREFERENCE: char = '\u{EE06}';
pub const CHAR_DICTIONARY: char = '\u{EE07}';

const MARKERS: [char; 8] = [
    CHAR_INPUT,
    CHAR_OUTPUT,
    CHAR_CONTEXT,
    CHAR_PROFILE,
    CHAR_TOPIC,
    CHAR_STYLE,
    CHAR_PREFERENCE,
    CHAR_DICTIONARY,
];

/// Profile-only format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Config {
    pub profile: Option<String>,
    pub max_left_context_chars: usize,
}

/// Persona format with topic, style and preference fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Config {
    pub profile: Option<String>,
    pub topic: Option<String>,
    pub style: Option<String>,
    pub preference: Option<String>,
    pub max_left_context_chars: usize,
}

impl Default for V2Config {
    fn default() -> Self {
        Self {
            profile: None,
            max_left_context_chars: settings().neural.max_left_context_chars,
        }
    }
}

impl Default for V3Config {
    fn default() -> Self {
        Self {
            profile: None,
            topic: None,
            style: None,
            preference: None,
            max_left_context_chars: settings().neural.max_left_context_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptConfig {
    V2(V2Config),
    V3(V3Config),
}

impl PromptConfig {
    pub fn max_left_context_chars(&self) -> usize {
        match self {
            PromptConfig::V2(c) => c.max_left_context_chars,
            PromptConfig::V3(c) => c.max_left_context_chars,
        }
    }
}

/// A dictionary entry shown to the model alongside the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryHint {
    pub word: String,
    pub ruby: String,
}

/// Builds prompts for one [`PromptConfig`].
///
/// Output depends only on the config and the arguments.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    config: PromptConfig,
    max_persona_chars: usize,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self {
            config,
            max_persona_chars: settings().neural.max_persona_chars,
        }
    }

    pub fn with_max_persona_chars(mut self, max: usize) -> Self {
        self.max_persona_chars = max;
        self
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Prompt asking for the characters that follow `left_context`.
    ///
    /// Format: `{conditions}{context}`
    ///
    /// The three markers frame the prompt and are written even when the
    /// context is empty; only the condition fields are optional.
    pub fn prediction_prompt(&self, left_context: &str) -> String {
        let mut out = String::new();
        self.push_conditions(&mut out);
        out.push(CHAR_CONTEXT);
        out.push(CHAR_INPUT);
        out.push(CHAR_OUTPUT);
        out.push_str(&self.trim_context(left_context));
        out
    }

    /// Prompt for scoring or extending `output` as the conversion of
    /// `reading`.
    ///
    /// Format: `{hints}{conditions}[{context}]{katakana}{output}`
    pub fn evaluation_prompt(
        &self,
        left_context: &str,
        reading: &str,
        hints: &[DictionaryHint],
        output: &str,
    ) -> String {
        let mut out = String::new();
        for hint in hints {
            let word = sanitize(&hint.word);
            let ruby = sanitize(&hiragana_to_katakana(&hint.ruby));
            if word.is_empty() || ruby.is_empty() {
                continue;
            }
            out.push(CHAR_DICTIONARY);
            out.push_str(&word);
            out.push('\u{FF1A}');
            out.push_str(&ruby);
        }
        self.push_conditions(&mut out);
        let context = self.trim_context(left_context);
        if !context.is_empty() {
            out.push(CHAR_CONTEXT);
            out.push_str(&context);
        }
        out.push(CHAR_INPUT);
        out.push_str(&sanitize(&hiragana_to_katakana(reading)));
        out.push(CHAR_OUTPUT);
        out.push_str(&sanitize(output));
        out
    }

    fn push_conditions(&self, out: &mut String) {
        match &self.config {
            PromptConfig::V2(c) => {
                self.push_field(out, CHAR_PROFILE, c.profile.as_deref());
            }
            PromptConfig::V3(c) => {
                self.push_field(out, CHAR_PROFILE, c.profile.as_deref());
                self.push_field(out, CHAR_TOPIC, c.topic.as_deref());
                self.push_field(out, CHAR_STYLE, c.style.as_deref());
                self.push_field(out, CHAR_PREFERENCE, c.preference.as_deref());
            }
        }
    }

    fn push_field(&self, out: &mut String, marker: char, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        let value: String = sanitize(value).chars().take(self.max_persona_chars).collect();
        if value.is_empty() {
            return;
        }
        out.push(marker);
        out.push_str(&value);
    }

    /// The trailing `max_left_context_chars` characters.
    fn trim_context(&self, context: &str) -> String {
        let context = sanitize(context);
        let max = self.config.max_left_context_chars();
        let skip = context.chars().count().saturating_sub(max);
        context.chars().skip(skip).collect()
    }
}

/// Drop reserved markers and widen ASCII spaces.
fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| !MARKERS.contains(c))
        .map(|c| if c == ' ' { '\u{3000}' } else { c })
        .collect()
}
