use crate::dict::{DicdataElement, ElementFlags};

/// How much of the composing text a candidate consumes.
///
/// Lattice candidates count input (reading) characters. Candidates that echo
/// the input's own surface form, such as English words or grouped numbers,
/// count surface units instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposingCount {
    InputCount(usize),
    SurfaceCount(usize),
}

impl ComposingCount {
    pub fn count(self) -> usize {
        match self {
            Self::InputCount(n) | Self::SurfaceCount(n) => n,
        }
    }
}

/// A completed path through the lattice.
///
/// Never mutated after creation; learning changes the store instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub value: f32,
    pub composing_count: ComposingCount,
    /// mid of the trailing element, for chaining predictions.
    pub last_mid: u16,
    pub data: Vec<DicdataElement>,
}

impl Candidate {
    /// Build from a lattice path, consuming the concatenated readings.
    pub fn from_path(data: Vec<DicdataElement>, value: f32) -> Self {
        let text = data.iter().map(|e| e.word.as_str()).collect();
        let consumed = data.iter().map(DicdataElement::ruby_count).sum();
        Self {
            text,
            value,
            composing_count: ComposingCount::InputCount(consumed),
            last_mid: data.last().map_or(0, |e| e.mid),
            data,
        }
    }

    /// Concatenated reading of the constituent elements.
    pub fn ruby(&self) -> String {
        self.data.iter().map(|e| e.ruby.as_str()).collect()
    }

    pub fn last_element(&self) -> Option<&DicdataElement> {
        self.data.last()
    }

    pub fn has_flag(&self, flag: ElementFlags) -> bool {
        self.data.iter().any(|e| e.flags.contains(flag))
    }
}

/// A candidate offered after a commit, predicted from the committed element.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCompositionPrediction {
    pub text: String,
    pub value: f32,
    /// The committed element the prediction follows.
    pub previous: DicdataElement,
    pub data: Vec<DicdataElement>,
}

impl PostCompositionPrediction {
    pub fn new(previous: DicdataElement, data: Vec<DicdataElement>, value: f32) -> Self {
        Self {
            text: data.iter().map(|e| e.word.as_str()).collect(),
            value,
            previous,
            data,
        }
    }
}
