use std::collections::{HashMap, HashSet};

use tracing::{debug, debug_span};

use super::candidate::Candidate;
use super::constraint::PrefixConstraint;
use crate::dict::DicdataElement;
use crate::learning::MorphemeId;
use crate::settings::settings;
use crate::store::{ConcurrentStoreHandle, LookupOptions, RangeMatch, StoreError};
use crate::top_k::{Scored, TopKHeap};
use crate::unicode::hiragana_to_katakana;

/// One conversion query.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub input: &'a str,
    pub n_best: usize,
    pub typo_correction: bool,
    pub use_memory: bool,
    /// Element committed just before `input`; its rcid replaces BOS.
    pub previous: Option<&'a DicdataElement>,
    pub constraint: &'a PrefixConstraint,
}

/// A best-path entry kept at a node: accumulated value, the byte length of
/// the path text so far, and the (node, rank) it continues from.
#[derive(Debug, Clone)]
struct PathState {
    value: f32,
    text_len: usize,
    prev: Option<(usize, usize)>,
}

#[derive(Debug)]
struct LatticeNode {
    from: usize,
    to: usize,
    element: DicdataElement,
    /// Sorted best first, at most `path_beam` entries.
    paths: Vec<PathState>,
}

type PairBonuses = HashMap<(MorphemeId, String, MorphemeId), f32>;

/// Lattice construction and N-best path search.
///
/// The node arena and index are scratch space owned by whoever owns the
/// `LatticeSearch` and are cleared at the start of every search.
#[derive(Debug)]
pub struct LatticeSearch {
    max_span: usize,
    node_fanout: usize,
    path_beam: usize,
    unknown_value: f32,
    unknown_class: u16,
    bos_eos: u16,
    nodes: Vec<LatticeNode>,
    /// ending_at[i] = nodes whose span ends at input index i.
    ending_at: Vec<Vec<usize>>,
}

impl Default for LatticeSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LatticeSearch {
    pub fn new() -> Self {
        let s = &settings().lattice;
        Self {
            max_span: s.max_span,
            node_fanout: s.node_fanout,
            path_beam: s.path_beam,
            unknown_value: s.unknown_word_value,
            unknown_class: s.unknown_class_id,
            bos_eos: s.bos_eos_id,
            nodes: Vec::new(),
            ending_at: Vec::new(),
        }
    }

    /// Override the span and pruning widths.
    pub fn with_limits(mut self, max_span: usize, node_fanout: usize, path_beam: usize) -> Self {
        self.max_span = max_span.max(1);
        self.node_fanout = node_fanout;
        self.path_beam = path_beam;
        self
    }

    /// Nodes retained by the last search.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Up to `n_best` candidates covering the whole input, best first and
    /// distinct by text. Empty when no admissible path spans the input.
    pub fn search(
        &mut self,
        handle: &ConcurrentStoreHandle,
        req: &SearchRequest<'_>,
    ) -> Result<Vec<Candidate>, StoreError> {
        let input: Vec<char> = req.input.chars().collect();
        let n = input.len();
        let _span = debug_span!("lattice_search", n, n_best = req.n_best).entered();

        self.nodes.clear();
        self.ending_at.clear();
        if n == 0 || req.n_best == 0 {
            return Ok(Vec::new());
        }
        self.ending_at.resize_with(n + 1, Vec::new);

        let ignore = req.constraint.ignore_memory_and_user_dict();
        let opts = LookupOptions {
            typo_correction: req.typo_correction,
            ignore_memory_and_user_dict: ignore,
            use_memory: req.use_memory && !ignore,
        };
        let bonuses: PairBonuses = if opts.use_memory {
            handle
                .learned_pairs(req.input, req.previous)?
                .into_iter()
                .map(|p| ((p.prev, p.next_ruby, p.next), p.bonus))
                .collect()
        } else {
            HashMap::new()
        };

        for from in 0..n {
            if from > 0 && self.ending_at[from].is_empty() {
                continue;
            }
            let max_end = (from + self.max_span).min(n);
            let matches = handle.lookup_range(&input, from, from + 1..=max_end, opts)?;
            let c = input[from].to_string();
            let fallback = (!matches.iter().any(|m| m.to == from + 1)).then(|| RangeMatch {
                to: from + 1,
                element: self.unknown_element(&c, &c),
            });
            let copies = if req.constraint.prefix().is_empty() {
                Vec::new()
            } else {
                self.kana_copies(&c, fallback.is_some(), from + 1)
            };

            let mut fanout = TopKHeap::new(self.node_fanout);
            let mut staged: Vec<Option<(RangeMatch, Vec<PathState>)>> = Vec::new();
            let nodes = matches
                .into_iter()
                .chain(fallback)
                .map(|m| (m, false))
                .chain(copies.into_iter().map(|m| (m, true)));
            for (m, within_prefix) in nodes {
                let paths =
                    self.extend_paths(from, &m.element, req, &bonuses, handle, within_prefix);
                // Nodes no admissible path reaches never enter a heap.
                if paths.is_empty() {
                    continue;
                }
                fanout.insert_if_possible(Scored::new(m.element.value, staged.len()));
                staged.push(Some((m, paths)));
            }

            for Scored { item, .. } in fanout.drain_sorted_desc() {
                let Some((m, paths)) = staged[item].take() else {
                    continue;
                };
                let idx = self.nodes.len();
                self.nodes.push(LatticeNode {
                    from,
                    to: m.to,
                    element: m.element,
                    paths,
                });
                self.ending_at[m.to].push(idx);
            }
        }

        let mut finals = TopKHeap::new(self.path_beam.max(req.n_best));
        for &idx in &self.ending_at[n] {
            let node = &self.nodes[idx];
            let eos = handle.cc_value(node.element.rcid, self.bos_eos);
            for (rank, path) in node.paths.iter().enumerate() {
                if req.constraint.is_satisfied_by(path.text_len) {
                    finals.insert_if_possible(Scored::new(path.value + eos, (idx, rank)));
                }
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for Scored { score, item } in finals.drain_sorted_desc() {
            let candidate = Candidate::from_path(self.backtrace(item.0, item.1), score);
            if seen.insert(candidate.text.clone()) {
                out.push(candidate);
                if out.len() >= req.n_best {
                    break;
                }
            }
        }
        debug!(
            nodes = self.nodes.len(),
            candidates = out.len(),
            "lattice search done"
        );
        Ok(out)
    }

    /// Best paths reaching `element` placed at `from`. With `within_prefix`,
    /// only paths whose text still ends inside the constraint prefix extend.
    fn extend_paths(
        &self,
        from: usize,
        element: &DicdataElement,
        req: &SearchRequest<'_>,
        bonuses: &PairBonuses,
        handle: &ConcurrentStoreHandle,
        within_prefix: bool,
    ) -> Vec<PathState> {
        let prefix_len = req.constraint.prefix().len();
        let word_len = element.word.len();
        let mut heap = TopKHeap::new(self.path_beam);

        if from == 0 {
            if req.constraint.admits(0, &element.word) {
                let transition = match req.previous {
                    Some(prev) => {
                        handle.cc_value(prev.rcid, element.lcid)
                            + handle.mm_value(prev.mid, element.mid)
                            + pair_bonus(bonuses, prev, element)
                    }
                    None => handle.cc_value(self.bos_eos, element.lcid),
                };
                let value = transition + element.value;
                heap.insert_if_possible(Scored::new(
                    value,
                    PathState {
                        value,
                        text_len: word_len,
                        prev: None,
                    },
                ));
            }
        } else {
            for &prev_idx in &self.ending_at[from] {
                let prev = &self.nodes[prev_idx].element;
                let transition = handle.cc_value(prev.rcid, element.lcid)
                    + handle.mm_value(prev.mid, element.mid)
                    + pair_bonus(bonuses, prev, element);
                for (rank, path) in self.nodes[prev_idx].paths.iter().enumerate() {
                    if within_prefix && path.text_len >= prefix_len {
                        continue;
                    }
                    if !req.constraint.admits(path.text_len, &element.word) {
                        continue;
                    }
                    let value = path.value + transition + element.value;
                    heap.insert_if_possible(Scored::new(
                        value,
                        PathState {
                            value,
                            text_len: path.text_len + word_len,
                            prev: Some((prev_idx, rank)),
                        },
                    ));
                }
            }
        }

        heap.drain_sorted_desc()
            .into_iter()
            .map(|scored| scored.item)
            .collect()
    }

    fn backtrace(&self, mut idx: usize, mut rank: usize) -> Vec<DicdataElement> {
        let mut out = Vec::new();
        loop {
            let node = &self.nodes[idx];
            out.push(node.element.clone());
            match node.paths[rank].prev {
                Some((prev_idx, prev_rank)) => {
                    debug_assert_eq!(self.nodes[prev_idx].to, node.from);
                    idx = prev_idx;
                    rank = prev_rank;
                }
                None => break,
            }
        }
        out.reverse();
        out
    }

    /// Hiragana and katakana copies of the input character `c`, ending at
    /// `to`. A constrained path can keep part of the reading unconverted
    /// through them. The hiragana copy is left out when the character's
    /// fallback node already carries it.
    fn kana_copies(&self, c: &str, has_fallback: bool, to: usize) -> Vec<RangeMatch> {
        let mut out = Vec::with_capacity(2);
        if !has_fallback {
            out.push(RangeMatch {
                to,
                element: self.unknown_element(c, c),
            });
        }
        let katakana = hiragana_to_katakana(c);
        if katakana != c {
            out.push(RangeMatch {
                to,
                element: self.unknown_element(&katakana, c),
            });
        }
        out
    }

    fn unknown_element(&self, word: &str, ruby: &str) -> DicdataElement {
        DicdataElement::new(
            word,
            ruby,
            self.unknown_class,
            self.unknown_class,
            0,
            self.unknown_value,
        )
    }
}

fn pair_bonus(bonuses: &PairBonuses, prev: &DicdataElement, next: &DicdataElement) -> f32 {
    if bonuses.is_empty() {
        return 0.0;
    }
    bonuses
        .get(&(
            MorphemeId::of(prev),
            next.ruby.clone(),
            MorphemeId::of(next),
        ))
        .copied()
        .unwrap_or(0.0)
}
