//! Level-order unary degree sequence (LOUDS) trie over `char` labels.
//!
//! Nodes are numbered in breadth-first order with the root as node 0. The
//! bit sequence starts with a super-root `10`, then holds `1^d 0` for every
//! node with `d` children. Node `i`'s child list starts right after the
//! `(i + 1)`-th zero, and the `1` at position `p` is node `rank1(p + 1) - 1`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Append-only bit vector with a rank directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct BitVector {
    words: Vec<u64>,
    len: usize,
    /// ranks[w] = number of ones in words[..w]. Built by `finish`.
    ranks: Vec<u32>,
}

impl BitVector {
    fn push(&mut self, bit: bool) {
        let (w, b) = (self.len / 64, self.len % 64);
        if w == self.words.len() {
            self.words.push(0);
        }
        if bit {
            self.words[w] |= 1 << b;
        }
        self.len += 1;
    }

    fn finish(&mut self) {
        self.ranks.clear();
        self.ranks.reserve(self.words.len() + 1);
        let mut acc = 0u32;
        for word in &self.words {
            self.ranks.push(acc);
            acc += word.count_ones();
        }
        self.ranks.push(acc);
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn get(&self, pos: usize) -> bool {
        pos < self.len && (self.words[pos / 64] >> (pos % 64)) & 1 == 1
    }

    /// Number of ones in `[0, pos)`.
    pub(crate) fn rank1(&self, pos: usize) -> usize {
        let pos = pos.min(self.len);
        let (w, b) = (pos / 64, pos % 64);
        let base = self.ranks[w] as usize;
        if b == 0 {
            base
        } else {
            base + (self.words[w] & ((1u64 << b) - 1)).count_ones() as usize
        }
    }

    /// Position of the `k`-th zero (1-based).
    pub(crate) fn select0(&self, k: usize) -> Option<usize> {
        if k == 0 {
            return None;
        }
        let zeros_before = |w: usize| w * 64 - self.ranks[w] as usize;
        // Largest word index whose preceding zeros are fewer than k.
        let (mut lo, mut hi) = (0usize, self.words.len());
        while lo + 1 < hi {
            let mid = (lo + hi) / 2;
            if zeros_before(mid) < k {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let mut remaining = k - zeros_before(lo);
        let word = *self.words.get(lo)?;
        for b in 0..64 {
            if (word >> b) & 1 == 0 {
                remaining -= 1;
                if remaining == 0 {
                    let pos = lo * 64 + b;
                    return (pos < self.len).then_some(pos);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Louds {
    bits: BitVector,
    /// labels[node] is the edge label into `node`; the root holds '\0'.
    labels: Vec<char>,
    terminals: BitVector,
}

/// A trie match carrying how many substituted characters it needed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FuzzyMatch {
    pub reading: String,
    pub len: usize,
    pub typos: u8,
    pub value_index: usize,
}

impl Louds {
    /// Build from sorted, unique, non-empty keys.
    ///
    /// Returns the trie and, for every value index the trie hands out, the
    /// index of the originating key.
    pub(crate) fn build(keys: &[Vec<char>]) -> (Self, Vec<usize>) {
        let mut bits = BitVector::default();
        let mut terminals = BitVector::default();
        let mut labels = vec!['\0'];
        let mut order = Vec::with_capacity(keys.len());

        bits.push(true);
        bits.push(false);

        // (key range, depth) per node in breadth-first order.
        let mut queue = VecDeque::from([(0usize, keys.len(), 0usize)]);
        while let Some((lo, hi, depth)) = queue.pop_front() {
            let mut i = lo;
            let terminal = lo < hi && keys[lo].len() == depth;
            terminals.push(terminal);
            if terminal {
                order.push(lo);
                i += 1;
            }
            while i < hi {
                let label = keys[i][depth];
                let mut j = i + 1;
                while j < hi && keys[j][depth] == label {
                    j += 1;
                }
                bits.push(true);
                labels.push(label);
                queue.push_back((i, j, depth + 1));
                i = j;
            }
            bits.push(false);
        }

        bits.finish();
        terminals.finish();
        (
            Self {
                bits,
                labels,
                terminals,
            },
            order,
        )
    }

    /// Number of keys stored.
    pub(crate) fn terminal_count(&self) -> usize {
        self.terminals.rank1(self.terminals.len())
    }

    fn first_child_pos(&self, node: usize) -> Option<usize> {
        self.bits.select0(node + 1).map(|p| p + 1)
    }

    fn children(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let mut pos = self.first_child_pos(node);
        std::iter::from_fn(move || {
            let p = pos?;
            if !self.bits.get(p) {
                pos = None;
                return None;
            }
            pos = Some(p + 1);
            Some(self.bits.rank1(p + 1) - 1)
        })
    }

    fn child(&self, node: usize, label: char) -> Option<usize> {
        // Siblings are sorted by label.
        self.children(node)
            .take_while(|&c| self.labels[c] <= label)
            .find(|&c| self.labels[c] == label)
    }

    fn value_index(&self, node: usize) -> Option<usize> {
        self.terminals
            .get(node)
            .then(|| self.terminals.rank1(node))
    }

    fn walk(&self, key: &[char]) -> Option<usize> {
        key.iter().try_fold(0, |node, &c| self.child(node, c))
    }

    pub(crate) fn exact_match(&self, key: &[char]) -> Option<usize> {
        self.walk(key).and_then(|node| self.value_index(node))
    }

    /// All keys that are prefixes of `query`, as (length, value index).
    pub(crate) fn common_prefix_search(&self, query: &[char]) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut node = 0;
        for (depth, &c) in query.iter().enumerate() {
            match self.child(node, c) {
                Some(next) => node = next,
                None => break,
            }
            if let Some(idx) = self.value_index(node) {
                out.push((depth + 1, idx));
            }
        }
        out
    }

    /// Keys starting with `prefix`, in lexicographic order.
    pub(crate) fn predictive_search(&self, prefix: &[char], limit: usize) -> Vec<(String, usize)> {
        let mut out = Vec::new();
        self.predictive_walk(prefix, |key, idx| {
            if out.len() >= limit {
                return false;
            }
            out.push((key.to_string(), idx));
            true
        });
        out
    }

    /// Visit keys starting with `prefix` in lexicographic order until
    /// `visit` returns false.
    pub(crate) fn predictive_walk(&self, prefix: &[char], mut visit: impl FnMut(&str, usize) -> bool) {
        let Some(start) = self.walk(prefix) else {
            return;
        };
        let mut stack = vec![(start, prefix.iter().collect::<String>())];
        while let Some((node, key)) = stack.pop() {
            if let Some(idx) = self.value_index(node) {
                if !visit(&key, idx) {
                    return;
                }
            }
            let children: Vec<usize> = self.children(node).collect();
            // Reverse so the smallest label is popped first.
            for &child in children.iter().rev() {
                let mut next = key.clone();
                next.push(self.labels[child]);
                stack.push((child, next));
            }
        }
    }

    /// Prefixes of `query` reachable with at most `max_typos` substitutions
    /// drawn from `substitutes`.
    pub(crate) fn fuzzy_prefix_search<I>(
        &self,
        query: &[char],
        max_typos: u8,
        substitutes: impl Fn(char) -> I,
    ) -> Vec<FuzzyMatch>
    where
        I: Iterator<Item = char>,
    {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, 0usize, 0u8, String::new())];
        while let Some((node, depth, typos, reading)) = stack.pop() {
            if depth > 0 {
                if let Some(value_index) = self.value_index(node) {
                    out.push(FuzzyMatch {
                        reading: reading.clone(),
                        len: depth,
                        typos,
                        value_index,
                    });
                }
            }
            let Some(&c) = query.get(depth) else {
                continue;
            };
            if let Some(next) = self.child(node, c) {
                let mut r = reading.clone();
                r.push(c);
                stack.push((next, depth + 1, typos, r));
            }
            if typos < max_typos {
                for alt in substitutes(c) {
                    if let Some(next) = self.child(node, alt) {
                        let mut r = reading.clone();
                        r.push(alt);
                        stack.push((next, depth + 1, typos + 1, r));
                    }
                }
            }
        }
        out
    }
}
