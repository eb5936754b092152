//! Bounded top-K retention used to prune the lattice without sorting.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Retains the `capacity` largest elements inserted so far.
///
/// Backed by a min-heap so the worst retained element is always at the root;
/// the best element is tracked alongside so both ends are O(1).
#[derive(Debug, Clone)]
pub struct TopKHeap<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<T>>,
    best: Option<T>,
}

impl<T: Ord + Clone> TopKHeap<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
            best: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Insert `item` if there is room, or if it is strictly better than the
    /// current worst element (which is evicted). Returns whether `item` was
    /// retained. An item equal to the current worst is rejected when full.
    pub fn insert_if_possible(&mut self, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            if self.best.as_ref().map_or(true, |best| item > *best) {
                self.best = Some(item.clone());
            }
            self.heap.push(Reverse(item));
            return true;
        }

        let evicts_best = match self.heap.peek() {
            Some(Reverse(worst)) if item > *worst => self.heap.len() == 1,
            _ => return false,
        };
        if evicts_best || self.best.as_ref().map_or(true, |best| item > *best) {
            self.best = Some(item.clone());
        }
        if let Some(mut root) = self.heap.peek_mut() {
            // Sifts down when `root` is dropped.
            *root = Reverse(item);
        }
        true
    }

    /// Best retained element.
    pub fn max(&self) -> Option<&T> {
        self.best.as_ref()
    }

    /// Worst retained element.
    pub fn min(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(item)| item)
    }

    /// Retained elements in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|Reverse(item)| item)
    }

    /// Drain into a Vec sorted best-first, leaving the heap empty for reuse.
    pub fn drain_sorted_desc(&mut self) -> Vec<T> {
        self.best = None;
        std::mem::take(&mut self.heap)
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(item)| item)
            .collect()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.best = None;
    }
}

/// An item ordered by an `f32` score alone (`total_cmp`), so it can live in a
/// `TopKHeap`.
#[derive(Debug, Clone, Copy)]
pub struct Scored<T> {
    pub score: f32,
    pub item: T,
}

impl<T> Scored<T> {
    pub fn new(score: f32, item: T) -> Self {
        Self { score, item }
    }
}

impl<T> PartialEq for Scored<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score) == Ordering::Equal
    }
}

impl<T> Eq for Scored<T> {}

impl<T> PartialOrd for Scored<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scored<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}
