use crate::DocId;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Document with its relevance score. Scores are always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(doc_id: DocId, score: f64) -> Self {
        Self { doc_id, score }
    }
}

/// Heap slot. "Greater" means "evicted first": lower score, then later
/// insertion, so the heap top is always the next entry to drop.
#[derive(Debug, Clone, Copy)]
struct Slot {
    doc: ScoredDocument,
    seq: u64,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        other.doc.score.total_cmp(&self.doc.score).then(self.seq.cmp(&other.seq))
    }
}

/// Keeps the `k` highest-scoring documents offered to it without retaining
/// the rest.
///
/// A new entry replaces the current minimum only when its score is strictly
/// greater; on equal scores the earlier entry stays.
#[derive(Debug, Clone)]
pub struct TopK {
    heap: BinaryHeap<Slot>,
    k: usize,
    seq: u64,
    total_collected: usize,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self { heap: BinaryHeap::with_capacity(k.min(4096) + 1), k, seq: 0, total_collected: 0 }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Entries offered so far, retained or not.
    pub fn total_collected(&self) -> usize {
        self.total_collected
    }

    /// Lowest retained score, once the selector is full.
    pub fn threshold(&self) -> Option<f64> {
        if self.heap.len() < self.k {
            return None;
        }
        self.heap.peek().map(|s| s.doc.score)
    }

    /// Offer an entry; returns whether it was retained.
    pub fn push(&mut self, doc: ScoredDocument) -> bool {
        self.total_collected += 1;
        if self.k == 0 || !doc.score.is_finite() {
            return false;
        }
        let slot = Slot { doc, seq: self.seq };
        self.seq += 1;
        if self.heap.len() < self.k {
            self.heap.push(slot);
            return true;
        }
        match self.heap.peek_mut() {
            Some(mut min) if doc.score > min.doc.score => {
                *min = slot;
                true
            }
            _ => false,
        }
    }

    /// Retained entries from highest to lowest score, equal scores by
    /// ascending document id.
    pub fn into_sorted_vec(self) -> Vec<ScoredDocument> {
        let mut out: Vec<ScoredDocument> = self.heap.into_iter().map(|s| s.doc).collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        out
    }

    /// Reduce independently filled selectors to one of size `k`.
    pub fn merge<I: IntoIterator<Item = TopK>>(k: usize, parts: I) -> TopK {
        let mut merged = TopK::new(k);
        let mut collected = 0;
        for part in parts {
            collected += part.total_collected;
            merged.extend(part.into_sorted_vec());
        }
        merged.total_collected = collected;
        merged
    }
}

impl Extend<ScoredDocument> for TopK {
    fn extend<T: IntoIterator<Item = ScoredDocument>>(&mut self, iter: T) {
        for doc in iter {
            self.push(doc);
        }
    }
}
