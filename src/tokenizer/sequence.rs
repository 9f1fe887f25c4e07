// src/tokenizer/sequence.rs

use crate::tokenizer::pair::Pair;

/// One ingested document as a list of token ids. Rewritten in place as
/// merges are applied during training.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Sequence {
    ids: Vec<u32>,
}

impl Sequence {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, id: u32) {
        self.ids.push(id);
    }

    pub fn get_ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Replaces every non-overlapping occurrence of `(a, b)`, scanning left
    /// to right, with `new_id`.
    ///
    /// Returns the pair count deltas this rewrite causes within the
    /// sequence, so the caller can update global counts without rescanning.
    pub fn merge(&mut self, a: u32, b: u32, new_id: u32) -> Vec<(Pair, i64)> {
        let mut changes = Vec::new();
        let mut new_ids = Vec::with_capacity(self.ids.len());
        let mut i = 0;

        while i < self.ids.len() {
            if i + 1 < self.ids.len() && self.ids[i] == a && self.ids[i + 1] == b {
                changes.push(((a, b), -1));

                // The left neighbour comes from the rewritten prefix, which
                // may already hold `new_id` from the previous occurrence.
                if let Some(&prev) = new_ids.last() {
                    changes.push(((prev, a), -1));
                    changes.push(((prev, new_id), 1));
                }
                if let Some(&next) = self.ids.get(i + 2) {
                    changes.push(((b, next), -1));
                    changes.push(((new_id, next), 1));
                }

                new_ids.push(new_id);
                i += 2;
            } else {
                new_ids.push(self.ids[i]);
                i += 1;
            }
        }

        self.ids = new_ids;
        changes
    }
}

impl From<Vec<u32>> for Sequence {
    fn from(ids: Vec<u32>) -> Self {
        Self { ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    fn net(changes: Vec<(Pair, i64)>) -> FxHashMap<Pair, i64> {
        let mut out = FxHashMap::default();
        for (pair, delta) in changes {
            *out.entry(pair).or_insert(0) += delta;
        }
        out.retain(|_, v| *v != 0);
        out
    }

    #[test]
    fn merge_reports_neighbour_changes() {
        // c a b d
        let mut seq = Sequence::from(vec![3, 1, 2, 4]);
        let changes = net(seq.merge(1, 2, 9));
        assert_eq!(seq.get_ids(), &[3, 9, 4]);
        assert_eq!(changes[&(1, 2)], -1);
        assert_eq!(changes[&(3, 1)], -1);
        assert_eq!(changes[&(2, 4)], -1);
        assert_eq!(changes[&(3, 9)], 1);
        assert_eq!(changes[&(9, 4)], 1);
        assert_eq!(changes.len(), 5);
    }

    #[test]
    fn merge_of_repeated_symbol_is_non_overlapping() {
        // a a a a -> X X
        let mut seq = Sequence::from(vec![1, 1, 1, 1]);
        let changes = net(seq.merge(1, 1, 5));
        assert_eq!(seq.get_ids(), &[5, 5]);
        assert_eq!(changes[&(1, 1)], -3);
        assert_eq!(changes[&(5, 5)], 1);
        assert_eq!(changes.len(), 2);

        // a a a -> X a
        let mut seq = Sequence::from(vec![1, 1, 1]);
        let changes = net(seq.merge(1, 1, 5));
        assert_eq!(seq.get_ids(), &[5, 1]);
        assert_eq!(changes[&(1, 1)], -2);
        assert_eq!(changes[&(5, 1)], 1);
    }

    #[test]
    fn merge_without_match_is_noop() {
        let mut seq = Sequence::from(vec![1, 2, 3]);
        assert!(seq.merge(3, 1, 7).is_empty());
        assert_eq!(seq.get_ids(), &[1, 2, 3]);
    }
}
