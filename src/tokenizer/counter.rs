// src/tokenizer/counter.rs

use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::tokenizer::pair::Pair;
use crate::tokenizer::parallelism::MaybeParallelRefIterator;
use crate::tokenizer::progress::ProgressBar;
use crate::tokenizer::sequence::Sequence;

/// A heap entry. Entries go stale when the pair's count changes after they
/// were pushed; stale entries are discarded when popped.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    pair: Pair,
    count: i64,
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on count; equal counts prefer the smaller (left, right).
        self.count
            .cmp(&other.count)
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

/// Global adjacent-pair counts over a set of sequences, kept current by
/// applying the local deltas each merge reports.
#[derive(Debug, Default)]
pub struct PairCounter {
    counts: HashMap<Pair, i64>,
    // Sequences that may contain the pair. May hold stale indices; merging a
    // sequence that no longer has the pair is a no-op.
    where_to_update: HashMap<Pair, HashSet<usize>>,
    queue: BinaryHeap<Candidate>,
}

impl PairCounter {
    /// Full scan of `sequences`. Pairs never span two sequences.
    pub fn count(
        sequences: &[Sequence],
        parallel: bool,
        p: &Option<ProgressBar>,
    ) -> Self {
        let (counts, where_to_update) = sequences
            .maybe_par_iter_cond(parallel)
            .enumerate()
            .map(|(i, sequence)| {
                let mut counts_local: HashMap<Pair, i64> = HashMap::default();
                let mut where_local: HashMap<Pair, HashSet<usize>> = HashMap::default();
                for window in sequence.get_ids().windows(2) {
                    let cur_pair: Pair = (window[0], window[1]);
                    *counts_local.entry(cur_pair).or_insert(0) += 1;
                    where_local.entry(cur_pair).or_default().insert(i);
                }
                if let Some(p) = p {
                    p.inc(1);
                }
                (counts_local, where_local)
            })
            .reduce(
                || (HashMap::default(), HashMap::default()),
                |(mut counts_global, mut where_global), (counts_local, where_local)| {
                    for (k, v) in counts_local {
                        *counts_global.entry(k).or_insert(0) += v;
                    }
                    for (k, v) in where_local {
                        where_global.entry(k).or_insert_with(HashSet::default).extend(v);
                    }
                    (counts_global, where_global)
                },
            );

        let mut counter = Self {
            counts,
            where_to_update,
            queue: BinaryHeap::new(),
        };
        counter.rebuild_queue();
        counter
    }

    fn rebuild_queue(&mut self) {
        self.queue = self
            .counts
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&pair, &count)| Candidate { pair, count })
            .collect();
    }

    pub fn get(&self, pair: &Pair) -> i64 {
        self.counts.get(pair).copied().unwrap_or(0)
    }

    /// Number of distinct pairs with a positive count.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Pops the current best pair and its count. Ties on count go to the
    /// smallest `(left, right)`. Pairs rejected by `accept` are dropped
    /// until one of their counts changes again.
    pub fn pop_best(&mut self, mut accept: impl FnMut(Pair) -> bool) -> Option<(Pair, i64)> {
        while let Some(top) = self.queue.pop() {
            if self.get(&top.pair) != top.count {
                continue;
            }
            if !accept(top.pair) {
                continue;
            }
            return Some((top.pair, top.count));
        }
        None
    }

    /// Indices of sequences that may contain `pair`, in ascending order.
    pub fn sequences_with(&self, pair: &Pair) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .where_to_update
            .get(pair)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        indices.sort_unstable();
        indices
    }

    /// Applies the `(pair, delta)` changes reported by [`Sequence::merge`],
    /// each tagged with the index of the sequence it came from, and requeues
    /// every pair whose count moved.
    pub fn apply(&mut self, changes: impl IntoIterator<Item = ((Pair, i64), usize)>) {
        let mut net: HashMap<Pair, i64> = HashMap::default();
        for ((pair, delta), index) in changes {
            *net.entry(pair).or_insert(0) += delta;
            if delta > 0 {
                self.where_to_update.entry(pair).or_default().insert(index);
            }
        }

        let mut touched: Vec<(Pair, i64)> = net.into_iter().filter(|&(_, d)| d != 0).collect();
        touched.sort_unstable();
        for (pair, delta) in touched {
            let count = self.counts.entry(pair).or_insert(0);
            *count += delta;
            let count = *count;
            if count > 0 {
                self.queue.push(Candidate { pair, count });
            } else {
                self.counts.remove(&pair);
                self.where_to_update.remove(&pair);
            }
        }
    }
}
