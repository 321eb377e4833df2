//! Multi-key lookup tables.
//!
//! The bimachine output functions are finite partial maps keyed by small
//! tuples whose first component is a dense state id. While a machine is
//! being built they live in hash maps, which tolerate the re-keying passes;
//! a finished machine freezes them into flat entry vectors sorted
//! lexicographically, with a bucket index over the first key and binary
//! search within a bucket. Omitted keys mean identity or empty output,
//! which keeps the frozen tables compact.

use serde::{Deserialize, Serialize};

use crate::transition::State;

/// A read-only partial function from `(State, K)` to `R`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortedTable<K, R> {
    entries: Vec<(State, K, R)>,
    start: Vec<usize>,
}

impl<K: Ord, R> SortedTable<K, R> {
    /// Freeze a list of entries into a table.
    ///
    /// `first_bound` is one past the largest admissible first key. With
    /// `coalesce`, duplicate full keys keep their first entry; without it
    /// the caller guarantees the keys are unique.
    pub fn freeze(mut entries: Vec<(State, K, R)>, first_bound: usize, coalesce: bool) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        if coalesce {
            entries.dedup_by(|next, kept| next.0 == kept.0 && next.1 == kept.1);
        } else {
            debug_assert!(
                entries.windows(2).all(|w| (w[0].0, &w[0].1) != (w[1].0, &w[1].1)),
                "duplicate keys in a table frozen without coalescing"
            );
        }

        let mut start = Vec::with_capacity(first_bound + 1);
        start.push(0);
        let mut ind = 0;
        for first in 0..first_bound {
            while ind < entries.len() && entries[ind].0.index() == first {
                ind += 1;
            }
            start.push(ind);
        }
        SortedTable { entries, start }
    }

    pub fn get(&self, first: State, rest: &K) -> Option<&R> {
        if first.index() + 1 >= self.start.len() {
            return None;
        }
        let bucket = &self.entries[self.start[first.index()]..self.start[first.index() + 1]];
        bucket
            .binary_search_by(|entry| entry.1.cmp(rest))
            .ok()
            .map(|i| &bucket[i].2)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(State, K, R)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_by_both_keys() {
        let table = SortedTable::freeze(
            vec![
                (State(1), (b'a', State(0)), 10),
                (State(0), (b'b', State(2)), 20),
                (State(1), (b'b', State(1)), 30),
            ],
            3,
            false,
        );
        assert_eq!(table.get(State(1), &(b'a', State(0))), Some(&10));
        assert_eq!(table.get(State(0), &(b'b', State(2))), Some(&20));
        assert_eq!(table.get(State(1), &(b'b', State(1))), Some(&30));
        assert_eq!(table.get(State(1), &(b'b', State(0))), None);
        assert_eq!(table.get(State(2), &(b'a', State(0))), None);
    }

    #[test]
    fn out_of_range_first_key_is_undefined() {
        let table: SortedTable<State, u32> = SortedTable::freeze(vec![], 2, false);
        assert_eq!(table.get(State(7), &State(0)), None);
    }

    #[test]
    fn coalescing_keeps_the_first_entry() {
        let table = SortedTable::freeze(
            vec![(State(0), 1u8, "first"), (State(0), 1u8, "second")],
            1,
            true,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(State(0), &1u8), Some(&"first"));
    }
}
