//! The transition store.
//!
//! Automata keep their transitions in one flat, append-only vector. A bucket
//! index over the source state gives constant-time access to the outgoing
//! transitions of a state, and is rebuilt by a counting sort whenever the
//! list has been perturbed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::Label;

/// An opaque state identifier, unique within one automaton.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct State(pub u32);

impl State {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A labeled transition between two states.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Transition<L> {
    pub from: State,
    pub label: L,
    pub to: State,
}

impl<L> Transition<L> {
    pub fn new(from: State, label: L, to: State) -> Self {
        Transition { from, label, to }
    }

    /// Swap source and target in place.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
    }
}

/// An indexed, sortable flat list of transitions.
///
/// `start` is valid only while `sorted` holds; any mutation that can change
/// the order of `buffer` clears the flag, and [`sort_by_from`](Self::sort_by_from)
/// rebuilds the index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionList<L> {
    pub buffer: Vec<Transition<L>>,
    pub start: Vec<usize>,
    pub sorted: bool,
}

impl<L> Default for TransitionList<L> {
    fn default() -> Self {
        TransitionList {
            buffer: Vec::new(),
            start: Vec::new(),
            sorted: false,
        }
    }
}

impl<L: Label> TransitionList<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition, invalidating the bucket index.
    pub fn push(&mut self, from: State, label: L, to: State) {
        self.sorted = false;
        self.buffer.push(Transition::new(from, label, to));
    }

    /// Stable counting sort of the buffer on an integer projection.
    ///
    /// Afterwards `start[v]` is the offset of the first entry with projected
    /// value `v`, and `start[max_value + 1]` the total count.
    pub fn counting_sort_by<F>(&mut self, max_value: usize, proj: F)
    where
        F: Fn(&Transition<L>) -> usize,
    {
        self.sorted = false;
        self.start.clear();
        self.start.resize(max_value + 2, 0);
        for tr in &self.buffer {
            self.start[proj(tr)] += 1;
        }
        for i in 1..self.start.len() {
            self.start[i] += self.start[i - 1];
        }
        let mut sorted = vec![Transition::new(State(0), L::epsilon(), State(0)); self.buffer.len()];
        for tr in self.buffer.drain(..).rev() {
            let slot = &mut self.start[proj(&tr)];
            *slot -= 1;
            sorted[*slot] = tr;
        }
        self.buffer = sorted;
    }

    /// Sort by source state and rebuild the bucket index.
    ///
    /// A no-op when the index is already valid.
    pub fn sort_by_from(&mut self, states_cnt: usize) {
        if !self.sorted {
            if states_cnt == 0 {
                self.start = vec![0];
            } else {
                self.counting_sort_by(states_cnt - 1, |tr| tr.from.index());
            }
        }
        self.sorted = true;
    }

    /// Sort by target state. The bucket index is left invalid.
    pub fn sort_by_to(&mut self, states_cnt: usize) {
        if states_cnt == 0 {
            return;
        }
        self.counting_sort_by(states_cnt - 1, |tr| tr.to.index());
    }

    /// Comparison sort by label. The bucket index is left invalid.
    pub fn sort_by_label(&mut self) {
        self.sorted = false;
        self.buffer.sort_by(|a, b| a.label.cmp(&b.label));
    }

    /// The outgoing transitions of `st`.
    ///
    /// Precondition: [`sort_by_from`](Self::sort_by_from) has been called and
    /// the list not mutated since, and `st` is in range.
    pub fn from_state(&self, st: State) -> &[Transition<L>] {
        debug_assert!(self.sorted, "transition slice requested on an unindexed list");
        &self.buffer[self.start[st.index()]..self.start[st.index() + 1]]
    }

    /// Swap source and target of every transition.
    pub fn reverse(&mut self) -> &mut Self {
        self.sorted = false;
        for tr in &mut self.buffer {
            tr.reverse();
        }
        self
    }

    /// Drop adjacent duplicates. Only meaningful right after a full sort.
    pub fn dedup(&mut self) {
        self.buffer.dedup();
        self.sorted = false;
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.start.clear();
        self.sorted = false;
    }
}

impl<L: fmt::Display> fmt::Display for TransitionList<L> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.buffer.len())?;
        for tr in &self.buffer {
            writeln!(f, "{} {} {}", tr.from, tr.label, tr.to)?;
        }
        writeln!(f, "{}", self.sorted as u8)?;
        if self.sorted {
            writeln!(f, "{}", self.start.len())?;
            for ind in &self.start {
                write!(f, "{} ", ind)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Sym;

    fn list(entries: &[(u32, u8, u32)]) -> TransitionList<Sym> {
        let mut l = TransitionList::new();
        for &(from, c, to) in entries {
            l.push(State(from), Sym(c), State(to));
        }
        l
    }

    #[test]
    fn bucket_index_gives_per_state_slices() {
        let mut l = list(&[(2, b'a', 0), (0, b'b', 1), (2, b'c', 2), (0, b'a', 2)]);
        l.sort_by_from(3);

        assert_eq!(l.from_state(State(0)).len(), 2);
        assert_eq!(l.from_state(State(1)).len(), 0);
        assert_eq!(l.from_state(State(2)).len(), 2);
    }

    #[test]
    fn counting_sort_is_stable() {
        let mut l = list(&[(1, b'x', 9), (0, b'a', 1), (1, b'y', 7), (0, b'b', 2)]);
        l.sort_by_from(2);

        let at_one: Vec<u8> = l.from_state(State(1)).iter().map(|tr| tr.label.0).collect();
        assert_eq!(at_one, vec![b'x', b'y']);
    }

    #[test]
    fn reverse_swaps_endpoints() {
        let mut l = list(&[(0, b'a', 1)]);
        l.reverse();
        assert_eq!(l.buffer[0].from, State(1));
        assert_eq!(l.buffer[0].to, State(0));
    }
}
