//! The classical acceptor view.
//!
//! A [`ClassicalFsa`] is a [`MonoidalFsa`] whose labels are single symbols.
//! It adds the alphabet-driven subset determinization (which, unlike the
//! label-driven one in the core, produces a total automaton with one
//! transition row per state in alphabet order) and the constant-time
//! `successor` access the bimachine rewriters depend on.

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::{Label, Sym};
use crate::transition::{State, Transition, TransitionList};

use super::MonoidalFsa;

/// Errors raised while running a deterministic automaton over an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The input contained a byte outside the construction's alphabet.
    UnknownSymbol(u8),
    /// A successor was requested for a state outside the automaton. This
    /// indicates a broken construction and never escapes a well-formed one.
    StateOutOfRange,
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RewriteError::UnknownSymbol(c) => {
                write!(f, "rewriter: symbol `{}' (0x{:02x}) is not in the alphabet", *c as char, c)
            }
            RewriteError::StateOutOfRange => write!(f, "rewriter: state out of range"),
        }
    }
}

impl Error for RewriteError {}

/// A plain finite-state acceptor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClassicalFsa {
    pub(crate) fsa: MonoidalFsa<Sym>,
}

impl From<MonoidalFsa<Sym>> for ClassicalFsa {
    fn from(fsa: MonoidalFsa<Sym>) -> Self {
        ClassicalFsa { fsa }
    }
}

impl ClassicalFsa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.fsa.alphabet
    }

    pub fn states_cnt(&self) -> u32 {
        self.fsa.states_cnt
    }

    /// The acceptor of exactly the one-symbol words over `symbols`.
    pub fn from_symbol_set(symbols: &[u8]) -> Self {
        let mut fsa = MonoidalFsa::new();
        fsa.initial.insert(State(0));
        fsa.states_cnt = 1;
        for &c in symbols {
            fsa.alphabet_union_sym(c);
            let fin = State(fsa.states_cnt);
            fsa.transitions.push(State(0), Sym(c), fin);
            fsa.final_states.insert(fin);
            fsa.states_cnt += 1;
        }
        ClassicalFsa { fsa }
    }

    /// Classical subset determinization, retaining the subset interning map.
    ///
    /// The result is deterministic and total: every state has exactly one
    /// transition per alphabet symbol, in alphabet order, so `successor` can
    /// index the row directly. The returned mapping names each reached subset;
    /// the right-automaton construction reuses it to label aggregated states.
    pub(crate) fn determinize_with_map(
        &mut self,
        epsilon_free: bool,
    ) -> BTreeMap<BTreeSet<State>, State> {
        if !epsilon_free {
            self.fsa.remove_epsilon().trim();
        }
        self.fsa.transitions.sort_by_from(self.fsa.states_cnt as usize);
        let alphabet: Vec<u8> = self.fsa.alphabet.clone();

        let mut names: BTreeMap<BTreeSet<State>, State> = BTreeMap::new();
        let mut subsets: Vec<BTreeSet<State>> = Vec::new();
        let initial_subset: BTreeSet<State> = self.fsa.initial.iter().copied().collect();

        let mut new_final: BTreeSet<State> = BTreeSet::new();
        if self.fsa.contains_final(&initial_subset) {
            new_final.insert(State(0));
        }
        names.insert(initial_subset.clone(), State(0));
        subsets.push(initial_subset);

        let mut new_list = TransitionList::default();
        new_list.start.push(0);
        let mut next_id = 1u32;
        let mut step = 0usize;
        while step < subsets.len() {
            // Keyed by the symbols actually leaving this subset; absent keys
            // resolve to the empty subset, i.e. the dead state.
            let mut next_sets: BTreeMap<u8, BTreeSet<State>> = BTreeMap::new();
            for &st in &subsets[step] {
                for tr in self.fsa.transitions.from_state(st) {
                    next_sets.entry(tr.label.0).or_default().insert(tr.to);
                }
            }
            for &letter in &alphabet {
                let set = next_sets.remove(&letter).unwrap_or_default();
                let id = match names.get(&set) {
                    Some(&id) => id,
                    None => {
                        let id = State(next_id);
                        next_id += 1;
                        if self.fsa.contains_final(&set) {
                            new_final.insert(id);
                        }
                        names.insert(set.clone(), id);
                        subsets.push(set);
                        id
                    }
                };
                new_list
                    .buffer
                    .push(Transition::new(State(step as u32), Sym(letter), id));
            }
            new_list.start.push(new_list.buffer.len());
            step += 1;
        }
        new_list.sorted = true;

        self.fsa.states_cnt = next_id;
        self.fsa.transitions = new_list;
        self.fsa.initial.clear();
        self.fsa.initial.insert(State(0));
        self.fsa.final_states = new_final;
        names
    }

    /// Determinize, dropping the subset map.
    pub fn determinize(&mut self) -> &mut Self {
        self.determinize_with_map(false);
        self
    }

    /// Complement over the automaton's alphabet.
    pub fn complement(&mut self) -> &mut Self {
        self.determinize();
        let flipped: BTreeSet<State> = (0..self.fsa.states_cnt)
            .map(State)
            .filter(|st| !self.fsa.final_states.contains(st))
            .collect();
        self.fsa.final_states = flipped;
        self
    }

    /// Intersection by guarded product.
    pub fn intersect(&mut self, rhs: &mut ClassicalFsa) -> ClassicalFsa {
        self.determinize();
        rhs.determinize();
        let prod = self.fsa.product(
            &mut rhs.fsa,
            |a, _| *a,
            |a, b| a == b && !a.is_epsilon(),
        );
        ClassicalFsa { fsa: prod }
    }

    /// Colored pseudo-minimization over the full alphabet.
    ///
    /// Preserves totality and the alphabet-ordered rows, so `successor`
    /// remains valid on the merged automaton.
    pub(crate) fn colored_pseudo_minimize(&mut self, colors_cnt: usize, color_of: &mut Vec<State>) {
        let pseudo_alphabet: Vec<Sym> = self.fsa.alphabet.iter().map(|&c| Sym(c)).collect();
        self.fsa
            .colored_pseudo_minimize(colors_cnt, color_of, &pseudo_alphabet);
        self.fsa.transitions.sort_by_from(self.fsa.states_cnt as usize);
    }

    /// The unique initial state.
    ///
    /// Precondition: the automaton is deterministic.
    pub(crate) fn start(&self) -> Result<State, RewriteError> {
        self.fsa
            .initial
            .iter()
            .next()
            .copied()
            .ok_or(RewriteError::StateOutOfRange)
    }

    /// The unique `with`-successor of `from`.
    ///
    /// Precondition: deterministic, total, transitions sorted by source and
    /// then by symbol in alphabet order.
    pub fn successor(&self, from: State, with: u8) -> Result<State, RewriteError> {
        if from.index() + 1 >= self.fsa.transitions.start.len() {
            return Err(RewriteError::StateOutOfRange);
        }
        let letter_index = self
            .fsa
            .alphabet_order
            .get(&with)
            .ok_or(RewriteError::UnknownSymbol(with))?;
        self.fsa
            .transitions
            .from_state(from)
            .get(*letter_index as usize)
            .map(|tr| tr.to)
            .ok_or(RewriteError::StateOutOfRange)
    }

    /// The state path of `input`, starting at the initial state; the result
    /// has one entry more than the input.
    pub fn find_path<I>(&self, input: I) -> Result<Vec<State>, RewriteError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut curr = self.start()?;
        let input = input.into_iter();
        let mut path = Vec::with_capacity(input.size_hint().0 + 1);
        path.push(curr);
        for c in input {
            curr = self.successor(curr, c)?;
            path.push(curr);
        }
        Ok(path)
    }
}

impl fmt::Display for ClassicalFsa {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.fsa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;

    fn compile(pattern: &[u8], alphabet: &[u8]) -> ClassicalFsa {
        ClassicalFsa::from(compiler::compile::<Sym>(pattern, alphabet).unwrap())
    }

    fn run(dfa: &ClassicalFsa, input: &[u8]) -> bool {
        let path = dfa.find_path(input.iter().copied()).unwrap();
        dfa.fsa.final_states.contains(path.last().unwrap())
    }

    #[test]
    fn determinize_is_total_in_alphabet_order() {
        let mut dfa = compile(b"ab|a", b"ab");
        dfa.determinize();

        for st in 0..dfa.fsa.states_cnt {
            let row = dfa.fsa.transitions.from_state(State(st));
            assert_eq!(row.len(), 2);
            assert_eq!(row[0].label, Sym(b'a'));
            assert_eq!(row[1].label, Sym(b'b'));
        }
        assert!(run(&dfa, b"a"));
        assert!(run(&dfa, b"ab"));
        assert!(!run(&dfa, b"b"));
        assert!(!run(&dfa, b"aa"));
    }

    #[test]
    fn complement_flips_membership() {
        let mut dfa = compile(b"aa*", b"ab");
        dfa.complement();
        assert!(run(&dfa, b""));
        assert!(run(&dfa, b"b"));
        assert!(run(&dfa, b"ab"));
        assert!(!run(&dfa, b"a"));
        assert!(!run(&dfa, b"aaa"));
    }

    #[test]
    fn intersect_requires_both() {
        let mut lhs = compile(b"a*bb*c", b"abc");
        let mut rhs = compile(b"c*|aabbc*", b"abc");
        let mut both = lhs.intersect(&mut rhs);
        both.determinize();
        assert!(run(&both, b"aabbc"));
        assert!(!run(&both, b"abc"));
        assert!(!run(&both, b"c"));
    }

    #[test]
    fn successor_rejects_foreign_symbols() {
        let mut dfa = compile(b"a", b"ab");
        dfa.determinize();
        let start = dfa.start().unwrap();
        assert_eq!(dfa.successor(start, b'z'), Err(RewriteError::UnknownSymbol(b'z')));
        assert_eq!(
            dfa.successor(State(u32::MAX - 1), b'a'),
            Err(RewriteError::StateOutOfRange)
        );
    }

    #[test]
    fn from_symbol_set_accepts_single_letters() {
        let mut dfa = ClassicalFsa::from_symbol_set(b"ab");
        dfa.determinize();
        assert!(run(&dfa, b"a"));
        assert!(run(&dfa, b"b"));
        assert!(!run(&dfa, b""));
        assert!(!run(&dfa, b"ab"));
    }
}
