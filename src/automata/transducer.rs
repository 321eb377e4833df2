//! Transducer views over the automaton core.
//!
//! [`Transducer`] carries word-pair labels straight out of the regex
//! compiler; [`LetterTransducer`] is its expansion into symbol-pair steps;
//! [`RealTimeTransducer`] is the input-epsilon-free form whose labels pair
//! one input symbol with an output word. The bimachine constructions consume
//! only the real-time form.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::{Label, Sym, SymPair, SymWord, Word, WordPair};
use crate::transition::{State, Transition, TransitionList};

use super::classical::ClassicalFsa;
use super::MonoidalFsa;

impl Label for Word {
    fn epsilon() -> Self {
        Word::new()
    }
}

/// Errors raised while converting between transducer forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransducerError {
    /// The relation pairs some input with infinitely many outputs: the
    /// input-epsilon closure contains a cycle with nonempty output.
    InfinitelyAmbiguous,
}

impl fmt::Display for TransducerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransducerError::InfinitelyAmbiguous => {
                write!(f, "transducer: infinitely ambiguous (nonempty cycle on input epsilon)")
            }
        }
    }
}

impl Error for TransducerError {}

/// A transducer with word-pair labels.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transducer {
    pub(crate) fsa: MonoidalFsa<WordPair>,
}

impl From<MonoidalFsa<WordPair>> for Transducer {
    fn from(fsa: MonoidalFsa<WordPair>) -> Self {
        Transducer { fsa }
    }
}

impl Transducer {
    /// Expand every word-pair transition into a chain of symbol-pair steps,
    /// allocating fresh intermediate states.
    pub fn expand(self) -> LetterTransducer {
        let mut out = MonoidalFsa::<SymPair>::new();
        out.states_cnt = self.fsa.states_cnt;
        out.initial = self.fsa.initial;
        out.final_states = self.fsa.final_states;
        out.alphabet = self.fsa.alphabet;
        out.alphabet_order = self.fsa.alphabet_order;
        out.transitions.buffer.reserve(self.fsa.transitions.buffer.len());
        for tr in &self.fsa.transitions.buffer {
            let len = tr.label.expanded_len();
            debug_assert!(len > 0, "base elements always have a nonempty input side");
            let mut last = tr.from;
            for i in 0..len.saturating_sub(1) {
                let mid = State(out.states_cnt);
                out.states_cnt += 1;
                out.transitions.buffer.push(Transition::new(last, tr.label.pair_at(i), mid));
                last = mid;
            }
            out.transitions
                .buffer
                .push(Transition::new(last, tr.label.pair_at(len - 1), tr.to));
        }
        LetterTransducer { fsa: out }
    }
}

/// A transducer whose every transition is labelled by a pair of symbols.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LetterTransducer {
    pub(crate) fsa: MonoidalFsa<SymPair>,
}

impl From<MonoidalFsa<SymPair>> for LetterTransducer {
    fn from(fsa: MonoidalFsa<SymPair>) -> Self {
        LetterTransducer { fsa }
    }
}

impl LetterTransducer {
    /// The identity transducer of an acceptor.
    pub fn identity(fsa: ClassicalFsa) -> Self {
        let src = fsa.fsa;
        let mut out = MonoidalFsa::<SymPair>::new();
        out.states_cnt = src.states_cnt;
        out.initial = src.initial;
        out.final_states = src.final_states;
        out.alphabet = src.alphabet;
        out.alphabet_order = src.alphabet_order;
        if src.transitions.sorted {
            out.transitions.sorted = true;
            out.transitions.start = src.transitions.start;
        }
        for tr in &src.transitions.buffer {
            out.transitions
                .buffer
                .push(Transition::new(tr.from, SymPair::new(tr.label, tr.label), tr.to));
        }
        LetterTransducer { fsa: out }
    }

    /// Relational composition: the output tape of `self` is matched against
    /// the input tape of `rhs`.
    pub fn compose(&mut self, rhs: &mut LetterTransducer) -> LetterTransducer {
        let prod = self.fsa.product(
            &mut rhs.fsa,
            |a: &SymPair, b: &SymPair| SymPair::new(a.input, b.output),
            |a, b| a.output == b.input,
        );
        LetterTransducer { fsa: prod }
    }

    /// First-coordinate projection.
    pub fn domain(self) -> ClassicalFsa {
        project(self.fsa, |lbl| lbl.input)
    }

    /// Second-coordinate projection.
    pub fn range(self) -> ClassicalFsa {
        project(self.fsa, |lbl| lbl.output)
    }

    /// Whether the empty word is in the domain of the relation.
    pub fn epsilon_in_dom(&mut self) -> bool {
        self.fsa.transitions.sort_by_from(self.fsa.states_cnt as usize);
        let mut reachable = false;
        let finals = self.fsa.final_states.clone();
        for &init in &self.fsa.initial {
            if reachable {
                break;
            }
            self.fsa.bfs(
                init,
                |st| {
                    if finals.contains(&st) {
                        reachable = true;
                    }
                },
                |tr| tr.label.input == Sym::EPSILON,
            );
        }
        reachable
    }

    pub fn pseudo_minimize(&mut self) -> &mut Self {
        self.fsa.pseudo_minimize();
        self
    }

    /// The input-epsilon closure as a word-labelled transition list: an entry
    /// `(p, w, q)` means `q` is reachable from `p` over input-epsilon
    /// transitions whose concatenated outputs spell `w`.
    ///
    /// A closure entry looping on its own state with nonempty output would
    /// make some input pair with infinitely many outputs and is reported as
    /// an error. Two-sided epsilon transitions must have been removed
    /// beforehand; [`real_time`](Self::real_time) takes care of that, which
    /// also bounds this worklist: every cycle grows its word and therefore
    /// closes into a detected self-loop.
    fn epsilon_closure_tape1(&mut self) -> Result<TransitionList<Word>, TransducerError> {
        let n = self.fsa.states_cnt as usize;
        let mut eps_tape1: TransitionList<Sym> = TransitionList::default();
        let mut closure: TransitionList<Word> = TransitionList::default();
        for tr in &self.fsa.transitions.buffer {
            if tr.label.input == Sym::EPSILON {
                eps_tape1.push(tr.from, tr.label.output, tr.to);
                let word = if tr.label.output == Sym::EPSILON {
                    Word::new()
                } else {
                    vec![tr.label.output.0]
                };
                closure.push(tr.from, word, tr.to);
            }
        }
        eps_tape1.sort_by_from(n);

        let mut i = 0;
        while i < closure.buffer.len() {
            let curr = closure.buffer[i].clone();
            if curr.from == curr.to && !curr.label.is_empty() {
                return Err(TransducerError::InfinitelyAmbiguous);
            }
            for tr in eps_tape1.from_state(curr.to) {
                let mut word = curr.label.clone();
                if tr.label != Sym::EPSILON {
                    word.push(tr.label.0);
                }
                closure.buffer.push(Transition::new(curr.from, word, tr.to));
            }
            i += 1;
        }
        for st in 0..n {
            closure.push(State(st as u32), Word::new(), State(st as u32));
        }
        Ok(closure)
    }

    /// Convert to real-time form, folding input-epsilon outputs into the
    /// surrounding transitions.
    ///
    /// Also returns the set of outputs the relation produces on the empty
    /// input word.
    pub fn real_time(mut self) -> Result<(RealTimeTransducer, BTreeSet<Word>), TransducerError> {
        // Dropping two-sided epsilon transitions first keeps the closure
        // worklist finite; the relation is unchanged.
        self.fsa.remove_epsilon();
        let n = self.fsa.states_cnt as usize;

        let mut closure = self.epsilon_closure_tape1()?;
        let mut reversed = closure.clone();
        closure.sort_by_from(n);
        reversed.reverse();
        reversed.sort_by_from(n);

        let mut rt = MonoidalFsa::<SymWord>::new();
        rt.states_cnt = self.fsa.states_cnt;

        // Finals and outputs for the empty input.
        let mut outputs_for_epsilon = BTreeSet::new();
        rt.final_states = self.fsa.final_states.clone();
        for &st in &self.fsa.initial {
            for tr in closure.from_state(st) {
                if self.fsa.final_states.contains(&tr.to) {
                    outputs_for_epsilon.insert(tr.label.clone());
                    rt.final_states.insert(st);
                }
            }
        }

        // Every non-epsilon-input transition absorbs the epsilon paths that
        // can precede and follow it.
        for tr in &self.fsa.transitions.buffer {
            if tr.label.input == Sym::EPSILON {
                continue;
            }
            for tr_prev in reversed.from_state(tr.from) {
                for tr_next in closure.from_state(tr.to) {
                    let mut word =
                        Word::with_capacity(tr_prev.label.len() + 1 + tr_next.label.len());
                    word.extend_from_slice(&tr_prev.label);
                    word.push(tr.label.output.0);
                    word.extend_from_slice(&tr_next.label);
                    rt.transitions.push(
                        tr_prev.to,
                        SymWord::new(tr.label.input, word),
                        tr_next.to,
                    );
                }
            }
        }

        rt.initial = self.fsa.initial;
        rt.alphabet = self.fsa.alphabet;
        rt.alphabet_order = self.fsa.alphabet_order;
        Ok((RealTimeTransducer { fsa: rt }, outputs_for_epsilon))
    }
}

/// A transducer in real-time form: input-epsilon-free, one output word per
/// transition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RealTimeTransducer {
    pub(crate) fsa: MonoidalFsa<SymWord>,
}

impl From<MonoidalFsa<SymWord>> for RealTimeTransducer {
    fn from(fsa: MonoidalFsa<SymWord>) -> Self {
        RealTimeTransducer { fsa }
    }
}

impl RealTimeTransducer {
    pub fn pseudo_minimize(&mut self) -> &mut Self {
        self.fsa.pseudo_minimize();
        self
    }

    pub fn to_simple(&mut self) -> &mut Self {
        self.fsa.to_simple();
        self
    }

    /// First-coordinate projection.
    pub fn domain(self) -> ClassicalFsa {
        project(self.fsa, |lbl| lbl.input)
    }
}

/// Coordinate projection: relabel in place, keeping shape and alphabet.
fn project<L, F>(src: MonoidalFsa<L>, proj: F) -> ClassicalFsa
where
    L: Label,
    F: Fn(&L) -> Sym,
{
    let mut out = MonoidalFsa::<Sym>::new();
    out.states_cnt = src.states_cnt;
    out.initial = src.initial;
    out.final_states = src.final_states;
    out.alphabet = src.alphabet;
    out.alphabet_order = src.alphabet_order;
    out.transitions.sorted = src.transitions.sorted;
    out.transitions.start = src.transitions.start;
    for tr in &src.transitions.buffer {
        out.transitions
            .buffer
            .push(Transition::new(tr.from, proj(&tr.label), tr.to));
    }
    ClassicalFsa::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;

    fn transducer(pattern: &[u8], alphabet: &[u8]) -> Transducer {
        Transducer::from(compiler::compile::<WordPair>(pattern, alphabet).unwrap())
    }

    /// All outputs the real-time transducer produces for `input`.
    fn outputs(rt: &mut RealTimeTransducer, input: &[u8]) -> BTreeSet<Word> {
        let n = rt.fsa.states_cnt as usize;
        rt.fsa.transitions.sort_by_from(n);
        let mut frontier: Vec<(State, Word)> = rt
            .fsa
            .initial
            .iter()
            .map(|&st| (st, Word::new()))
            .collect();
        for &c in input {
            let mut next = Vec::new();
            for (st, word) in frontier {
                for tr in rt.fsa.transitions.from_state(st) {
                    if tr.label.input == Sym(c) {
                        let mut w = word.clone();
                        w.extend_from_slice(&tr.label.output);
                        next.push((tr.to, w));
                    }
                }
            }
            frontier = next;
        }
        frontier
            .into_iter()
            .filter(|(st, _)| rt.fsa.final_states.contains(st))
            .map(|(_, w)| w)
            .collect()
    }

    #[test]
    fn expand_chains_symbol_pairs() {
        let lt = transducer(b"[ab,x]", b"ab").expand();
        // Two steps: (a,x) then (b,_).
        assert_eq!(lt.fsa.transitions.buffer.len(), 2);
        assert_eq!(lt.fsa.states_cnt, 3);
        let labels: BTreeSet<SymPair> =
            lt.fsa.transitions.buffer.iter().map(|tr| tr.label).collect();
        assert!(labels.contains(&SymPair::new(Sym(b'a'), Sym(b'x'))));
        assert!(labels.contains(&SymPair::new(Sym(b'b'), Sym::EPSILON)));
    }

    #[test]
    fn real_time_folds_epsilon_output() {
        // [a,_][_,x]: the trailing insertion folds into the letter step.
        let mut lt = transducer(b"[a,_][_,x]", b"a").expand();
        lt.pseudo_minimize();
        let (mut rt, eps) = lt.clone().real_time().unwrap();
        assert!(eps.is_empty());
        assert_eq!(outputs(&mut rt, b"a"), BTreeSet::from([b"x".to_vec()]));
        assert!(outputs(&mut rt, b"").is_empty());
    }

    #[test]
    fn real_time_collects_epsilon_outputs() {
        let mut lt = transducer(b"[_,y]", b"a").expand();
        lt.pseudo_minimize();
        let (_, eps) = lt.real_time().unwrap();
        assert_eq!(eps, BTreeSet::from([b"y".to_vec()]));
    }

    #[test]
    fn real_time_rejects_insertion_loops() {
        let mut lt = transducer(b"[a,_][_,x]*", b"a").expand();
        lt.pseudo_minimize();
        assert_eq!(lt.real_time().unwrap_err(), TransducerError::InfinitelyAmbiguous);
    }

    #[test]
    fn real_time_rejects_multi_state_insertion_cycles() {
        // The insertion cycle spans two distinct states; no single edge loops
        // on its own state, yet the closure must still flag it.
        let mut lt = transducer(b"[a,x]([_,y][_,z])*", b"a").expand();
        lt.pseudo_minimize();
        assert_eq!(lt.real_time().unwrap_err(), TransducerError::InfinitelyAmbiguous);
    }

    #[test]
    fn two_sided_epsilon_loops_are_harmless() {
        // [_,_]* relates epsilon to epsilon only.
        let mut lt = transducer(b"[_,_]*", b"a").expand();
        lt.pseudo_minimize();
        let (_, eps) = lt.real_time().unwrap();
        assert_eq!(eps, BTreeSet::from([Word::new()]));
    }

    #[test]
    fn projections_keep_the_shape() {
        let lt = transducer(b"[ab,x]|[b,yy]", b"ab").expand();
        let mut dom = lt.clone().domain();
        dom.determinize();
        let accepts = |dfa: &ClassicalFsa, input: &[u8]| {
            let path = dfa.find_path(input.iter().copied()).unwrap();
            dfa.fsa.final_states.contains(path.last().unwrap())
        };
        assert!(accepts(&dom, b"ab"));
        assert!(accepts(&dom, b"b"));
        assert!(!accepts(&dom, b"a"));
    }

    #[test]
    fn epsilon_in_dom_detects_epsilon_input() {
        let mut with = transducer(b"[_,y]|[a,x]", b"a").expand();
        assert!(with.epsilon_in_dom());
        let mut without = transducer(b"[a,x]", b"a").expand();
        assert!(!without.epsilon_in_dom());
    }

    #[test]
    fn identity_composes_neutrally() {
        let letters = ClassicalFsa::from_symbol_set(b"ab");
        let mut id = LetterTransducer::identity(letters);
        let mut t = transducer(b"[a,x]|[b,y]", b"ab").expand();
        let composed = id.compose(&mut t);
        let (mut rt, _) = composed.real_time().unwrap();
        assert_eq!(outputs(&mut rt, b"a"), BTreeSet::from([b"x".to_vec()]));
        assert_eq!(outputs(&mut rt, b"b"), BTreeSet::from([b"y".to_vec()]));
    }

    #[test]
    fn real_time_domain_is_the_input_side() {
        let mut lt = transducer(b"[ab,x]", b"ab").expand();
        lt.pseudo_minimize();
        let (rt, _) = lt.real_time().unwrap();
        let mut dom = rt.domain();
        dom.determinize();
        let path = dom.find_path(b"ab".iter().copied()).unwrap();
        assert!(dom.fsa.final_states.contains(path.last().unwrap()));
    }

    #[test]
    fn compose_matches_middle_tape() {
        let mut first = transducer(b"[a,b]", b"ab").expand();
        let mut second = transducer(b"[b,c]", b"abc").expand();
        let mut composed = first.compose(&mut second);
        composed.fsa.remove_epsilon();
        let (mut rt, _) = composed.real_time().unwrap();
        assert_eq!(outputs(&mut rt, b"a"), BTreeSet::from([b"c".to_vec()]));
    }
}
