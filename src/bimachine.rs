//! Bimachines for contextual rewriting.
//!
//! Both constructions share the same two scanning automata. The left
//! automaton is the determinized union of every rule's left-context
//! acceptor, with each state remembering which rules' contexts end there.
//! The right automaton runs over the reversed input; its states pair a
//! classical subset with the ordered vector `g` of center states that are
//! still alive, which is where the leftmost-longest discipline lives: the
//! earlier an entry, the better the match it belongs to.
//!
//! [`two_step`] keeps the match state outside the scanning automata and
//! drives it through four lookup tables; [`final_output`] folds it into the
//! left automaton's states instead.

pub mod final_output;
pub mod two_step;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::fmt;

use crate::automata::classical::{ClassicalFsa, RewriteError};
use crate::automata::transducer::RealTimeTransducer;
use crate::automata::MonoidalFsa;
use crate::rule::{RuleError, RuleRepresentation};
use crate::symbol::{Sym, SymWord, Word};
use crate::transition::{State, TransitionList};

pub use self::final_output::FinalOutputBimachine;
pub use self::two_step::TwoStepBimachine;

/// Errors raised while assembling a bimachine from a rule batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    EmptyBatch,
    Rule(RuleError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::EmptyBatch => write!(f, "bimachine: empty rule batch"),
            BuildError::Rule(e) => write!(f, "bimachine: {}", e),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BuildError::Rule(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RuleError> for BuildError {
    fn from(e: RuleError) -> Self {
        BuildError::Rule(e)
    }
}

/// The rewriting interface both constructions implement.
pub trait Rewrite {
    /// Rewrite `input` in a single pass. Every input byte must belong to the
    /// construction's alphabet; the output is complete or the call fails
    /// without partial results.
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, RewriteError>;

    /// Convenience wrapper over text.
    fn apply_str(&self, input: &str) -> Result<String, RewriteError> {
        self.apply(input.as_bytes())
            .map(|out| String::from_utf8_lossy(&out).into_owned())
    }
}

/// Build the two-step bimachine of a compiled rule batch.
pub fn build_two_step(batch: Vec<RuleRepresentation>) -> Result<TwoStepBimachine, BuildError> {
    TwoStepBimachine::build(batch)
}

/// Build the final-output bimachine of a compiled rule batch.
pub fn build_with_final_output(
    batch: Vec<RuleRepresentation>,
) -> Result<FinalOutputBimachine, BuildError> {
    FinalOutputBimachine::build(batch)
}

/// Grouping of automaton states into behavioral classes.
pub(crate) struct ClassIndex {
    /// Class of each state.
    pub index_of_state: Vec<u32>,
    /// States of each class, in state order.
    pub states_of_index: Vec<Vec<State>>,
}

impl ClassIndex {
    fn group_by<K: Ord + Clone>(keys: impl Iterator<Item = K>) -> Self {
        let mut names: BTreeMap<K, u32> = BTreeMap::new();
        let mut index_of_state = Vec::new();
        let mut states_of_index: Vec<Vec<State>> = Vec::new();
        for (st, key) in keys.enumerate() {
            let next = names.len() as u32;
            let ind = *names.entry(key).or_insert(next);
            if ind as usize == states_of_index.len() {
                states_of_index.push(Vec::new());
            }
            index_of_state.push(ind);
            states_of_index[ind as usize].push(State(st as u32));
        }
        ClassIndex {
            index_of_state,
            states_of_index,
        }
    }

    pub fn classes_cnt(&self) -> usize {
        self.states_of_index.len()
    }

    pub fn representative(&self, index: u32) -> State {
        self.states_of_index[index as usize][0]
    }
}

/// Assign a color to every state from the behavioral profile of its class,
/// equal profiles sharing a color. Returns the number of colors.
pub(crate) fn find_colors<P: Ord>(
    color_of: &mut Vec<State>,
    profiles: &[P],
    index_of_state: &[u32],
) -> usize {
    color_of.clear();
    color_of.reserve(index_of_state.len());
    let mut names: BTreeMap<&P, u32> = BTreeMap::new();
    for &index in index_of_state {
        let next = names.len() as u32;
        let color = *names.entry(&profiles[index as usize]).or_insert(next);
        color_of.push(State(color));
    }
    names.len()
}

/// The determinized union of the rules' left-context acceptors.
pub(crate) struct LeftContextAutomaton {
    pub dfa: ClassicalFsa,
    /// Per state: the rules whose left context is satisfied on reaching it.
    pub contains_final_of: Vec<BTreeSet<u32>>,
}

impl LeftContextAutomaton {
    pub fn build(batch: &[RuleRepresentation]) -> Self {
        // The union renumbers each rule's automaton by a fixed offset, which
        // keeps the one sentinel final per rule recognizable by id.
        let mut final_rule_of: HashMap<State, u32> = HashMap::new();
        let mut offset = 0u32;
        for (i, rep) in batch.iter().enumerate() {
            let fin = rep
                .left
                .fsa
                .final_states
                .iter()
                .next()
                .expect("right-simple acceptors have exactly one final state");
            final_rule_of.insert(State(offset + fin.0), i as u32);
            offset += rep.left.fsa.states_cnt;
        }

        let mut union: MonoidalFsa<Sym> = MonoidalFsa::new();
        for rep in batch {
            union = union.union(rep.left.fsa.clone());
        }
        let mut dfa = ClassicalFsa::from(union);
        let subsets = dfa.determinize_with_map(true);

        let mut contains_final_of = vec![BTreeSet::new(); dfa.states_cnt() as usize];
        for (subset, name) in subsets {
            if dfa.fsa.final_states.contains(&name) {
                for st in subset {
                    if let Some(&rule) = final_rule_of.get(&st) {
                        contains_final_of[name.index()].insert(rule);
                    }
                }
            }
        }
        dfa.fsa.final_states.clear();

        LeftContextAutomaton {
            dfa,
            contains_final_of,
        }
    }

    /// Group states whose satisfied-rule sets coincide.
    pub fn init_index(&self) -> ClassIndex {
        ClassIndex::group_by(self.contains_final_of.iter().cloned())
    }
}

/// A state of the right automaton.
///
/// `g` lists the center states that are alive at this position, best match
/// first; its tail starting at `finals_in_g_begin` holds the center finals
/// injected for rules whose right context is satisfied here, sorted by rule.
/// `g_st` is the subsequence of center initials and `g_inv` the position of
/// each entry in `g`.
#[derive(Clone, Debug, Default)]
pub(crate) struct RightState {
    pub r_subset: BTreeSet<State>,
    pub g: Vec<State>,
    pub g_st: Vec<State>,
    pub g_inv: BTreeMap<State, usize>,
    pub finals_in_g_begin: usize,
}

/// The right scanning automaton plus the union of all rules' real-time
/// centers and the id bookkeeping that ties the two together.
pub(crate) struct RightAutomaton {
    pub fsa: ClassicalFsa,
    pub states: Vec<RightState>,
    /// The union of the centers, forward direction, rows in canonical
    /// `(input, target, output)` order.
    pub center: RealTimeTransducer,
    /// Center final state of each rule in the union.
    pub final_center_of_rule: Vec<State>,
    /// Rule of each center initial state.
    pub init_center_rule: HashMap<State, u32>,
    /// Rule of each center final state.
    pub final_center_rule: HashMap<State, u32>,
}

impl RightAutomaton {
    pub fn build(batch: &[RuleRepresentation]) -> Self {
        // Union of the reversed right-context acceptors; the reversal turns
        // each left-simple initial sentinel into the unique final whose
        // appearance during the backward scan means "right context satisfied
        // here".
        let mut final_right_rule: HashMap<State, u32> = HashMap::new();
        let mut right_union: MonoidalFsa<Sym> = MonoidalFsa::new();
        let mut offset = 0u32;
        for (i, rep) in batch.iter().enumerate() {
            let mut rev = rep.right.fsa.clone();
            rev.reverse();
            let fin = rev
                .final_states
                .iter()
                .next()
                .expect("left-simple acceptors have exactly one initial state");
            final_right_rule.insert(State(offset + fin.0), i as u32);
            offset += rev.states_cnt;
            right_union = right_union.union(rev);
        }

        // Union of the centers, ids recorded in the forward orientation.
        let mut final_center_of_rule = Vec::with_capacity(batch.len());
        let mut init_center_rule = HashMap::new();
        let mut final_center_rule = HashMap::new();
        let mut center_union: MonoidalFsa<SymWord> = MonoidalFsa::new();
        let mut offset = 0u32;
        for (i, rep) in batch.iter().enumerate() {
            let fin = rep
                .center_rt
                .fsa
                .final_states
                .iter()
                .next()
                .expect("simple centers have exactly one final state");
            let init = rep
                .center_rt
                .fsa
                .initial
                .iter()
                .next()
                .expect("simple centers have exactly one initial state");
            final_center_of_rule.push(State(offset + fin.0));
            init_center_rule.insert(State(offset + init.0), i as u32);
            final_center_rule.insert(State(offset + fin.0), i as u32);
            offset += rep.center_rt.fsa.states_cnt;
            center_union = center_union.union(rep.center_rt.fsa.clone());
        }

        let n_center = center_union.states_cnt as usize;
        let mut center_rev = center_union.transitions.clone();
        center_rev.reverse();
        center_rev.sort_by_to(n_center);
        center_rev.sort_by_from(n_center);

        let n_right = right_union.states_cnt as usize;
        right_union.transitions.sort_by_from(n_right);

        // Explore the product of the subset scan with the live-center
        // propagation.
        let alphabet: Vec<u8> = right_union.alphabet.clone();
        let mut states: Vec<RightState> = Vec::new();
        let mut names: BTreeMap<(BTreeSet<State>, Vec<State>), State> = BTreeMap::new();

        let initial = Self::initial_state(&right_union, &final_right_rule, &final_center_of_rule);
        names.insert((initial.r_subset.clone(), initial.g.clone()), State(0));
        states.push(initial);

        let mut list = TransitionList::default();
        list.start.push(0);
        let mut step = 0usize;
        while step < states.len() {
            let mut next_states: BTreeMap<u8, RightState> = BTreeMap::new();

            let g: Vec<State> = states[step].g.clone();
            for &st in &g {
                for tr in center_rev.from_state(st) {
                    Self::add_successor_g(
                        next_states.entry(tr.label.input.0).or_default(),
                        tr.to,
                        &init_center_rule,
                    );
                }
            }
            let r_subset: Vec<State> = states[step].r_subset.iter().copied().collect();
            for &st in &r_subset {
                for tr in right_union.transitions.from_state(st) {
                    Self::add_successor_r(
                        next_states.entry(tr.label.0).or_default(),
                        tr.to,
                        &final_right_rule,
                        &final_center_of_rule,
                    );
                }
            }

            for &letter in &alphabet {
                let mut next = next_states.remove(&letter).unwrap_or_default();
                Self::fix_final_g(&mut next);
                let key = (next.r_subset.clone(), next.g.clone());
                let id = match names.get(&key) {
                    Some(&id) => id,
                    None => {
                        let id = State(states.len() as u32);
                        names.insert(key, id);
                        states.push(next);
                        id
                    }
                };
                list.buffer
                    .push(crate::transition::Transition::new(State(step as u32), Sym(letter), id));
            }
            list.start.push(list.buffer.len());
            step += 1;
        }
        list.sorted = true;

        let mut fsa: MonoidalFsa<Sym> = MonoidalFsa::new();
        fsa.states_cnt = states.len() as u32;
        fsa.transitions = list;
        fsa.initial.insert(State(0));
        fsa.alphabet = right_union.alphabet;
        fsa.alphabet_order = right_union.alphabet_order;

        // The forward center with rows in canonical order: by input symbol,
        // then target, then output. Both constructions resolve ties by
        // scanning rows in this one order.
        let mut center = center_union;
        center
            .transitions
            .buffer
            .sort_by(|a, b| {
                (a.from, a.label.input.0, a.to, &a.label.output).cmp(&(
                    b.from,
                    b.label.input.0,
                    b.to,
                    &b.label.output,
                ))
            });
        center.transitions.sorted = false;
        center.transitions.sort_by_from(n_center);

        RightAutomaton {
            fsa: ClassicalFsa::from(fsa),
            states,
            center: RealTimeTransducer::from(center),
            final_center_of_rule,
            init_center_rule,
            final_center_rule,
        }
    }

    fn initial_state(
        right_union: &MonoidalFsa<Sym>,
        final_right_rule: &HashMap<State, u32>,
        final_center_of_rule: &[State],
    ) -> RightState {
        let mut init = RightState::default();
        for &st in &right_union.initial {
            init.r_subset.insert(st);
            if let Some(&rule) = final_right_rule.get(&st) {
                init.g.push(final_center_of_rule[rule as usize]);
            }
        }
        init.g.sort();
        for (i, &st) in init.g.iter().enumerate() {
            init.g_inv.insert(st, i);
        }
        init
    }

    /// Extend the propagation segment of `next.g`.
    fn add_successor_g(next: &mut RightState, to_add: State, init_center_rule: &HashMap<State, u32>) {
        if let std::collections::btree_map::Entry::Vacant(entry) = next.g_inv.entry(to_add) {
            entry.insert(next.g.len());
            next.g.push(to_add);
            next.finals_in_g_begin = next.g.len();
            if init_center_rule.contains_key(&to_add) {
                next.g_st.push(to_add);
            }
        }
    }

    /// Extend the subset, injecting a center final when a right context
    /// becomes satisfied.
    fn add_successor_r(
        next: &mut RightState,
        to_add: State,
        final_right_rule: &HashMap<State, u32>,
        final_center_of_rule: &[State],
    ) {
        if next.r_subset.insert(to_add) {
            if let Some(&rule) = final_right_rule.get(&to_add) {
                next.g.push(final_center_of_rule[rule as usize]);
            }
        }
    }

    /// Sort the injected finals by rule and complete the inverse map.
    fn fix_final_g(next: &mut RightState) {
        next.g[next.finals_in_g_begin..].sort();
        for i in next.finals_in_g_begin..next.g.len() {
            next.g_inv.entry(next.g[i]).or_insert(i);
        }
    }

    /// Group states with equal `g`; the subset component is redundant for
    /// the output functions.
    pub fn init_index(&self) -> ClassIndex {
        ClassIndex::group_by(self.states.iter().map(|st| st.g.clone()))
    }

    pub fn successor_id(&self, from: State, with: u8) -> Result<State, RewriteError> {
        self.fsa.successor(from, with)
    }

    /// For every alphabet symbol `a`: the continuation `q —(a,w)→ q'` with
    /// the best (smallest) position of `q'` in `right_state.g`, if any.
    ///
    /// Precondition: the center rows are in canonical order.
    pub fn min_continuations(
        &self,
        q: State,
        right_state: &RightState,
    ) -> Vec<Option<(usize, Word)>> {
        let mut best: Vec<Option<(usize, Word)>> =
            vec![None; self.center.fsa.alphabet.len().max(self.fsa.fsa.alphabet.len())];
        for tr in self.center.fsa.transitions.from_state(q) {
            let letter_ind = self.fsa.fsa.alphabet_order[&tr.label.input.0] as usize;
            if let Some(&ind) = right_state.g_inv.get(&tr.to) {
                let better = match &best[letter_ind] {
                    Some((mu, _)) => ind < *mu,
                    None => true,
                };
                if better {
                    best[letter_ind] = Some((ind, tr.label.output.clone()));
                }
            }
        }
        best
    }

    /// The continuation of `q` on `letter` with the best position in
    /// `right_state.g`, together with its output.
    pub fn min_continuation_on(
        &self,
        q: State,
        letter: u8,
        right_state: &RightState,
    ) -> Option<(State, Word)> {
        let row = self.center.fsa.transitions.from_state(q);
        let lo = row.partition_point(|tr| tr.label.input.0 < letter);
        let hi = row.partition_point(|tr| tr.label.input.0 <= letter);
        let mut best: Option<(usize, Word)> = None;
        for tr in &row[lo..hi] {
            if let Some(&ind) = right_state.g_inv.get(&tr.to) {
                let better = match &best {
                    Some((mu, _)) => ind < *mu,
                    None => true,
                };
                if better {
                    best = Some((ind, tr.label.output.clone()));
                }
            }
        }
        best.map(|(mu, word)| (right_state.g[mu], word))
    }

    /// The first still-alive center initial whose rule's left context is
    /// satisfied: where a new match starts, honoring rule priority.
    pub fn first_startable_center(
        &self,
        rules_left_ctx_ok: &BTreeSet<u32>,
        right_state: &RightState,
    ) -> Option<State> {
        right_state.g_st.iter().copied().find(|init| {
            let rule = self.init_center_rule[init];
            rules_left_ctx_ok.contains(&rule)
        })
    }

    /// The least rule with an epsilon output whose contexts are satisfied
    /// here; the injected finals are sorted by rule, so the first hit wins.
    pub fn min_epsilon_rule(
        &self,
        batch: &[RuleRepresentation],
        rules_left_ctx_ok: &BTreeSet<u32>,
        right_state: &RightState,
    ) -> Option<u32> {
        right_state.g[right_state.finals_in_g_begin..]
            .iter()
            .map(|fin| self.final_center_rule[fin])
            .find(|&rule| {
                batch[rule as usize].output_for_epsilon.is_some()
                    && rules_left_ctx_ok.contains(&rule)
            })
    }
}
