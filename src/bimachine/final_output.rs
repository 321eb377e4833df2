//! The bimachine with final output.
//!
//! Here the left automaton carries the full dispatch information: its states
//! pair a left-context state with a partial function `phi` from right-state
//! class to center state, one entry per ongoing match. Stepping on a symbol
//! decides, per right class, between four disjoint phases (outside any
//! match, match beginning, match continuing, match just finished) and emits
//! the step's output through a single table `psi`; a trailing `iota` output
//! covers epsilon matches at the very end of the input.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::automata::classical::{ClassicalFsa, RewriteError};
use crate::automata::MonoidalFsa;
use crate::rule::RuleRepresentation;
use crate::symbol::{Sym, Word};
use crate::table::SortedTable;
use crate::transition::{State, Transition, TransitionList};

use super::{
    find_colors, BuildError, ClassIndex, LeftContextAutomaton, Rewrite, RightAutomaton,
    RightState,
};

/// A left state under construction: the left-context state plus the map from
/// right class to the center state of the match alive there.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct LeftState {
    lctx: State,
    phi: BTreeMap<u32, State>,
}

/// A compiled final-output bimachine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalOutputBimachine {
    left: ClassicalFsa,
    right: ClassicalFsa,
    /// `(ℓ, a, r) ↦ w`: the step output, when not the identity.
    psi: SortedTable<(u8, State), Word>,
    /// `ℓ ↦ w`: the trailing epsilon output at end of input.
    iota: SortedTable<(), Word>,
}

impl FinalOutputBimachine {
    /// Assemble the machine from a compiled batch, highest-priority rule
    /// first.
    pub fn build(batch: Vec<RuleRepresentation>) -> Result<Self, BuildError> {
        if batch.is_empty() {
            return Err(BuildError::EmptyBatch);
        }

        let leftctx = LeftContextAutomaton::build(&batch);
        let leftctx_index = leftctx.init_index();
        let right_automaton = RightAutomaton::build(&batch);
        let right_index = right_automaton.init_index();

        let alphabet: Vec<u8> = leftctx.dfa.alphabet().to_vec();

        // Exploration arena, interned on the full (lctx, phi) identity.
        let mut states: Vec<LeftState> = Vec::new();
        let mut names: BTreeMap<LeftState, State> = BTreeMap::new();
        // Behavioral index, keyed by the coarser (lctx class, phi) identity.
        let mut index_names: BTreeMap<(u32, Vec<(u32, State)>), u32> = BTreeMap::new();
        let mut index_of_state: Vec<u32> = Vec::new();
        let mut states_of_index: Vec<Vec<State>> = Vec::new();

        let mut psi: HashMap<(u32, u8, u32), Word> = HashMap::new();
        let mut iota: HashMap<u32, Word> = HashMap::new();

        let initial = Self::initial_left(&leftctx, &right_automaton, &right_index);
        names.insert(initial.clone(), State(0));
        states.push(initial);

        let mut list = TransitionList::default();
        list.start.push(0);
        let mut step = 0usize;
        while step < states.len() {
            let curr = states[step].clone();

            let key = (
                leftctx_index.index_of_state[curr.lctx.index()],
                curr.phi.iter().map(|(&k, &v)| (k, v)).collect::<Vec<_>>(),
            );
            let next_index = index_names.len() as u32;
            let curr_index = *index_names.entry(key).or_insert(next_index);
            if curr_index as usize == states_of_index.len() {
                states_of_index.push(Vec::new());
            }
            index_of_state.push(curr_index);
            states_of_index[curr_index as usize].push(State(step as u32));

            for &letter in &alphabet {
                let next = Self::next_left(
                    &curr,
                    curr_index,
                    letter,
                    &leftctx,
                    &right_automaton,
                    &right_index,
                    &batch,
                    &mut psi,
                );
                let id = match names.get(&next) {
                    Some(&id) => id,
                    None => {
                        let id = State(states.len() as u32);
                        names.insert(next.clone(), id);
                        states.push(next);
                        id
                    }
                };
                list.buffer.push(Transition::new(State(step as u32), Sym(letter), id));
            }
            list.start.push(list.buffer.len());

            // Epsilon match at the end of the input.
            if let Some(rule) = right_automaton.min_epsilon_rule(
                &batch,
                &leftctx.contains_final_of[curr.lctx.index()],
                &right_automaton.states[0],
            ) {
                let output = batch[rule as usize]
                    .output_for_epsilon
                    .as_ref()
                    .expect("min_epsilon_rule only selects rules with an epsilon output");
                if !output.is_empty() {
                    iota.insert(curr_index, output.clone());
                }
            }
            step += 1;
        }
        list.sorted = true;

        let mut left_fsa: MonoidalFsa<Sym> = MonoidalFsa::new();
        left_fsa.states_cnt = states.len() as u32;
        left_fsa.transitions = list;
        left_fsa.initial.insert(State(0));
        left_fsa.alphabet = leftctx.dfa.fsa.alphabet.clone();
        left_fsa.alphabet_order = leftctx.dfa.fsa.alphabet_order.clone();
        let mut left = ClassicalFsa::from(left_fsa);
        let mut right = right_automaton.fsa;

        let left_index = ClassIndex {
            index_of_state,
            states_of_index,
        };
        let (color_of_left, color_of_right) =
            Self::minimize(&mut left, &mut right, &left_index, &right_index, &psi, &iota);

        let mut entries = Vec::with_capacity(psi.len());
        for ((left_ind, a, right_ind), word) in psi {
            for &l in &left_index.states_of_index[left_ind as usize] {
                for &r in &right_index.states_of_index[right_ind as usize] {
                    entries.push((
                        color_of_left[l.index()],
                        (a, color_of_right[r.index()]),
                        word.clone(),
                    ));
                }
            }
        }
        let psi = SortedTable::freeze(entries, left.states_cnt() as usize, true);

        let mut iota_entries = Vec::with_capacity(iota.len());
        for (left_ind, word) in iota {
            for &l in &left_index.states_of_index[left_ind as usize] {
                iota_entries.push((color_of_left[l.index()], (), word.clone()));
            }
        }
        let iota = SortedTable::freeze(iota_entries, left.states_cnt() as usize, true);

        Ok(FinalOutputBimachine {
            left,
            right,
            psi,
            iota,
        })
    }

    /// The left state before any input: matches that can start at position
    /// zero, per right class.
    fn initial_left(
        leftctx: &LeftContextAutomaton,
        right: &RightAutomaton,
        right_index: &ClassIndex,
    ) -> LeftState {
        let lctx = leftctx
            .dfa
            .start()
            .expect("the left-context automaton is deterministic");
        let rules_ok = &leftctx.contains_final_of[lctx.index()];
        let mut phi = BTreeMap::new();
        for right_ind in 0..right_index.classes_cnt() as u32 {
            let right_state = &right.states[right_index.representative(right_ind).index()];
            if let Some(st) = right.first_startable_center(rules_ok, right_state) {
                phi.insert(right_ind, st);
            }
        }
        LeftState { lctx, phi }
    }

    /// One exploration step: the successor left state on `letter`, emitting
    /// the `psi` outputs of the step as a side effect.
    #[allow(clippy::too_many_arguments)]
    fn next_left(
        from: &LeftState,
        from_index: u32,
        letter: u8,
        leftctx: &LeftContextAutomaton,
        right: &RightAutomaton,
        right_index: &ClassIndex,
        batch: &[RuleRepresentation],
        psi: &mut HashMap<(u32, u8, u32), Word>,
    ) -> LeftState {
        let next_lctx = leftctx
            .dfa
            .successor(from.lctx, letter)
            .expect("the left-context automaton is total");
        let mut next = LeftState {
            lctx: next_lctx,
            phi: BTreeMap::new(),
        };
        for right_ind in 0..right_index.classes_cnt() as u32 {
            let right_rep_id = right_index.representative(right_ind);
            let (st, output) = Self::next_left_helper(
                from, letter, leftctx, right, right_index, right_rep_id, next_lctx, batch,
            );
            if let Some(st) = st {
                next.phi.insert(right_ind, st);
            }
            if output.as_slice() != [letter] {
                psi.insert((from_index, letter, right_ind), output);
            }
        }
        next
    }

    /// Decide the phase of the step from `from` on `letter`, for the match
    /// slot of `right_rep_id`'s class.
    ///
    /// `right_rep_id` names the right automaton's state after the letter (in
    /// input order); its successor under the backward scan is the state the
    /// current position pairs with, whose class indexes `phi`. The class
    /// representative stands in for every member: equal `g` makes their
    /// dispatch identical.
    #[allow(clippy::too_many_arguments)]
    fn next_left_helper(
        from: &LeftState,
        letter: u8,
        leftctx: &LeftContextAutomaton,
        right: &RightAutomaton,
        right_index: &ClassIndex,
        right_rep_id: State,
        next_lctx: State,
        batch: &[RuleRepresentation],
    ) -> (Option<State>, Word) {
        let rules_ok = &leftctx.contains_final_of[from.lctx.index()];
        let rules_ok_next = &leftctx.contains_final_of[next_lctx.index()];
        let right_state = &right.states[right_rep_id.index()];

        let succ_id = right
            .successor_id(right_rep_id, letter)
            .expect("the right automaton is total");
        let succ = &right.states[succ_id.index()];
        let succ_class = right_index.index_of_state[succ_id.index()];

        // No match covers this position: emit the pending epsilon output (if
        // any) before the letter itself, and let a match open at the next
        // position.
        let no_match = |at: &RightState| -> (Option<State>, Word) {
            let mut output = right
                .min_epsilon_rule(batch, rules_ok, at)
                .and_then(|rule| batch[rule as usize].output_for_epsilon.clone())
                .unwrap_or_default();
            output.push(letter);
            (
                right.first_startable_center(rules_ok_next, right_state),
                output,
            )
        };

        match from.phi.get(&succ_class) {
            Some(&q) if right.final_center_rule.contains_key(&q) => {
                // The match in this slot finished at the previous position;
                // either a new one starts right away or the slot empties.
                if let Some(st) = right.first_startable_center(rules_ok, succ) {
                    match right.min_continuation_on(st, letter, right_state) {
                        Some((next_center, output)) => (Some(next_center), output),
                        None => (None, vec![letter]),
                    }
                } else {
                    no_match(succ)
                }
            }
            Some(&q) if succ.g_inv.contains_key(&q) => {
                // The match continues towards its best completion.
                match right.min_continuation_on(q, letter, right_state) {
                    Some((next_center, output)) => (Some(next_center), output),
                    None => (None, vec![letter]),
                }
            }
            Some(_) => (None, vec![letter]),
            None => {
                if right.first_startable_center(rules_ok, succ).is_none() {
                    no_match(succ)
                } else {
                    (None, vec![letter])
                }
            }
        }
    }

    /// Color both sides by their output profiles and merge indistinguishable
    /// states.
    fn minimize(
        left: &mut ClassicalFsa,
        right: &mut ClassicalFsa,
        left_index: &ClassIndex,
        right_index: &ClassIndex,
        psi: &HashMap<(u32, u8, u32), Word>,
        iota: &HashMap<u32, Word>,
    ) -> (Vec<State>, Vec<State>) {
        type PsiProfile = BTreeSet<(u32, u8, Word)>;

        let mut left_profile: Vec<(PsiProfile, Word)> =
            vec![Default::default(); left_index.classes_cnt()];
        let mut right_profile: Vec<PsiProfile> = vec![Default::default(); right_index.classes_cnt()];
        for ((left_ind, a, right_ind), word) in psi {
            left_profile[*left_ind as usize].0.insert((*right_ind, *a, word.clone()));
            right_profile[*right_ind as usize].insert((*left_ind, *a, word.clone()));
        }
        for (left_ind, word) in iota {
            left_profile[*left_ind as usize].1 = word.clone();
        }

        let mut color_of_left = Vec::new();
        let colors_left = find_colors(&mut color_of_left, &left_profile, &left_index.index_of_state);
        let mut color_of_right = Vec::new();
        let colors_right = find_colors(
            &mut color_of_right,
            &right_profile,
            &right_index.index_of_state,
        );

        left.colored_pseudo_minimize(colors_left, &mut color_of_left);
        right.colored_pseudo_minimize(colors_right, &mut color_of_right);
        (color_of_left, color_of_right)
    }
}

impl Rewrite for FinalOutputBimachine {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, RewriteError> {
        let right_path = self.right.find_path(input.iter().rev().copied())?;
        let n = input.len();
        let rrev = |i: usize| right_path[n - i];

        let mut output = Vec::with_capacity(n);
        let mut curr = self.left.start()?;
        for (i, &c) in input.iter().enumerate() {
            match self.psi.get(curr, &(c, rrev(i + 1))) {
                Some(word) => output.extend_from_slice(word),
                None => output.push(c),
            }
            curr = self.left.successor(curr, c)?;
        }
        if let Some(word) = self.iota.get(curr, &()) {
            output.extend_from_slice(word);
        }
        Ok(output)
    }
}
