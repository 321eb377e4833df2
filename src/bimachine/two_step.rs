//! The two-step bimachine.
//!
//! The machine keeps the ongoing-match center state outside the scanning
//! automata and drives it with four partial functions: `delta` advances a
//! match by one symbol towards the best still-alive completion, `psi_delta`
//! is the output of that step (omitted when it is the identity on the
//! symbol), `tau` opens a match where the best-priority rule can start, and
//! `psi_tau` is the epsilon output emitted at positions where no nonempty
//! match begins. A dedicated error state stands for "outside any match".

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::automata::classical::{ClassicalFsa, RewriteError};
use crate::rule::RuleRepresentation;
use crate::symbol::Word;
use crate::table::SortedTable;
use crate::transition::State;

use super::{
    find_colors, BuildError, ClassIndex, LeftContextAutomaton, Rewrite, RightAutomaton,
};

/// A compiled two-step bimachine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TwoStepBimachine {
    left: ClassicalFsa,
    right: ClassicalFsa,
    /// `(q, a, r) ↦ q'`: the next center state of an ongoing match.
    delta: SortedTable<(u8, State), State>,
    /// `(q, a, r) ↦ w`: the output of that step, when not the identity.
    psi_delta: SortedTable<(u8, State), Word>,
    /// `(ℓ, r) ↦ q₀`: the center initial opening a match here.
    tau: SortedTable<State, State>,
    /// `(ℓ, r) ↦ w`: the epsilon output of the best epsilon rule here.
    psi_tau: SortedTable<State, Word>,
    q_err: State,
    final_center: BTreeSet<State>,
}

impl TwoStepBimachine {
    /// Assemble the machine from a compiled batch, highest-priority rule
    /// first.
    pub fn build(batch: Vec<RuleRepresentation>) -> Result<Self, BuildError> {
        if batch.is_empty() {
            return Err(BuildError::EmptyBatch);
        }

        let left_automaton = LeftContextAutomaton::build(&batch);
        let left_index = left_automaton.init_index();
        let right_automaton = RightAutomaton::build(&batch);
        let right_index = right_automaton.init_index();

        let q_err = State(right_automaton.center.fsa.states_cnt);
        let mut delta: HashMap<(State, u8, u32), State> = HashMap::new();
        let mut psi_delta: HashMap<(State, u8, u32), Word> = HashMap::new();
        let mut tau: HashMap<(u32, u32), State> = HashMap::new();
        let mut psi_tau: HashMap<(u32, u32), Word> = HashMap::new();

        let alphabet: Vec<u8> = right_automaton.fsa.alphabet().to_vec();
        for right_ind in 0..right_index.classes_cnt() as u32 {
            let right_state =
                &right_automaton.states[right_index.representative(right_ind).index()];

            for q in 0..right_automaton.center.fsa.states_cnt {
                let continuations = right_automaton.min_continuations(State(q), right_state);
                for (letter_ind, best) in continuations.into_iter().enumerate() {
                    if let Some((mu, output)) = best {
                        let letter = alphabet[letter_ind];
                        delta.insert((State(q), letter, right_ind), right_state.g[mu]);
                        if output.as_slice() != [letter] {
                            psi_delta.insert((State(q), letter, right_ind), output);
                        }
                    }
                }
            }

            for left_ind in 0..left_index.classes_cnt() as u32 {
                let rules_ok = &left_automaton.contains_final_of
                    [left_index.representative(left_ind).index()];
                if let Some(init) =
                    right_automaton.first_startable_center(rules_ok, right_state)
                {
                    tau.insert((left_ind, right_ind), init);
                }
                if let Some(rule) =
                    right_automaton.min_epsilon_rule(&batch, rules_ok, right_state)
                {
                    let output = batch[rule as usize]
                        .output_for_epsilon
                        .as_ref()
                        .expect("min_epsilon_rule only selects rules with an epsilon output");
                    if !output.is_empty() {
                        psi_tau.insert((left_ind, right_ind), output.clone());
                    }
                }
            }
        }

        let final_center: BTreeSet<State> =
            right_automaton.final_center_rule.keys().copied().collect();

        let mut left = left_automaton.dfa;
        let mut right = right_automaton.fsa;

        // Merge states with equal table profiles, then re-key the tables
        // over the merged automata.
        let (color_of_left, color_of_right) = Self::minimize(
            &mut left,
            &mut right,
            &left_index,
            &right_index,
            &delta,
            &psi_delta,
            &tau,
            &psi_tau,
        );

        let remap_delta = |table: HashMap<(State, u8, u32), State>| {
            let mut entries = Vec::with_capacity(table.len());
            for ((q, a, right_ind), ret) in table {
                for &r in &right_index.states_of_index[right_ind as usize] {
                    entries.push((q, (a, color_of_right[r.index()]), ret));
                }
            }
            SortedTable::freeze(entries, q_err.index(), true)
        };
        let remap_psi_delta = |table: HashMap<(State, u8, u32), Word>| {
            let mut entries = Vec::with_capacity(table.len());
            for ((q, a, right_ind), ret) in table {
                for &r in &right_index.states_of_index[right_ind as usize] {
                    entries.push((q, (a, color_of_right[r.index()]), ret.clone()));
                }
            }
            SortedTable::freeze(entries, q_err.index(), true)
        };
        let left_bound = left.states_cnt() as usize;
        let remap_tau = |table: HashMap<(u32, u32), State>| {
            let mut entries = Vec::with_capacity(table.len());
            for ((left_ind, right_ind), ret) in table {
                for &l in &left_index.states_of_index[left_ind as usize] {
                    for &r in &right_index.states_of_index[right_ind as usize] {
                        entries.push((color_of_left[l.index()], color_of_right[r.index()], ret));
                    }
                }
            }
            SortedTable::freeze(entries, left_bound, true)
        };
        let remap_psi_tau = |table: HashMap<(u32, u32), Word>| {
            let mut entries = Vec::with_capacity(table.len());
            for ((left_ind, right_ind), ret) in table {
                for &l in &left_index.states_of_index[left_ind as usize] {
                    for &r in &right_index.states_of_index[right_ind as usize] {
                        entries.push((
                            color_of_left[l.index()],
                            color_of_right[r.index()],
                            ret.clone(),
                        ));
                    }
                }
            }
            SortedTable::freeze(entries, left_bound, true)
        };

        Ok(TwoStepBimachine {
            delta: remap_delta(delta),
            psi_delta: remap_psi_delta(psi_delta),
            tau: remap_tau(tau),
            psi_tau: remap_psi_tau(psi_tau),
            left,
            right,
            q_err,
            final_center,
        })
    }

    /// Color both scanning automata by their table profiles and merge
    /// indistinguishable states.
    #[allow(clippy::too_many_arguments)]
    fn minimize(
        left: &mut ClassicalFsa,
        right: &mut ClassicalFsa,
        left_index: &ClassIndex,
        right_index: &ClassIndex,
        delta: &HashMap<(State, u8, u32), State>,
        psi_delta: &HashMap<(State, u8, u32), Word>,
        tau: &HashMap<(u32, u32), State>,
        psi_tau: &HashMap<(u32, u32), Word>,
    ) -> (Vec<State>, Vec<State>) {
        type PairProfile = (BTreeSet<(u32, State)>, BTreeSet<(u32, Word)>);
        type TripleProfile = (BTreeSet<(State, u8, State)>, BTreeSet<(State, u8, Word)>);

        let mut left_profile: Vec<PairProfile> =
            vec![Default::default(); left_index.classes_cnt()];
        let mut right_profile: Vec<(PairProfile, TripleProfile)> =
            vec![Default::default(); right_index.classes_cnt()];

        for (&(q, a, right_ind), &ret) in delta {
            right_profile[right_ind as usize].1 .0.insert((q, a, ret));
        }
        for ((q, a, right_ind), ret) in psi_delta {
            right_profile[*right_ind as usize].1 .1.insert((*q, *a, ret.clone()));
        }
        for (&(left_ind, right_ind), &ret) in tau {
            right_profile[right_ind as usize].0 .0.insert((left_ind, ret));
            left_profile[left_ind as usize].0.insert((right_ind, ret));
        }
        for ((left_ind, right_ind), ret) in psi_tau {
            right_profile[*right_ind as usize].0 .1.insert((*left_ind, ret.clone()));
            left_profile[*left_ind as usize].1.insert((*right_ind, ret.clone()));
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

impl Rewrite for TwoStepBimachine {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, RewriteError> {
        let left_path = self.left.find_path(input.iter().copied())?;
        let right_path = self.right.find_path(input.iter().rev().copied())?;
        let n = input.len();
        let rrev = |i: usize| right_path[n - i];

        let mut output = Vec::with_capacity(n);
        let mut curr = self
            .tau
            .get(left_path[0], &rrev(0))
            .copied()
            .unwrap_or(self.q_err);
        if curr == self.q_err {
            if let Some(word) = self.psi_tau.get(left_path[0], &rrev(0)) {
                output.extend_from_slice(word);
            }
        }
        for (i, &c) in input.iter().enumerate() {
            let pos = i + 1;
            let next = self
                .delta
                .get(curr, &(c, rrev(pos)))
                .copied()
                .unwrap_or(self.q_err);
            match self.psi_delta.get(curr, &(c, rrev(pos))) {
                Some(word) => output.extend_from_slice(word),
                None => output.push(c),
            }
            // A match is over once it leaves the table or reaches a center
            // final; either way the machine immediately tries to open the
            // next one.
            if next == self.q_err || self.final_center.contains(&next) {
                curr = self
                    .tau
                    .get(left_path[pos], &rrev(pos))
                    .copied()
                    .unwrap_or(self.q_err);
                if curr == self.q_err {
                    if let Some(word) = self.psi_tau.get(left_path[pos], &rrev(pos)) {
                        output.extend_from_slice(word);
                    }
                }
            } else {
                curr = next;
            }
        }
        Ok(output)
    }
}
