//! The automaton toolkit.
//!
//! [`MonoidalFsa`] is the shared core behind every machine in this crate: a
//! flat-transition automaton generic over its label kind. Plain acceptors,
//! letter transducers, and real-time transducers are all views over this one
//! representation (see [`classical`] and [`transducer`]); the constructions
//! here (epsilon removal, trimming, products, subset determinization,
//! colored partition refinement, closures, simple normal forms) are label
//! agnostic.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::{Label, EPSILON};
use crate::transition::{State, Transition, TransitionList};

pub mod classical;
pub mod transducer;

/// A finite-state automaton with monoidal labels.
///
/// States are the integers `0..states_cnt`. The alphabet is an ordered list
/// of symbols with an inverse index; epsilon is never a member.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonoidalFsa<L> {
    pub(crate) states_cnt: u32,
    pub(crate) transitions: TransitionList<L>,
    pub(crate) initial: BTreeSet<State>,
    pub(crate) final_states: BTreeSet<State>,
    pub(crate) alphabet: Vec<u8>,
    pub(crate) alphabet_order: HashMap<u8, u32>,
}

impl<L> Default for MonoidalFsa<L> {
    fn default() -> Self {
        MonoidalFsa {
            states_cnt: 0,
            transitions: TransitionList::default(),
            initial: BTreeSet::new(),
            final_states: BTreeSet::new(),
            alphabet: Vec::new(),
            alphabet_order: HashMap::new(),
        }
    }
}

impl<L: Label> MonoidalFsa<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states_cnt(&self) -> u32 {
        self.states_cnt
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    /// Add a symbol to the alphabet unless already present.
    pub(crate) fn alphabet_union_sym(&mut self, c: u8) {
        if !self.alphabet_order.contains_key(&c) {
            self.alphabet_order.insert(c, self.alphabet.len() as u32);
            self.alphabet.push(c);
        }
    }

    pub(crate) fn alphabet_union(&mut self, other_alphabet: &[u8]) {
        for &c in other_alphabet {
            self.alphabet_union_sym(c);
        }
    }

    pub(crate) fn contains_final(&self, set: &BTreeSet<State>) -> bool {
        set.iter().any(|st| self.final_states.contains(st))
    }

    /// Whether the empty word is accepted.
    pub fn accepts_epsilon(&self) -> bool {
        self.initial.iter().any(|st| self.final_states.contains(st))
    }

    /// Breadth-first traversal from `st` over the transitions admitted by
    /// `pred`, invoking `visit` on every reached state (including `st`).
    ///
    /// Precondition: the transition list is indexed by source state.
    pub(crate) fn bfs<F, P>(&self, st: State, mut visit: F, pred: P)
    where
        F: FnMut(State),
        P: Fn(&Transition<L>) -> bool,
    {
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        queue.push_back(st);
        visited.insert(st);
        while let Some(curr) = queue.pop_front() {
            visit(curr);
            for tr in self.transitions.from_state(curr) {
                if pred(tr) && visited.insert(tr.to) {
                    queue.push_back(tr.to);
                }
            }
        }
    }

    /// Extend the initial set with its epsilon closure.
    fn eps_close_initial(&mut self) {
        let seeds: Vec<State> = self.initial.iter().copied().collect();
        let mut closure = Vec::new();
        for init in seeds {
            self.bfs(init, |st| closure.push(st), |tr| tr.label.is_epsilon());
        }
        self.initial.extend(closure);
    }

    /// Remove epsilon transitions, preserving the accepted relation.
    ///
    /// Acceptance of the empty word survives through the epsilon-closed
    /// initial set overlapping the final set.
    pub fn remove_epsilon(&mut self) -> &mut Self {
        let n = self.states_cnt as usize;
        self.transitions.sort_by_from(n);
        self.eps_close_initial();

        let mut buf: Vec<Transition<L>> = Vec::with_capacity(self.transitions.buffer.len());
        let mut start: Vec<usize> = Vec::with_capacity(n + 1);
        for tr in &self.transitions.buffer {
            if tr.label.is_epsilon() {
                continue;
            }
            while start.len() <= tr.from.index() {
                start.push(buf.len());
            }
            self.bfs(
                tr.to,
                |dest| buf.push(Transition::new(tr.from, tr.label.clone(), dest)),
                |t| t.label.is_epsilon(),
            );
        }
        while start.len() <= n {
            start.push(buf.len());
        }

        self.transitions = TransitionList {
            buffer: buf,
            start,
            sorted: true,
        };
        self
    }

    /// Keep only states that are both reachable and co-reachable, renumbering
    /// the survivors.
    ///
    /// The marks live in cells because the traversal predicate reads what
    /// the visitor writes.
    pub fn trim(&mut self) -> &mut Self {
        let n = self.states_cnt as usize;
        if n == 0 {
            return self;
        }
        self.transitions.sort_by_from(n);

        // Forward pass: 0 -> 1 marks reachability.
        let marks: Vec<Cell<u8>> = vec![Cell::new(0); n];
        let seeds: Vec<State> = self.initial.iter().copied().collect();
        for init in seeds {
            if marks[init.index()].get() == 0 {
                self.bfs(
                    init,
                    |st| marks[st.index()].set(1),
                    |tr| marks[tr.to.index()].get() == 0,
                );
            }
        }

        // Backward pass on the reversed graph: 1 -> 2 marks co-reachability.
        self.transitions.reverse();
        self.transitions.sort_by_from(n);
        let seeds: Vec<State> = self.final_states.iter().copied().collect();
        for fin in seeds {
            if marks[fin.index()].get() == 1 {
                self.bfs(
                    fin,
                    |st| marks[st.index()].set(2),
                    |tr| marks[tr.to.index()].get() == 1,
                );
            }
        }

        // Rename surviving states.
        let mut renames: Vec<Option<State>> = Vec::with_capacity(n);
        let mut next = 0u32;
        for m in &marks {
            if m.get() == 2 {
                renames.push(Some(State(next)));
                next += 1;
            } else {
                renames.push(None);
            }
        }
        self.states_cnt = next;

        // Filter, remap, and restore direction in one pass (the buffer is
        // currently reversed).
        let old = std::mem::take(&mut self.transitions.buffer);
        self.transitions.sorted = false;
        self.transitions.buffer = old
            .into_iter()
            .filter_map(|tr| {
                match (renames[tr.from.index()], renames[tr.to.index()]) {
                    (Some(from), Some(to)) => Some(Transition::new(to, tr.label, from)),
                    _ => None,
                }
            })
            .collect();

        self.initial = Self::filter_and_remap(&self.initial, &renames);
        self.final_states = Self::filter_and_remap(&self.final_states, &renames);
        self
    }

    fn filter_and_remap(states: &BTreeSet<State>, renames: &[Option<State>]) -> BTreeSet<State> {
        states
            .iter()
            .filter_map(|st| renames[st.index()])
            .collect()
    }

    /// The guarded product of two automata.
    ///
    /// Explores `I₁ × I₂` and emits `((p₁,p₂), mk(a,b), (q₁,q₂))` whenever
    /// `guard(a, b)` holds; each side may also idle on a virtual epsilon
    /// self-loop, which is what lets compositions synchronize on one-sided
    /// epsilon. The result is epsilon-removed and trimmed.
    pub fn product<M, F, G>(&mut self, rhs: &mut MonoidalFsa<L>, mk: F, guard: G) -> MonoidalFsa<M>
    where
        M: Label,
        F: Fn(&L, &L) -> M,
        G: Fn(&L, &L) -> bool,
    {
        self.transitions.sort_by_from(self.states_cnt as usize);
        rhs.transitions.sort_by_from(rhs.states_cnt as usize);

        let mut prod = MonoidalFsa::<M>::new();
        prod.alphabet_union(&self.alphabet);
        prod.alphabet_union(&rhs.alphabet);

        let mut names: BTreeMap<(State, State), State> = BTreeMap::new();
        let mut queue: VecDeque<(State, State)> = VecDeque::new();
        for &s1 in &self.initial {
            for &s2 in &rhs.initial {
                names.insert((s1, s2), State(prod.states_cnt));
                prod.states_cnt += 1;
                queue.push_back((s1, s2));
            }
        }

        prod.transitions.start.push(0);
        let mut step = 0u32;
        while let Some((s1, s2)) = queue.pop_front() {
            let eps1 = [Transition::new(s1, L::epsilon(), s1)];
            let eps2 = [Transition::new(s2, L::epsilon(), s2)];
            for tr1 in self.transitions.from_state(s1).iter().chain(eps1.iter()) {
                for tr2 in rhs.transitions.from_state(s2).iter().chain(eps2.iter()) {
                    if !guard(&tr1.label, &tr2.label) {
                        continue;
                    }
                    let target = (tr1.to, tr2.to);
                    let id = match names.get(&target) {
                        Some(&id) => id,
                        None => {
                            let id = State(prod.states_cnt);
                            prod.states_cnt += 1;
                            names.insert(target, id);
                            queue.push_back(target);
                            id
                        }
                    };
                    prod.transitions
                        .buffer
                        .push(Transition::new(State(step), mk(&tr1.label, &tr2.label), id));
                }
            }
            prod.transitions.start.push(prod.transitions.buffer.len());
            step += 1;
        }
        prod.transitions.sorted = true;

        for (&(a, b), &id) in &names {
            if self.initial.contains(&a) && rhs.initial.contains(&b) {
                prod.initial.insert(id);
            }
            if self.final_states.contains(&a) && rhs.final_states.contains(&b) {
                prod.final_states.insert(id);
            }
        }

        prod.remove_epsilon().trim();
        prod
    }

    /// The union of two automata by disjoint renumbering.
    pub fn union(mut self, rhs: Self) -> Self {
        let shift = self.states_cnt;
        self.transitions.sorted = false;
        for tr in &rhs.transitions.buffer {
            self.transitions.buffer.push(Transition::new(
                State(tr.from.0 + shift),
                tr.label.clone(),
                State(tr.to.0 + shift),
            ));
        }
        for init in &rhs.initial {
            self.initial.insert(State(init.0 + shift));
        }
        for fin in &rhs.final_states {
            self.final_states.insert(State(fin.0 + shift));
        }
        self.alphabet_union(&rhs.alphabet);
        self.states_cnt += rhs.states_cnt;
        self
    }

    /// Concatenation through epsilon links from the left finals to the right
    /// initials.
    pub fn concatenation(mut self, rhs: Self) -> Self {
        let shift = self.states_cnt;
        self.transitions.sorted = false;
        for tr in &rhs.transitions.buffer {
            self.transitions.buffer.push(Transition::new(
                State(tr.from.0 + shift),
                tr.label.clone(),
                State(tr.to.0 + shift),
            ));
        }
        for &fin in &self.final_states {
            for init in &rhs.initial {
                self.transitions
                    .buffer
                    .push(Transition::new(fin, L::epsilon(), State(init.0 + shift)));
            }
        }
        self.final_states = rhs
            .final_states
            .iter()
            .map(|fin| State(fin.0 + shift))
            .collect();
        self.alphabet_union(&rhs.alphabet);
        self.states_cnt += rhs.states_cnt;
        self
    }

    /// Concatenation without epsilon links: every transition leaving an
    /// initial state of `rhs` is materialized again out of each final state
    /// of `self`.
    pub fn concat_right(&mut self, rhs: &Self) -> &mut Self {
        let shift = self.states_cnt;
        self.transitions.sorted = false;
        for tr in &rhs.transitions.buffer {
            self.transitions.buffer.push(Transition::new(
                State(tr.from.0 + shift),
                tr.label.clone(),
                State(tr.to.0 + shift),
            ));
            if rhs.initial.contains(&tr.from) {
                for &fin in &self.final_states {
                    self.transitions
                        .buffer
                        .push(Transition::new(fin, tr.label.clone(), State(tr.to.0 + shift)));
                }
            }
        }
        if !rhs.accepts_epsilon() {
            self.final_states.clear();
        }
        for fin in &rhs.final_states {
            self.final_states.insert(State(fin.0 + shift));
        }
        self.alphabet_union(&rhs.alphabet);
        self.states_cnt += rhs.states_cnt;
        self
    }

    /// One-or-more closure: a fresh state becomes the sole initial, linked by
    /// epsilon to the old initials and from the old finals.
    pub fn plus(&mut self) -> &mut Self {
        self.transitions.sorted = false;
        let hub = State(self.states_cnt);
        for &init in &self.initial.clone() {
            self.transitions.buffer.push(Transition::new(hub, L::epsilon(), init));
        }
        for &fin in &self.final_states.clone() {
            self.transitions.buffer.push(Transition::new(fin, L::epsilon(), hub));
        }
        self.initial.clear();
        self.initial.insert(hub);
        self.states_cnt += 1;
        self
    }

    /// Kleene closure: [`plus`](Self::plus) with the hub also final.
    pub fn kleene_star(&mut self) -> &mut Self {
        self.plus();
        self.final_states.insert(State(self.states_cnt - 1));
        self
    }

    /// Zero-or-one: adds an isolated state that is both initial and final.
    pub fn option(&mut self) -> &mut Self {
        self.transitions.sorted = false;
        let st = State(self.states_cnt);
        self.initial.insert(st);
        self.final_states.insert(st);
        self.states_cnt += 1;
        self
    }

    /// Swap initial with final states and the direction of every transition.
    pub fn reverse(&mut self) -> &mut Self {
        std::mem::swap(&mut self.initial, &mut self.final_states);
        self.transitions.reverse();
        self
    }

    /// Left-simple normal form: a single initial state with no incoming
    /// transitions.
    pub fn to_left_simple(&mut self, preserve_epsilon: bool) -> &mut Self {
        self.remove_epsilon();
        let n = self.states_cnt as usize;
        self.transitions.sort_by_from(n);
        let sentinel = State(self.states_cnt);
        // Cloned rows are appended at the tail, which keeps the source-state
        // order and lets the bucket index be extended in place.
        for init in self.initial.clone() {
            let range =
                self.transitions.start[init.index()]..self.transitions.start[init.index() + 1];
            for i in range {
                let (label, to) = {
                    let tr = &self.transitions.buffer[i];
                    (tr.label.clone(), tr.to)
                };
                self.transitions.buffer.push(Transition::new(sentinel, label, to));
            }
        }
        self.transitions.start.push(self.transitions.buffer.len());
        if preserve_epsilon && self.accepts_epsilon() {
            self.final_states.insert(sentinel);
        }
        self.initial.clear();
        self.initial.insert(sentinel);
        self.states_cnt += 1;
        self
    }

    /// Right-simple normal form: a single final state with no outgoing
    /// transitions.
    pub fn to_right_simple(&mut self, preserve_epsilon: bool) -> &mut Self {
        self.remove_epsilon();
        self.transitions.sorted = false;
        let sentinel = State(self.states_cnt);
        for i in 0..self.transitions.buffer.len() {
            if self.final_states.contains(&self.transitions.buffer[i].to) {
                let (from, label) = {
                    let tr = &self.transitions.buffer[i];
                    (tr.from, tr.label.clone())
                };
                self.transitions.buffer.push(Transition::new(from, label, sentinel));
            }
        }
        if preserve_epsilon && self.accepts_epsilon() {
            self.initial.insert(sentinel);
        }
        self.final_states.clear();
        self.final_states.insert(sentinel);
        self.states_cnt += 1;
        self
    }

    /// Simple normal form: both sentinels at once.
    ///
    /// The result never accepts the empty word; callers that care record the
    /// epsilon behavior separately beforehand.
    pub fn to_simple(&mut self) -> &mut Self {
        self.remove_epsilon();
        self.transitions.sorted = false;
        let new_initial = State(self.states_cnt);
        let new_final = State(self.states_cnt + 1);
        for i in 0..self.transitions.buffer.len() {
            let (from, label, to) = {
                let tr = &self.transitions.buffer[i];
                (tr.from, tr.label.clone(), tr.to)
            };
            if self.initial.contains(&from) {
                self.transitions
                    .buffer
                    .push(Transition::new(new_initial, label.clone(), to));
                if self.final_states.contains(&to) {
                    self.transitions
                        .buffer
                        .push(Transition::new(new_initial, label.clone(), new_final));
                }
            }
            if self.final_states.contains(&to) {
                self.transitions.buffer.push(Transition::new(from, label, new_final));
            }
        }
        self.initial.clear();
        self.initial.insert(new_initial);
        self.final_states.clear();
        self.final_states.insert(new_final);
        self.states_cnt += 2;
        self
    }

    /// Subset construction over the labels actually used.
    ///
    /// Unlike the classical determinization this emits a transition only for
    /// labels with a nonempty target set, so the result is deterministic but
    /// not total.
    pub fn pseudo_determinize(&mut self) -> &mut Self {
        self.remove_epsilon().trim();
        self.transitions.sort_by_from(self.states_cnt as usize);

        let mut names: BTreeMap<BTreeSet<State>, State> = BTreeMap::new();
        let mut subsets: Vec<BTreeSet<State>> = Vec::new();
        let initial_subset: BTreeSet<State> = self.initial.iter().copied().collect();

        let mut new_final: BTreeSet<State> = BTreeSet::new();
        if self.contains_final(&initial_subset) {
            new_final.insert(State(0));
        }
        names.insert(initial_subset.clone(), State(0));
        subsets.push(initial_subset);

        let mut new_list = TransitionList::default();
        new_list.start.push(0);
        let mut next_id = 1u32;
        let mut step = 0usize;
        while step < subsets.len() {
            let mut next_sets: BTreeMap<L, BTreeSet<State>> = BTreeMap::new();
            for &st in &subsets[step] {
                for tr in self.transitions.from_state(st) {
                    next_sets.entry(tr.label.clone()).or_default().insert(tr.to);
                }
            }
            for (label, set) in next_sets {
                let id = match names.get(&set) {
                    Some(&id) => id,
                    None => {
                        let id = State(next_id);
                        next_id += 1;
                        if self.contains_final(&set) {
                            new_final.insert(id);
                        }
                        names.insert(set.clone(), id);
                        subsets.push(set);
                        id
                    }
                };
                new_list.buffer.push(Transition::new(State(step as u32), label, id));
            }
            new_list.start.push(new_list.buffer.len());
            step += 1;
        }
        new_list.sorted = true;

        self.states_cnt = next_id;
        self.transitions = new_list;
        self.initial.clear();
        self.initial.insert(State(0));
        self.final_states = new_final;
        self
    }

    /// The distinct labels in use, in label order.
    pub fn find_pseudo_alphabet(&self) -> Vec<L> {
        let set: BTreeSet<&L> = self.transitions.buffer.iter().map(|tr| &tr.label).collect();
        set.into_iter().cloned().collect()
    }

    /// Make a deterministic automaton total over `pseudo_alphabet` by routing
    /// every missing `(state, label)` to a fresh sink.
    ///
    /// Precondition: transitions sorted by source, then by label in
    /// `pseudo_alphabet` order.
    fn complete(&mut self, pseudo_alphabet: &[L]) -> &mut Self {
        let n = self.states_cnt as usize;
        if self.transitions.buffer.len() >= n * pseudo_alphabet.len() {
            return self;
        }
        let sink = State(self.states_cnt);
        let old_len = self.transitions.buffer.len();
        let mut ind = 0usize;
        for st in 0..=n {
            for letter in pseudo_alphabet {
                let matches = ind < old_len && {
                    let tr = &self.transitions.buffer[ind];
                    tr.from.index() == st && tr.label == *letter
                };
                if matches {
                    ind += 1;
                } else {
                    self.transitions
                        .buffer
                        .push(Transition::new(State(st as u32), letter.clone(), sink));
                }
            }
        }
        self.transitions.sorted = false;
        self.states_cnt += 1;
        self
    }

    /// Hopcroft-style partition refinement seeded by an external coloring.
    ///
    /// `color_of[q]` assigns each state to one of `colors_cnt` starting
    /// classes; the refinement splits classes until transitions respect them,
    /// always requeueing the smaller half, and rebuilds the automaton with
    /// one state per class. Afterwards `color_of[q]` names the merged state
    /// of each original state.
    ///
    /// Precondition: deterministic and total over `pseudo_alphabet`, with a
    /// single initial state.
    pub(crate) fn colored_pseudo_minimize(
        &mut self,
        colors_cnt: usize,
        color_of: &mut Vec<State>,
        pseudo_alphabet: &[L],
    ) -> &mut Self {
        let n = self.states_cnt as usize;
        let rank: HashMap<&L, usize> = pseudo_alphabet
            .iter()
            .enumerate()
            .map(|(i, l)| (l, i))
            .collect();

        // Work on the reversed graph, rows sorted by label rank, so the
        // predecessors of a class under one letter are a contiguous slice.
        self.transitions.reverse();
        self.transitions.counting_sort_by(pseudo_alphabet.len().saturating_sub(1), |tr| rank[&tr.label]);
        self.transitions.sort_by_from(n);

        struct EquivalenceClass {
            members: BTreeSet<State>,
            plus: Vec<State>,
            in_queue: Vec<bool>,
        }
        let mut classes: Vec<EquivalenceClass> = (0..colors_cnt)
            .map(|_| EquivalenceClass {
                members: BTreeSet::new(),
                plus: Vec::new(),
                in_queue: vec![false; pseudo_alphabet.len()],
            })
            .collect();
        for st in 0..n {
            classes[color_of[st].index()].members.insert(State(st as u32));
        }

        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        for letter_ind in 0..pseudo_alphabet.len() {
            for class_ind in 0..classes.len() {
                queue.push_back((class_ind, letter_ind));
                classes[class_ind].in_queue[letter_ind] = true;
            }
        }

        let mut split_queue: VecDeque<usize> = VecDeque::new();
        while let Some((class_ind, letter_ind)) = queue.pop_front() {
            classes[class_ind].in_queue[letter_ind] = false;

            // Gather the predecessors of this class under the letter.
            let members: Vec<State> = classes[class_ind].members.iter().copied().collect();
            for s1 in members {
                let row = self.transitions.from_state(s1);
                let lo = row.partition_point(|tr| rank[&tr.label] < letter_ind);
                let hi = row.partition_point(|tr| rank[&tr.label] <= letter_ind);
                for tr in &row[lo..hi] {
                    let target_ind = color_of[tr.to.index()].index();
                    let target = &mut classes[target_ind];
                    if target.plus.is_empty() {
                        split_queue.push_back(target_ind);
                    }
                    target.plus.push(tr.to);
                }
            }

            while let Some(to_split) = split_queue.pop_front() {
                if classes[to_split].members.len() != classes[to_split].plus.len() {
                    let new_ind = classes.len();
                    let moved = std::mem::take(&mut classes[to_split].plus);
                    let mut new_class = EquivalenceClass {
                        members: BTreeSet::new(),
                        plus: Vec::new(),
                        in_queue: vec![false; pseudo_alphabet.len()],
                    };
                    for st in &moved {
                        classes[to_split].members.remove(st);
                        new_class.members.insert(*st);
                        color_of[st.index()] = State(new_ind as u32);
                    }
                    classes.push(new_class);
                    for letter in 0..pseudo_alphabet.len() {
                        if classes[to_split].in_queue[letter] {
                            queue.push_back((new_ind, letter));
                            classes[new_ind].in_queue[letter] = true;
                        } else {
                            let smaller = if classes[to_split].members.len()
                                < classes[new_ind].members.len()
                            {
                                to_split
                            } else {
                                new_ind
                            };
                            queue.push_back((smaller, letter));
                            classes[smaller].in_queue[letter] = true;
                        }
                    }
                } else {
                    classes[to_split].plus.clear();
                }
            }
        }

        // One state per class; transitions are still reversed, so restoring
        // the direction and remapping happens in the same pass.
        self.states_cnt = classes.len() as u32;
        let old_initial = *self
            .initial
            .iter()
            .next()
            .expect("colored minimization requires an initial state");
        self.initial.clear();
        self.initial.insert(color_of[old_initial.index()]);
        let merged_finals: BTreeSet<State> = self
            .final_states
            .iter()
            .map(|fin| color_of[fin.index()])
            .collect();
        self.final_states = merged_finals;

        let old = std::mem::take(&mut self.transitions.buffer);
        self.transitions.buffer = old
            .into_iter()
            .map(|tr| Transition::new(color_of[tr.to.index()], tr.label, color_of[tr.from.index()]))
            .collect();
        self.transitions
            .counting_sort_by(pseudo_alphabet.len().saturating_sub(1), |tr| rank[&tr.label]);
        self.transitions.sort_by_from(self.states_cnt as usize);
        self.transitions.dedup();
        self.transitions.sort_by_from(self.states_cnt as usize);
        self
    }

    /// Determinize over the used labels, complete, and merge
    /// indistinguishable states, seeding the refinement with the
    /// final/non-final split.
    pub fn pseudo_minimize(&mut self) -> &mut Self {
        self.pseudo_determinize();
        if self.final_states.is_empty() {
            return self;
        }
        self.transitions.sort_by_label();
        let pseudo_alphabet = self.find_pseudo_alphabet();
        self.transitions.sort_by_from(self.states_cnt as usize);
        self.complete(&pseudo_alphabet);

        let mut color_of: Vec<State> = (0..self.states_cnt)
            .map(|st| State(!self.final_states.contains(&State(st)) as u32))
            .collect();
        let colors_cnt = if self.final_states.len() == self.states_cnt as usize {
            1
        } else {
            2
        };
        self.colored_pseudo_minimize(colors_cnt, &mut color_of, &pseudo_alphabet);
        self.trim();
        self
    }
}

impl<L: Label + fmt::Display> fmt::Display for MonoidalFsa<L> {
    /// The textual dump: alphabet terminated by the epsilon byte, counts,
    /// state lists, then the transition list.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &c in &self.alphabet {
            write!(f, "{}", c as char)?;
        }
        writeln!(f, "{}", EPSILON as char)?;
        writeln!(
            f,
            "{} {} {}",
            self.states_cnt,
            self.initial.len(),
            self.final_states.len()
        )?;
        for st in &self.initial {
            write!(f, "{} ", st)?;
        }
        writeln!(f)?;
        for st in &self.final_states {
            write!(f, "{} ", st)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Sym;

    /// Hand-built NFA over {a, b}.
    fn fsa(
        states: u32,
        initial: &[u32],
        finals: &[u32],
        edges: &[(u32, u8, u32)],
    ) -> MonoidalFsa<Sym> {
        let mut m = MonoidalFsa::new();
        m.states_cnt = states;
        m.initial = initial.iter().map(|&s| State(s)).collect();
        m.final_states = finals.iter().map(|&s| State(s)).collect();
        for &(from, c, to) in edges {
            m.transitions.push(State(from), Sym(c), State(to));
        }
        m.alphabet_union(b"ab");
        m
    }

    fn accepts(m: &mut MonoidalFsa<Sym>, input: &[u8]) -> bool {
        m.transitions.sort_by_from(m.states_cnt as usize);
        let mut current: BTreeSet<State> = m.initial.clone();
        for &c in input {
            let mut next = BTreeSet::new();
            for &st in &current {
                for tr in m.transitions.from_state(st) {
                    if tr.label == Sym(c) {
                        next.insert(tr.to);
                    }
                }
            }
            current = next;
        }
        current.iter().any(|st| m.final_states.contains(st))
    }

    #[test]
    fn epsilon_removal_preserves_language() {
        // 0 -eps-> 1 -a-> 2 -eps-> 3(final), plus 1 -b-> 1
        let mut m = fsa(
            4,
            &[0],
            &[3],
            &[(0, EPSILON, 1), (1, b'a', 2), (2, EPSILON, 3), (1, b'b', 1)],
        );
        m.remove_epsilon();

        assert!(m.transitions.buffer.iter().all(|tr| !tr.label.is_epsilon()));
        assert!(accepts(&mut m, b"a"));
        assert!(accepts(&mut m, b"ba"));
        assert!(!accepts(&mut m, b""));
        assert!(!accepts(&mut m, b"ab"));
    }

    #[test]
    fn epsilon_acceptance_survives_removal() {
        let mut m = fsa(2, &[0], &[1], &[(0, EPSILON, 1)]);
        m.remove_epsilon();
        assert!(m.accepts_epsilon());
    }

    #[test]
    fn trim_drops_unproductive_states() {
        // State 2 is reachable but cannot reach the final; state 3 is
        // co-reachable but unreachable.
        let mut m = fsa(
            4,
            &[0],
            &[1],
            &[(0, b'a', 1), (0, b'b', 2), (3, b'a', 1)],
        );
        m.trim();

        assert_eq!(m.states_cnt, 2);
        assert_eq!(m.transitions.buffer.len(), 1);
        assert!(accepts(&mut m, b"a"));
    }

    #[test]
    fn union_accepts_both_operands() {
        let a = fsa(2, &[0], &[1], &[(0, b'a', 1)]);
        let b = fsa(2, &[0], &[1], &[(0, b'b', 1)]);
        let mut u = a.union(b);
        assert!(accepts(&mut u, b"a"));
        assert!(accepts(&mut u, b"b"));
        assert!(!accepts(&mut u, b"ab"));
    }

    #[test]
    fn concatenation_chains_operands() {
        let a = fsa(2, &[0], &[1], &[(0, b'a', 1)]);
        let b = fsa(2, &[0], &[1], &[(0, b'b', 1)]);
        let mut c = a.concatenation(b);
        c.remove_epsilon();
        assert!(accepts(&mut c, b"ab"));
        assert!(!accepts(&mut c, b"a"));
        assert!(!accepts(&mut c, b"b"));
    }

    #[test]
    fn concat_right_agrees_with_concatenation() {
        let a = fsa(2, &[0], &[1], &[(0, b'a', 1)]);
        let mut star = fsa(2, &[0], &[1], &[(0, b'b', 1)]);
        star.kleene_star();
        star.remove_epsilon();

        let mut c = a;
        c.concat_right(&star);
        assert!(accepts(&mut c, b"a"));
        assert!(accepts(&mut c, b"ab"));
        assert!(accepts(&mut c, b"abb"));
        assert!(!accepts(&mut c, b"b"));
    }

    #[test]
    fn kleene_star_accepts_empty_and_repetitions() {
        let mut m = fsa(2, &[0], &[1], &[(0, b'a', 1)]);
        m.kleene_star();
        m.remove_epsilon();
        assert!(accepts(&mut m, b""));
        assert!(accepts(&mut m, b"a"));
        assert!(accepts(&mut m, b"aaa"));
        assert!(!accepts(&mut m, b"ab"));
    }

    #[test]
    fn option_admits_the_empty_word() {
        let mut m = fsa(2, &[0], &[1], &[(0, b'a', 1)]);
        m.option();
        assert!(accepts(&mut m, b""));
        assert!(accepts(&mut m, b"a"));
        assert!(!accepts(&mut m, b"aa"));
    }

    #[test]
    fn textual_dump_lists_alphabet_counts_and_transitions() {
        let mut m = fsa(2, &[0], &[1], &[(0, b'a', 1)]);
        m.transitions.sort_by_from(2);
        let dump = m.to_string();
        let mut lines = dump.lines();
        assert_eq!(lines.next(), Some("ab_"));
        assert_eq!(lines.next(), Some("2 1 1"));
        assert_eq!(lines.next(), Some("0 "));
        assert_eq!(lines.next(), Some("1 "));
        assert_eq!(lines.next(), Some("1"));
        assert_eq!(lines.next(), Some("0 a 1"));
    }

    #[test]
    fn product_intersects_with_symbol_guard() {
        // a(a|b)* ∩ (a|b)*b has empty intersection on "a", accepts "ab".
        let mut lhs = fsa(
            2,
            &[0],
            &[1],
            &[(0, b'a', 1), (1, b'a', 1), (1, b'b', 1)],
        );
        let mut rhs = fsa(
            2,
            &[0],
            &[1],
            &[(0, b'a', 0), (0, b'b', 0), (0, b'b', 1)],
        );
        let mut prod: MonoidalFsa<Sym> = lhs.product(
            &mut rhs,
            |a, _| *a,
            |a, b| a == b && !a.is_epsilon(),
        );
        assert!(accepts(&mut prod, b"ab"));
        assert!(accepts(&mut prod, b"aab"));
        assert!(!accepts(&mut prod, b"a"));
        assert!(!accepts(&mut prod, b"b"));
    }

    #[test]
    fn simple_forms_have_clean_sentinels() {
        let mut m = fsa(
            2,
            &[0],
            &[1],
            &[(0, b'a', 1), (1, b'a', 0)],
        );
        m.to_simple();

        let init = *m.initial.iter().next().unwrap();
        let fin = *m.final_states.iter().next().unwrap();
        assert_eq!(m.initial.len(), 1);
        assert_eq!(m.final_states.len(), 1);
        assert!(m.transitions.buffer.iter().all(|tr| tr.to != init));
        assert!(m.transitions.buffer.iter().all(|tr| tr.from != fin));
        assert!(accepts(&mut m, b"a"));
        assert!(accepts(&mut m, b"aaa"));
        assert!(!accepts(&mut m, b"aa"));
    }

    #[test]
    fn pseudo_determinize_is_deterministic() {
        let mut m = fsa(
            3,
            &[0],
            &[2],
            &[(0, b'a', 1), (0, b'a', 2), (1, b'b', 2)],
        );
        m.pseudo_determinize();

        m.transitions.sort_by_from(m.states_cnt as usize);
        for st in 0..m.states_cnt {
            let row = m.transitions.from_state(State(st));
            for pair in row.windows(2) {
                assert_ne!(pair[0].label, pair[1].label);
            }
        }
        assert!(accepts(&mut m, b"a"));
        assert!(accepts(&mut m, b"ab"));
    }

    #[test]
    fn pseudo_minimize_preserves_language() {
        // Two redundant paths for "ab".
        let mut m = fsa(
            5,
            &[0],
            &[3, 4],
            &[(0, b'a', 1), (0, b'a', 2), (1, b'b', 3), (2, b'b', 4)],
        );
        m.pseudo_minimize();

        assert!(accepts(&mut m, b"ab"));
        assert!(!accepts(&mut m, b"a"));
        assert!(!accepts(&mut m, b"abb"));
        // One state per step of the only word plus its start.
        assert_eq!(m.states_cnt, 3);
    }

    #[test]
    fn pseudo_minimize_short_circuits_on_empty_language() {
        let mut m = fsa(2, &[0], &[], &[(0, b'a', 1)]);
        m.pseudo_minimize();
        assert!(m.final_states.is_empty());
    }
}
