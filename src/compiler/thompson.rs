//! Thompson's construction.
//!
//! The reverse Polish notation is replayed on a stack of `(initial, final)`
//! fragments over a shared state buffer, applying the standard recipe for
//! each operator. The result has exactly one initial and one final state.

use crate::automata::MonoidalFsa;
use crate::symbol::{Label, BASE_PLACEHOLDER, CONCATENATION, EMPTY_SET, KLEENE_STAR, UNION};
use crate::transition::State;

use super::regex::{BaseElement, RegexError, RegexErrorKind, RegularExpression};

/// A state of the construction: at most two outgoing transitions, which is
/// all any Thompson recipe needs.
struct ThompsonState<L> {
    slots: [Option<(L, State)>; 2],
}

impl<L> ThompsonState<L> {
    fn new() -> Self {
        ThompsonState { slots: [None, None] }
    }
}

/// A sub-automaton under construction.
#[derive(Clone, Copy)]
struct Fragment {
    start: State,
    end: State,
}

fn empty<L>(buf: &mut Vec<ThompsonState<L>>) -> Fragment {
    buf.push(ThompsonState::new());
    buf.push(ThompsonState::new());
    Fragment {
        start: State(buf.len() as u32 - 2),
        end: State(buf.len() as u32 - 1),
    }
}

fn base<L: Label>(label: L, buf: &mut Vec<ThompsonState<L>>) -> Fragment {
    buf.push(ThompsonState::new());
    let end = State(buf.len() as u32 - 1);
    let mut start_state = ThompsonState::new();
    start_state.slots[0] = Some((label, end));
    buf.push(start_state);
    Fragment {
        start: State(buf.len() as u32 - 1),
        end,
    }
}

fn union<L: Label>(lhs: Fragment, rhs: Fragment, buf: &mut Vec<ThompsonState<L>>) -> Fragment {
    let mut start_state = ThompsonState::new();
    start_state.slots[0] = Some((L::epsilon(), lhs.start));
    start_state.slots[1] = Some((L::epsilon(), rhs.start));
    buf.push(start_state);
    let end = State(buf.len() as u32);
    buf[lhs.end.index()].slots[0] = Some((L::epsilon(), end));
    buf[rhs.end.index()].slots[0] = Some((L::epsilon(), end));
    buf.push(ThompsonState::new());
    Fragment {
        start: State(end.0 - 1),
        end,
    }
}

fn concatenation<L: Label>(
    lhs: Fragment,
    rhs: Fragment,
    buf: &mut Vec<ThompsonState<L>>,
) -> Fragment {
    buf[lhs.end.index()].slots[0] = Some((L::epsilon(), rhs.start));
    Fragment {
        start: lhs.start,
        end: rhs.end,
    }
}

fn kleene_star<L: Label>(inner: Fragment, buf: &mut Vec<ThompsonState<L>>) -> Fragment {
    buf.push(ThompsonState::new());
    let end = State(buf.len() as u32 - 1);
    buf[inner.end.index()].slots[0] = Some((L::epsilon(), inner.start));
    buf[inner.end.index()].slots[1] = Some((L::epsilon(), end));
    let mut start_state = ThompsonState::new();
    start_state.slots[0] = Some((L::epsilon(), inner.start));
    start_state.slots[1] = Some((L::epsilon(), end));
    buf.push(start_state);
    Fragment {
        start: State(buf.len() as u32 - 1),
        end,
    }
}

/// Replay a parsed expression into an epsilon-NFA over `alphabet`.
pub fn build<B: BaseElement>(
    re: &RegularExpression<B>,
    alphabet: &[u8],
) -> Result<MonoidalFsa<B>, RegexError> {
    let malformed = || RegexError {
        kind: RegexErrorKind::Malformed,
        position: None,
    };

    let mut buf: Vec<ThompsonState<B>> = Vec::with_capacity(2 * re.rpn().len());
    let mut stack: Vec<Fragment> = Vec::new();
    let mut bases = re.bases().iter();
    for &c in re.rpn() {
        match c {
            EMPTY_SET => stack.push(empty(&mut buf)),
            BASE_PLACEHOLDER => {
                let label = bases.next().cloned().ok_or_else(malformed)?;
                stack.push(base(label, &mut buf));
            }
            KLEENE_STAR => {
                let inner = stack.pop().ok_or_else(malformed)?;
                stack.push(kleene_star(inner, &mut buf));
            }
            CONCATENATION | UNION => {
                let rhs = stack.pop().ok_or_else(malformed)?;
                let lhs = stack.pop().ok_or_else(malformed)?;
                let combined = if c == CONCATENATION {
                    concatenation(lhs, rhs, &mut buf)
                } else {
                    union(lhs, rhs, &mut buf)
                };
                stack.push(combined);
            }
            _ => return Err(malformed()),
        }
    }
    let fragment = match (stack.pop(), stack.is_empty()) {
        (Some(fragment), true) => fragment,
        _ => return Err(malformed()),
    };

    let mut fsa = MonoidalFsa::new();
    fsa.states_cnt = buf.len() as u32;
    fsa.initial.insert(fragment.start);
    fsa.final_states.insert(fragment.end);
    for (i, st) in buf.into_iter().enumerate() {
        for slot in st.slots {
            if let Some((label, to)) = slot {
                fsa.transitions.push(State(i as u32), label, to);
            }
        }
    }
    fsa.alphabet_union(alphabet);
    Ok(fsa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Sym;
    use crate::transition::State;
    use std::collections::BTreeSet;

    fn nfa(pattern: &[u8]) -> MonoidalFsa<Sym> {
        let re = RegularExpression::<Sym>::new(pattern).unwrap();
        build(&re, b"abc").unwrap()
    }

    fn accepts(m: &mut MonoidalFsa<Sym>, input: &[u8]) -> bool {
        m.remove_epsilon();
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
    fn single_initial_and_final() {
        let m = nfa(b"(a|b)*c");
        assert_eq!(m.initial.len(), 1);
        assert_eq!(m.final_states.len(), 1);
    }

    #[test]
    fn base_element_produces_one_labelled_edge() {
        let m = nfa(b"a");
        assert_eq!(m.states_cnt, 2);
        assert_eq!(m.transitions.buffer.len(), 1);
        assert_eq!(m.transitions.buffer[0].label, Sym(b'a'));
    }

    #[test]
    fn empty_set_has_no_edges() {
        let mut m = nfa(b"@");
        assert_eq!(m.transitions.buffer.len(), 0);
        assert!(!accepts(&mut m, b""));
        assert!(!accepts(&mut m, b"a"));
    }

    #[test]
    fn recognizes_union_concatenation_star() {
        let mut m = nfa(b"(a|b)ba*b");
        assert!(accepts(&mut m, b"abb"));
        assert!(accepts(&mut m, b"bbaaab"));
        assert!(!accepts(&mut m, b"ab"));
        assert!(!accepts(&mut m, b"abab"));
    }

    #[test]
    fn epsilon_literal_accepts_empty_word() {
        let mut m = nfa(b"_|a");
        assert!(accepts(&mut m, b""));
        assert!(accepts(&mut m, b"a"));
        assert!(!accepts(&mut m, b"b"));
    }

    #[test]
    fn dangling_operator_is_rejected() {
        let re = RegularExpression::<Sym>::new(b"a|").unwrap();
        assert!(build(&re, b"a").is_err());
    }
}
