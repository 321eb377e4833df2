//! Contextual replacement rules and their compiled representation.
//!
//! A rule is the triple `⟨center, left context, right context⟩`: the center
//! is a regular relation written over word-pair base elements, the contexts
//! are plain regular languages. Compilation packages each rule into the
//! three automata the bimachine constructions consume, plus the output the
//! center produces on the empty input, if any.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::automata::classical::ClassicalFsa;
use crate::automata::transducer::{RealTimeTransducer, Transducer, TransducerError};
use crate::automata::MonoidalFsa;
use crate::compiler::{self, regex::RegexError};
use crate::symbol::{self, Sym, Word, WordPair};

/// A contextual replacement rule as written: three regular expressions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplacementRule {
    pub center: Vec<u8>,
    pub left: Vec<u8>,
    pub right: Vec<u8>,
}

impl ReplacementRule {
    pub fn new(
        center: impl Into<Vec<u8>>,
        left: impl Into<Vec<u8>>,
        right: impl Into<Vec<u8>>,
    ) -> Self {
        ReplacementRule {
            center: center.into(),
            left: left.into(),
            right: right.into(),
        }
    }
}

/// The ways a rule can be rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// One of the three regular expressions did not parse.
    BadRegex(RegexError),
    /// The center relates the empty input to more than one output.
    NonFunctionalEpsilon,
    /// The center relates some input to infinitely many outputs.
    InfinitelyAmbiguous,
    /// The alphabet contains a byte reserved for construction-internal use.
    ForbiddenAlphabetSymbol(u8),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuleError::BadRegex(e) => write!(f, "rule: {}", e),
            RuleError::NonFunctionalEpsilon => {
                write!(f, "rule: center relates the empty input to more than one output")
            }
            RuleError::InfinitelyAmbiguous => {
                write!(f, "rule: center relates some input to infinitely many outputs")
            }
            RuleError::ForbiddenAlphabetSymbol(c) => {
                write!(f, "rule: alphabet symbol `{}' is reserved", *c as char)
            }
        }
    }
}

impl Error for RuleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RuleError::BadRegex(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegexError> for RuleError {
    fn from(e: RegexError) -> Self {
        RuleError::BadRegex(e)
    }
}

impl From<TransducerError> for RuleError {
    fn from(e: TransducerError) -> Self {
        match e {
            TransducerError::InfinitelyAmbiguous => RuleError::InfinitelyAmbiguous,
        }
    }
}

/// A rule compiled into automata.
///
/// `left` accepts every word ending in a valid left context (`Σ*·L`,
/// right-simple); `right` accepts every word beginning with a valid right
/// context (`R·Σ*`, left-simple); `center_rt` is the center in real-time,
/// pseudo-minimal, simple form. Both simple forms have exactly one sentinel
/// on the relevant side, which is what lets the bimachine constructions tag
/// a single state per rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleRepresentation {
    pub(crate) output_for_epsilon: Option<Word>,
    pub(crate) center_rt: RealTimeTransducer,
    pub(crate) left: ClassicalFsa,
    pub(crate) right: ClassicalFsa,
}

impl RuleRepresentation {
    pub fn compile(rule: &ReplacementRule, alphabet: &[u8]) -> Result<Self, RuleError> {
        if let Some(&c) = alphabet.iter().find(|&&c| symbol::is_forbidden(c)) {
            return Err(RuleError::ForbiddenAlphabetSymbol(c));
        }

        let sigma_star = || {
            let mut all = ClassicalFsa::from_symbol_set(alphabet).fsa;
            all.kleene_star();
            all.remove_epsilon();
            all
        };

        let mut left: MonoidalFsa<Sym> =
            sigma_star().concatenation(compiler::compile::<Sym>(&rule.left, alphabet)?);
        left.pseudo_minimize();
        left.to_right_simple(true);

        let mut right: MonoidalFsa<Sym> = compiler::compile::<Sym>(&rule.right, alphabet)?;
        right.concat_right(&sigma_star());
        right.pseudo_minimize();
        right.to_left_simple(true);

        let mut letter = Transducer::from(compiler::compile::<WordPair>(&rule.center, alphabet)?)
            .expand();
        letter.pseudo_minimize();
        let (mut center_rt, outputs_for_epsilon) = letter.real_time()?;
        center_rt.pseudo_minimize();
        center_rt.to_simple();
        if outputs_for_epsilon.len() > 1 {
            return Err(RuleError::NonFunctionalEpsilon);
        }

        Ok(RuleRepresentation {
            output_for_epsilon: outputs_for_epsilon.into_iter().next(),
            center_rt,
            left: ClassicalFsa::from(left),
            right: ClassicalFsa::from(right),
        })
    }

    /// The output of the center on the empty input, if it has one.
    pub fn output_for_epsilon(&self) -> Option<&Word> {
        self.output_for_epsilon.as_ref()
    }
}

/// Compile one rule given as its three regular expressions.
pub fn parse_rule(
    center: &[u8],
    left: &[u8],
    right: &[u8],
    alphabet: &[u8],
) -> Result<RuleRepresentation, RuleError> {
    RuleRepresentation::compile(&ReplacementRule::new(center, left, right), alphabet)
}

/// Compile a batch of rules over one alphabet, in priority order.
pub fn compile_batch(
    rules: &[ReplacementRule],
    alphabet: &[u8],
) -> Result<Vec<RuleRepresentation>, RuleError> {
    rules
        .iter()
        .map(|rule| RuleRepresentation::compile(rule, alphabet))
        .collect()
}
