//! The compiler framework for rule regular expressions.
//!
//! Compilation is staged: [`regex`] turns the one-byte-token concrete syntax
//! into reverse Polish notation with a side vector of base elements, and
//! [`thompson`] replays the notation into an epsilon-NFA over a requested
//! alphabet. The same machinery serves both plain acceptors (context
//! expressions, base elements are single symbols) and transducers (center
//! expressions, base elements are word pairs).

pub mod regex;
pub mod thompson;

use crate::automata::MonoidalFsa;

use self::regex::{BaseElement, RegexError, RegularExpression};

/// Compile a regular expression into an epsilon-NFA over `alphabet`.
pub fn compile<B: BaseElement>(
    pattern: &[u8],
    alphabet: &[u8],
) -> Result<MonoidalFsa<B>, RegexError> {
    let re = RegularExpression::new(pattern)?;
    thompson::build(&re, alphabet)
}
