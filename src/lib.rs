//! # Contextual Replacement Bimachine Compiler
//!
//! The Contextual REplacement Bimachine (CREB) tool compiles batches of
//! contextual replacement rules into bimachines — pairs of deterministic
//! automata with an output function — that rewrite text in a single forward
//! pass with leftmost-longest, rule-prioritized matching.

pub mod automata;
pub mod bimachine;
pub mod compiler;
pub mod config;
pub mod rule;
pub mod symbol;
pub mod table;
pub mod transition;

pub use automata::classical::RewriteError;
pub use bimachine::{
    build_two_step, build_with_final_output, BuildError, FinalOutputBimachine, Rewrite,
    TwoStepBimachine,
};
pub use rule::{compile_batch, parse_rule, ReplacementRule, RuleError, RuleRepresentation};
