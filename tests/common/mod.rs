//! Shared helpers for the integration suites.

#![allow(dead_code)]

pub mod porter;

use creb::bimachine::{
    build_two_step, build_with_final_output, FinalOutputBimachine, Rewrite, TwoStepBimachine,
};
use creb::rule::{compile_batch, ReplacementRule};

pub fn rule(center: &str, left: &str, right: &str) -> ReplacementRule {
    ReplacementRule::new(center.as_bytes(), left.as_bytes(), right.as_bytes())
}

/// Compile a batch and build both constructions from it.
pub fn machines(rules: &[ReplacementRule], alphabet: &str) -> (TwoStepBimachine, FinalOutputBimachine) {
    let batch = compile_batch(rules, alphabet.as_bytes()).unwrap();
    let two_step = build_two_step(batch.clone()).unwrap();
    let final_output = build_with_final_output(batch).unwrap();
    (two_step, final_output)
}

/// Rewrite with both constructions, assert they agree, and return the result.
pub fn rewrite_agreeing(
    two_step: &TwoStepBimachine,
    final_output: &FinalOutputBimachine,
    input: &str,
) -> String {
    let first = two_step.apply_str(input).unwrap();
    let second = final_output.apply_str(input).unwrap();
    assert_eq!(
        first, second,
        "the two constructions disagree on {:?}",
        input
    );
    first
}
