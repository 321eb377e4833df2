//! The Porter-stemmer rule set, applied group by group.
//!
//! Each of the ten rule groups compiles into its own pair of machines; a
//! word is pushed through all groups in order. Words travel padded with
//! spaces, since the word boundaries are anchored on whitespace.

mod common;

use common::porter;
use common::rewrite_agreeing;
use creb::bimachine::{build_two_step, build_with_final_output};
use creb::rule::compile_batch;

#[test]
fn stems_the_reference_words() {
    let stages: Vec<_> = porter::steps()
        .iter()
        .map(|rules| {
            let batch = compile_batch(rules, porter::ALPHABET.as_bytes()).unwrap();
            let two_step = build_two_step(batch.clone()).unwrap();
            let final_output = build_with_final_output(batch).unwrap();
            (two_step, final_output)
        })
        .collect();

    let stem = |word: &str| {
        let mut text = word.to_string();
        for (two_step, final_output) in &stages {
            text = rewrite_agreeing(two_step, final_output, &text);
        }
        text
    };

    assert_eq!(stem(" caresses "), " caress ");
    assert_eq!(stem(" ponies "), " poni ");
    assert_eq!(stem(" ties "), " ti ");
    assert_eq!(stem(" cats "), " cat ");
    assert_eq!(stem(" feed "), " feed ");
    // Step 1b rewrites `agreed` to `agree`; the final-e deletion of step 5a
    // leaves the vowel-initial stem with its vowel ending alone, so the
    // word survives the remaining groups unchanged.
    assert_eq!(stem(" agreed "), " agree ");
    // Several words at once, sharing one pass.
    assert_eq!(
        stem(" caresses ponies cats agreed "),
        " caress poni cat agree "
    );
}
