//! The Porter-stemmer rule set, expressed as contextual replacement rules.
//!
//! Ten rule groups applied in order, each compiled into its own rewriter.
//! Group 0 plants the end-of-word marker `\x02` after every word longer
//! than two letters; the suffix rules of the later groups anchor on it. The
//! marker `\x01` carries the "step 1b applied a removal" condition into
//! group 1b'; group 5b finally deletes the end-of-word marker.

use creb::rule::ReplacementRule;

pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz \r\n\t\x0b\x01\x02";

const LETTER: &str = "(a|b|c|d|e|f|g|h|i|j|k|l|m|n|o|p|q|r|s|t|u|v|w|x|y|z)";
const WHITESPACE: &str = "( |\r|\n|\t|\x0b)";
const ALWAYS_VOWEL: &str = "(a|e|i|o|u)";
const VOWEL_OR_Y: &str = "(a|e|i|o|u|y)";
const ALWAYS_CONSONANT: &str = "(b|c|d|f|g|h|j|k|l|m|n|p|q|r|s|t|v|w|x|z)";
const CONSONANT_OR_Y: &str = "(b|c|d|f|g|h|j|k|l|m|n|p|q|r|s|t|v|w|x|y|z)";
const CONSONANT_NOT_WXY: &str = "(b|c|d|f|g|h|j|k|l|m|n|p|q|r|s|t|v|z)";

const LCTX: &str = "_";
const RCTX: &str = "\x02";

fn contains_vowel() -> String {
    format!("({LETTER}*{ALWAYS_VOWEL}{LETTER}*|{LETTER}*{CONSONANT_OR_Y}{VOWEL_OR_Y}{LETTER}*)")
}

/// A maximal run of consonants.
fn c() -> String {
    format!("({CONSONANT_OR_Y}{ALWAYS_CONSONANT}*)")
}

/// A maximal run of vowels.
fn v() -> String {
    format!("({VOWEL_OR_Y}{ALWAYS_VOWEL}*)")
}

fn opt_c() -> String {
    format!("({}|_)", c())
}

fn opt_v() -> String {
    format!("({}|_)", v())
}

fn vc() -> String {
    format!("({}{})", v(), c())
}

fn v_starting_non_y() -> String {
    format!("({ALWAYS_VOWEL}{ALWAYS_VOWEL}*)")
}

/// Words of measure at least one.
fn m_gt_0() -> String {
    format!(
        "(({}{}|{}{}){}*{})",
        c(),
        vc(),
        v_starting_non_y(),
        c(),
        vc(),
        opt_v()
    )
}

/// Words of measure at least two.
fn m_gt_1() -> String {
    format!(
        "(({}{}|{}{}){}{}*{})",
        c(),
        vc(),
        v_starting_non_y(),
        c(),
        vc(),
        vc(),
        opt_v()
    )
}

fn rule(center: String, left: String, right: String) -> ReplacementRule {
    ReplacementRule::new(center.into_bytes(), left.into_bytes(), right.into_bytes())
}

/// A `(m>0) SUFFIX -> REPLACEMENT` rule together with its suppressor, which
/// keeps lower-priority rules away from the suffix when the measure
/// condition fails.
fn suffix_pair(suffix: &str, replacement: &str, condition: &str) -> Vec<ReplacementRule> {
    vec![
        rule(
            format!("[{suffix},{replacement}]"),
            condition.to_string(),
            RCTX.to_string(),
        ),
        rule(format!("[{suffix},{suffix}]"), LCTX.to_string(), RCTX.to_string()),
    ]
}

/// The rule groups, in application order.
pub fn steps() -> Vec<Vec<ReplacementRule>> {
    let mut steps = Vec::new();

    // 0: plants the end-of-word marker, so that only words longer than two
    // letters are touched by the suffix groups.
    steps.push(vec![rule(
        "[_,\x02]".into(),
        format!("{LETTER}{LETTER}{LETTER}"),
        WHITESPACE.into(),
    )]);

    // 1a: plural endings.
    steps.push(vec![
        rule("[sses,ss]".into(), LCTX.into(), RCTX.into()),
        rule("[ies,i]".into(), LCTX.into(), RCTX.into()),
        rule("[ss,ss]".into(), LCTX.into(), RCTX.into()),
        rule("[s,_]".into(), LCTX.into(), RCTX.into()),
    ]);

    // 1b: '\x01' marks whether 1b' should take place.
    steps.push(vec![
        rule("[eed,ee]".into(), m_gt_0(), RCTX.into()),
        // suppresses the rules below if the word ends in 'eed' but the
        // condition (m>0) is not satisfied
        rule("[eed,eed]".into(), LCTX.into(), RCTX.into()),
        rule("[ed,\x01]".into(), contains_vowel(), RCTX.into()),
        rule("[ing,\x01]".into(), contains_vowel(), RCTX.into()),
    ]);

    // 1b'
    steps.push(vec![
        rule("[at\x01,ate]".into(), LCTX.into(), RCTX.into()),
        rule("[bl\x01,ble]".into(), LCTX.into(), RCTX.into()),
        rule("[iz\x01,ize]".into(), LCTX.into(), RCTX.into()),
        rule(
            concat!(
                "([bb,b]|[cc,c]|[dd,d]|[ff,f]|[gg,g]|[hh,h]|[jj,j]|[kk,k]|[mm,m]|[nn,n]",
                "|[pp,p]|[qq,q]|[rr,r]|[tt,t]|[vv,v]|[ww,w]|[xx,x])[\x01,_]"
            )
            .into(),
            LCTX.into(),
            RCTX.into(),
        ),
        rule(
            "[\x01,e]".into(),
            format!("{WHITESPACE}{}{VOWEL_OR_Y}{CONSONANT_NOT_WXY}", c()),
            RCTX.into(),
        ),
        // if none of the above can be applied, deletes marker '\x01'
        rule("[\x01,_]".into(), LCTX.into(), RCTX.into()),
    ]);

    // 1c
    steps.push(vec![rule("[y,i]".into(), contains_vowel(), RCTX.into())]);

    // 2
    let mut step2 = Vec::new();
    for (suffix, replacement) in [
        ("ational", "ate"),
        ("tional", "tion"),
        ("enci", "ence"),
        ("anci", "ance"),
        ("izer", "ize"),
        ("bli", "ble"),
        ("alli", "al"),
        ("entli", "ent"),
        ("eli", "e"),
        ("ousli", "ous"),
        ("ization", "ize"),
        ("ation", "ate"),
        ("ator", "ate"),
        ("alism", "al"),
        ("iveness", "ive"),
        ("fulness", "ful"),
        ("ousness", "ous"),
        ("aliti", "al"),
        ("iviti", "ive"),
        ("biliti", "ble"),
        ("logi", "log"),
    ] {
        step2.extend(suffix_pair(suffix, replacement, &m_gt_0()));
    }
    steps.push(step2);

    // 3
    steps.push(vec![
        rule("[icate,ic]".into(), m_gt_0(), RCTX.into()),
        rule("[ative,_]".into(), m_gt_0(), RCTX.into()),
        rule("[alize,al]".into(), m_gt_0(), RCTX.into()),
        rule("[iciti,ic]".into(), m_gt_0(), RCTX.into()),
        rule("[ical,ic]".into(), m_gt_0(), RCTX.into()),
        rule("[ful,_]".into(), m_gt_0(), RCTX.into()),
        rule("[ness,_]".into(), m_gt_0(), RCTX.into()),
    ]);

    // 4
    let mut step4 = Vec::new();
    for suffix in [
        "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent",
    ] {
        step4.extend(suffix_pair(suffix, "_", &m_gt_1()));
    }
    step4.push(rule(
        "[ion,_]".into(),
        format!(
            "(({}{}|{}{}){}*{}{}(s|t))",
            c(),
            vc(),
            v_starting_non_y(),
            c(),
            vc(),
            v(),
            opt_c()
        ),
        RCTX.into(),
    ));
    step4.push(rule("[ion,ion]".into(), LCTX.into(), RCTX.into()));
    for suffix in ["ou", "ism", "ate", "iti", "ous", "ive", "ize"] {
        step4.extend(suffix_pair(suffix, "_", &m_gt_1()));
    }
    steps.push(step4);

    // 5a: the measure-one alternative for vowel-initial stems admits only
    // consonant endings, so a bare vowels-consonants-vowel stem keeps its
    // final e (agreed -> agree).
    steps.push(vec![
        rule("[e,_]".into(), m_gt_1(), RCTX.into()),
        rule(
            "[e,_]".into(),
            format!(
                "{WHITESPACE}(({}{})|({}{}{})|({}{}{}{}{})|({}{}(w|x|y))|({}{}{}{}{}))",
                v_starting_non_y(),
                c(),
                c(),
                vc(),
                v(),
                c(),
                v(),
                ALWAYS_VOWEL,
                c(),
                opt_v(),
                c(),
                v(),
                c(),
                v(),
                c(),
                ALWAYS_CONSONANT,
                opt_v()
            ),
            RCTX.into(),
        ),
    ]);

    // 5b: also deletes the end-of-word marker.
    steps.push(vec![
        rule(
            "[l\x02,_]".into(),
            format!(
                "(({}{}|{}{}){}*{}{}l)",
                c(),
                vc(),
                v_starting_non_y(),
                c(),
                vc(),
                v(),
                opt_c()
            ),
            WHITESPACE.into(),
        ),
        rule("[\x02,_]".into(), LCTX.into(), WHITESPACE.into()),
    ]);

    steps
}
