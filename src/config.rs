//! Application-specific configurations.
//!

use std::path::PathBuf;

/// Configuration information for the application.
///
/// This information does not capture the subcommands used---just flags,
/// options, and arguments.
pub struct Configuration<'a> {
    /// The rule file: an alphabet line followed by one rule per line.
    pub rules: &'a PathBuf,

    /// The text to rewrite. If this is `None`, then it is assumed the source
    /// is standard input.
    pub input: Option<&'a PathBuf>,

    /// Use the final-output construction instead of the two-step one.
    pub final_output: bool,

    /// Write the compiled machine as JSON to this path.
    pub dump: Option<&'a PathBuf>,
}
