//! Command-Line Interface configuration.
//!

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

/// Build the Command-Line Interface application.
///
/// The structure of the command is organized follows: (1) parser settings,
/// (2) tool information, (3) positional arguments, (4) flags, and (5) options.
#[allow(clippy::let_and_return)]
pub fn build() -> Command {
    let cmd = Command::new(clap::crate_name!())
        .help_expected(true)
        .dont_collapse_args_in_usage(true)
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .long_about(
            "Contextual REplacement Bimachine (CREB) compiles a batch of \
	     contextual replacement rules into a bimachine and rewrites text \
	     with it line by line in a single forward pass.",
        )
        .after_help(
            "The use of `creb -h` prints a short and concise overview. Use \
	     `creb --help` for more details of its usage.",
        )
        .after_long_help(
            "The use of `creb --help` prints a long and verbose overview. \
	     Use `creb -h` for less details.",
        )
        .arg(
            Arg::new("RULES")
                .required(true)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(PathBuf))
                .help("The rule file: an alphabet line, then one rule per line"),
        )
        .arg(
            Arg::new("INPUT")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(PathBuf))
                .help("The text to rewrite"),
        )
        .arg(
            Arg::new("final-output")
                .short('f')
                .long("final-output")
                .action(ArgAction::SetTrue)
                .help("Use the final-output construction"),
        )
        .arg(
            Arg::new("dump")
                .short('d')
                .long("dump")
                .value_name("FILE")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write the compiled machine as JSON to FILE"),
        );

    cmd
}
