//! # Contextual Replacement Bimachine Compiler Tool
//!
//! Contextual REplacement Bimachine (CREB) is a tool that compiles a batch
//! of contextual replacement rules into a bimachine and rewrites text with
//! it in a single forward pass.
//!

use std::process;

mod app;
mod cli;

use crate::app::App;

fn main() {
    let app = App::new(cli::build().get_matches());

    match app.run() {
        Ok(..) => process::exit(0),
        Err(e) => {
            eprintln!("creb: error: {}", e);
            process::exit(1);
        }
    }
}
