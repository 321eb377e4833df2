//! CREB application.
//!

use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};

use clap::ArgMatches;
use creb::bimachine::{self, Rewrite};
use creb::config::Configuration;
use creb::rule::{self, ReplacementRule};

pub struct App {
    matches: ArgMatches,
}

impl App {
    pub fn new(matches: ArgMatches) -> Self {
        Self { matches }
    }

    /// Run the creb application.
    ///
    /// This method compiles the rule file into the selected bimachine
    /// construction and rewrites the input line by line.
    pub fn run(&self) -> Result<(), Box<dyn Error>> {
        let config = self.configure()?;

        let source = fs::read_to_string(config.rules)?;
        let (alphabet, rules) = parse_rules(&source)?;
        let batch = rule::compile_batch(&rules, alphabet.as_bytes())?;

        // Load the text to rewrite.
        //
        // For the common filter-style usage the text arrives on standard
        // input; a path argument reads the whole file instead.
        let text = match config.input {
            Some(path) => fs::read(path)?,
            None => {
                let mut buffer = Vec::new();
                io::stdin().read_to_end(&mut buffer)?;
                buffer
            }
        };

        let stdout = io::stdout();
        let mut out = stdout.lock();
        if config.final_output {
            let machine = bimachine::build_with_final_output(batch)?;
            if let Some(path) = config.dump {
                fs::write(path, serde_json::to_string(&machine)?)?;
            }
            rewrite_lines(&machine, &text, &mut out)?;
        } else {
            let machine = bimachine::build_two_step(batch)?;
            if let Some(path) = config.dump {
                fs::write(path, serde_json::to_string(&machine)?)?;
            }
            rewrite_lines(&machine, &text, &mut out)?;
        }

        Ok(())
    }

    /// Create a [`Configuration`] from the CLI arguments.
    fn configure(&self) -> Result<Configuration, Box<dyn Error>> {
        Ok(Configuration {
            rules: self.matches.get_one("RULES").unwrap(),
            input: self.matches.get_one("INPUT"),
            final_output: self.matches.get_flag("final-output"),
            dump: self.matches.get_one("dump"),
        })
    }
}

/// Rewrite every input line, preserving the line structure.
fn rewrite_lines(
    machine: &impl Rewrite,
    text: &[u8],
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    let mut lines = text.split(|&c| c == b'\n').peekable();
    while let Some(line) = lines.next() {
        // A trailing newline produces one empty final segment; skip it
        // rather than rewriting a phantom empty line.
        if line.is_empty() && lines.peek().is_none() {
            break;
        }
        let rewritten = machine.apply(line)?;
        out.write_all(&rewritten)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Parse the rule file: an alphabet line, then one rule per non-empty line
/// given as three quoted regular expressions.
fn parse_rules(source: &str) -> Result<(String, Vec<ReplacementRule>), AppError> {
    let mut lines = source.lines();
    let alphabet = lines
        .next()
        .ok_or_else(|| AppError::from("empty rule file"))?
        .to_string();

    let mut rules = Vec::new();
    for (no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields =
            quoted_fields(line).map_err(|msg| AppError::from(format!("line {}: {}", no + 2, msg)))?;
        match <[Vec<u8>; 3]>::try_from(fields) {
            Ok([center, left, right]) => rules.push(ReplacementRule::new(center, left, right)),
            Err(_) => {
                return Err(AppError::from(format!(
                    "line {}: expected three quoted expressions",
                    no + 2
                )))
            }
        }
    }
    Ok((alphabet, rules))
}

/// Split a line into its quoted fields, honoring backslash escapes.
fn quoted_fields(line: &str) -> Result<Vec<Vec<u8>>, String> {
    let bytes = line.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if bytes[i] != b'"' {
            return Err(format!("expected opening quote at column {}", i + 1));
        }
        i += 1;
        let mut field = Vec::new();
        loop {
            match bytes.get(i) {
                Some(b'"') => {
                    i += 1;
                    break;
                }
                Some(b'\\') => {
                    let escaped = bytes
                        .get(i + 1)
                        .ok_or_else(|| String::from("dangling escape"))?;
                    field.push(*escaped);
                    i += 2;
                }
                Some(&c) => {
                    field.push(c);
                    i += 1;
                }
                None => return Err(String::from("unterminated quote")),
            }
        }
        fields.push(field);
    }
    Ok(fields)
}

#[derive(Debug, Clone)]
struct AppError {
    msg: String,
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError {
            msg: msg.to_string(),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError { msg }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "app: {}", self.msg)
    }
}

impl Error for AppError {}
