use resloc_core::{Decision, Result};
use resloc_services::ConfirmationPort;
use std::io::{BufRead, Write};

/// Asks on stderr and reads one answer per line. End of input means cancel.
pub struct ConsolePrompt<R> {
    input: R,
}

impl<R: BufRead> ConsolePrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

fn parse_answer(line: &str) -> Option<Decision> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Decision::Proceed),
        "n" | "no" => Some(Decision::Skip),
        "c" | "cancel" => Some(Decision::Cancel),
        _ => None,
    }
}

impl<R: BufRead> ConfirmationPort for ConsolePrompt<R> {
    fn decide(&mut self, message: &str) -> Result<Decision> {
        loop {
            eprint!("{message}\n[y]es / [n]o / [c]ancel: ");
            std::io::stderr().flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                tracing::debug!(event = "prompt_eof");
                return Ok(Decision::Cancel);
            }
            if let Some(decision) = parse_answer(&line) {
                tracing::debug!(event = "prompt_answer", decision = ?decision);
                return Ok(decision);
            }
        }
    }
}
