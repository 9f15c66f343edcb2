use resloc_core::{Decision, Result};
use std::collections::VecDeque;

/// Source of yes / no / cancel answers before each step that needs consent.
pub trait ConfirmationPort {
    fn decide(&mut self, message: &str) -> Result<Decision>;
}

/// Answers `Proceed` to everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysProceed;

impl ConfirmationPort for AlwaysProceed {
    fn decide(&mut self, message: &str) -> Result<Decision> {
        tracing::debug!(event = "auto_confirm", message = %message);
        Ok(Decision::Proceed)
    }
}

/// Replays a fixed list of answers and records every question asked.
/// Once the list runs out it answers `Cancel`.
#[derive(Debug, Default, Clone)]
pub struct Scripted {
    answers: VecDeque<Decision>,
    pub asked: Vec<String>,
}

impl Scripted {
    pub fn new(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

impl ConfirmationPort for Scripted {
    fn decide(&mut self, message: &str) -> Result<Decision> {
        self.asked.push(message.to_string());
        Ok(self.answers.pop_front().unwrap_or(Decision::Cancel))
    }
}
