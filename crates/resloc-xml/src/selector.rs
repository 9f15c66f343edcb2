use std::str::FromStr;

use crate::XmlError;

/// A small path expression over element local names.
///
/// `//Textbox/Value` matches any `Value` whose parent is a `Textbox`,
/// `/root/data` matches only from the document element. Alternatives are
/// joined with `|`. Prefixes such as `def:` are accepted and ignored, and
/// `*` matches any single element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Pattern>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    anchored: bool,
    steps: Vec<String>,
}

impl Pattern {
    fn matches(&self, chain: &[&str]) -> bool {
        if chain.len() < self.steps.len() || (self.anchored && chain.len() != self.steps.len()) {
            return false;
        }
        let tail = &chain[chain.len() - self.steps.len()..];
        self.steps
            .iter()
            .zip(tail)
            .all(|(step, name)| step == "*" || step == name)
    }
}

impl Selector {
    /// `chain` holds local names from the document element down to the candidate.
    pub fn matches(&self, chain: &[&str]) -> bool {
        self.alternatives.iter().any(|p| p.matches(chain))
    }
}

impl FromStr for Selector {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| XmlError::Selector {
            selector: s.to_string(),
            reason: reason.to_string(),
        };

        let mut alternatives = Vec::new();
        for alt in s.split('|') {
            let alt = alt.trim();
            let (anchored, body) = if let Some(rest) = alt.strip_prefix("//") {
                (false, rest)
            } else if let Some(rest) = alt.strip_prefix('/') {
                (true, rest)
            } else {
                (false, alt)
            };
            if body.is_empty() {
                return Err(invalid("empty path"));
            }
            let mut steps = Vec::new();
            for step in body.split('/') {
                let step = step.trim();
                if step.is_empty() {
                    return Err(invalid("empty step"));
                }
                let local = step.rsplit(':').next().unwrap_or(step);
                if local.is_empty() || local.contains(['[', ']', '@']) {
                    return Err(invalid("only element names are supported in steps"));
                }
                steps.push(local.to_string());
            }
            alternatives.push(Pattern { anchored, steps });
        }
        Ok(Self { alternatives })
    }
}
