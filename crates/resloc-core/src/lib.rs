use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = color_eyre::eyre::Result<T>;

/// Original text to translated text, as read back from a translation table.
pub type TranslationMap = HashMap<String, String>;

/// A unique text found in report documents together with every place it was seen.
///
/// `occurrences` holds one entry per matching node, so a text used three times
/// in `Invoice.rdlc` lists `Invoice.rdlc` three times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableValue {
    pub text: String,
    pub occurrences: Vec<String>,
}

impl TranslatableValue {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            occurrences: Vec::new(),
        }
    }
}

/// One data row of the translation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub original: String,
    pub translated: String,
    pub occurrences: String,
}

impl From<&TranslatableValue> for TableRow {
    fn from(value: &TranslatableValue) -> Self {
        Self {
            original: value.text.clone(),
            translated: value.text.clone(),
            occurrences: value.occurrences.join(", "),
        }
    }
}

/// The three resource files involved in promoting one overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationTriple {
    /// Default-language file, rewritten in place.
    pub neutral: PathBuf,
    /// Overlay being promoted; disposed afterwards.
    pub import: PathBuf,
    /// New file receiving the previous neutral values.
    pub export: PathBuf,
}

impl RotationTriple {
    pub fn new(
        neutral: impl Into<PathBuf>,
        import: impl Into<PathBuf>,
        export: impl Into<PathBuf>,
    ) -> Self {
        Self {
            neutral: neutral.into(),
            import: import.into(),
            export: export.into(),
        }
    }
}

/// Answer of a confirmation port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip,
    Cancel,
}

/// Typed failures the command surface maps to exit codes.
/// Anything else travelling in an `eyre::Report` is an unexpected error.
#[derive(Debug, Error)]
pub enum ResLocError {
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),
    #[error("cancelled by user: {0}")]
    UserCancelled(String),
    #[error("cannot update node {node} in {document}: {reason}")]
    NodeMutation {
        document: String,
        node: String,
        reason: String,
    },
}

impl ResLocError {
    pub fn file_exists(what: &str, path: &Path) -> Self {
        Self::PreconditionViolation(format!(
            "{what} already exists, will not overwrite: {}",
            path.display()
        ))
    }

    pub fn file_missing(what: &str, path: &Path) -> Self {
        Self::PreconditionViolation(format!("{what} does not exist: {}", path.display()))
    }
}

/// Find the typed error inside a report, if any.
pub fn classify(err: &color_eyre::eyre::Report) -> Option<&ResLocError> {
    err.chain().find_map(|e| e.downcast_ref::<ResLocError>())
}
