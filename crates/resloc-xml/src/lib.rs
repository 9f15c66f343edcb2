//! Owned, editable XML tree on top of `quick-xml` events.
//!
//! Nodes that are never edited are written back exactly as they were read,
//! so a document can be loaded, partially rewritten and saved without
//! reformatting the rest of the file.

mod document;
mod selector;

use std::path::PathBuf;

use thiserror::Error;

pub use document::{Document, Element, NodePath};
pub use selector::Selector;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed XML near byte {position}: {message}")]
    Parse { position: u64, message: String },
    #[error("document has no root element")]
    NoRoot,
    #[error("cannot serialize XML: {0}")]
    Serialize(String),
    #[error("no element at {0}")]
    NoSuchElement(NodePath),
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

impl XmlError {
    /// True when a create-new write hit an existing file.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            XmlError::Write { source, .. } if source.kind() == std::io::ErrorKind::AlreadyExists
        )
    }
}
