// src/core/proof/mod.rs
pub mod extractor;

use thiserror::Error;

pub use extractor::{extract, AttributeValue, VerifiedAttributes};

/// A proof record that does not have the expected nesting. Extraction
/// degrades to unknown values instead of surfacing this to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofShapeError {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("unexpected type at: {0}")]
    UnexpectedType(String),
}
