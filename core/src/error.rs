//! Error types for query evaluation, corpus parsing and postings access.

use crate::term::Term;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

/// A document-local failure while scanning a tagged corpus.
///
/// The parser reports these and keeps scanning; they never abort a stream.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A begin-marker was opened and the stream ended before its end-marker.
    #[error("document starting at line {line} has no closing marker before end of stream")]
    Unterminated { line: usize },

    /// A second begin-marker appeared before the current document was closed.
    #[error("document starting at line {line} was interrupted by a new document at line {next}")]
    Nested { line: usize, next: usize },

    /// An end-marker with no open document.
    #[error("stray closing marker at line {line}")]
    Stray { line: usize },

    /// A field declared as required matched nothing.
    #[error("document starting at line {line} is missing required field {field}")]
    MissingField { line: usize, field: String },

    #[error("I/O error while reading corpus: {0}")]
    Io(#[from] io::Error),
}

/// Failure raised by a postings store or query term extractor.
#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct AccessError {
    pub operation: &'static str,
    pub message: String,
}

impl AccessError {
    pub fn new(operation: &'static str, message: impl ToString) -> Self {
        Self { operation, message: message.to_string() }
    }
}

/// Errors that abort a whole query evaluation.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Rejected before any scoring work began.
    #[error("invalid query configuration: {0}")]
    InvalidConfiguration(String),

    /// The postings store failed; no partial results are returned.
    #[error("postings access failed for {}: {source}", .term.as_ref().map_or_else(|| "<corpus>".to_string(), Term::to_string))]
    Accessor {
        term: Option<Term>,
        #[source]
        source: AccessError,
    },

    #[error("query term extraction failed: {0}")]
    Extractor(#[source] AccessError),
}

impl SearchError {
    pub(crate) fn accessor(term: Option<&Term>, source: AccessError) -> Self {
        Self::Accessor { term: term.cloned(), source }
    }
}
