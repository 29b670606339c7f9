//! Narrow interfaces to the collaborators the ranking core depends on.

use crate::error::AccessError;
use crate::stats::FieldStatistics;
use crate::term::Term;
use crate::{DocId, Fields};

/// Read side of a postings store for one corpus snapshot.
///
/// Implementations guarantee every yielded posting has a frequency of at
/// least 1, and that `normalized_length` is defined for any document holding
/// a posting in `field`.
pub trait PostingsAccessor {
    /// `(document, raw frequency)` pairs for `term`; empty when the term is
    /// absent from the corpus.
    fn postings(&self, term: &Term) -> Result<Vec<(DocId, u32)>, AccessError>;

    fn document_frequency(&self, term: &Term) -> Result<u32, AccessError>;

    fn total_documents(&self) -> Result<u32, AccessError>;

    fn normalized_length(&self, doc: DocId, field: &str) -> Result<f64, AccessError>;

    /// Raw token count of `field` in `doc`.
    fn field_length(&self, doc: DocId, field: &str) -> Result<u32, AccessError>;

    /// Collection-wide totals of `field`, used by probabilistic similarities.
    fn field_statistics(&self, field: &str) -> Result<FieldStatistics, AccessError>;
}

/// Turns a raw query string into distinct terms bound to the scoring field.
pub trait QueryTermExtractor {
    fn extract_terms(&self, query: &str, field: &str) -> Result<Vec<Term>, AccessError>;
}

/// Write side used by indexing.
pub trait DocumentSink {
    fn add_document(&mut self, fields: Fields) -> Result<(), AccessError>;
}
