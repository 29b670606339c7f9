pub mod analyzer;
pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod postings;
pub mod run;
pub mod scorer;
pub mod search;
pub mod stats;
pub mod term;
pub mod topics;
pub mod topk;

pub use analyzer::Analyzer;
pub use config::{AnalyzerConfig, AnalyzerKind, FieldSpec, LengthNorm, Schema, SearchConfig, Similarity};
pub use error::{AccessError, ParseError, Result, SearchError};
pub use index::{InvertedIndex, StoredDocument};
pub use postings::{DocumentSink, PostingsAccessor, QueryTermExtractor};
pub use search::{evaluate, search, Ranking};
pub use term::Term;
pub use topk::{ScoredDocument, TopK};

/// Opaque document identifier assigned by the postings store.
pub type DocId = u32;
pub type TermId = u32;

/// Field name → extracted text, as produced by the corpus parser.
pub type Fields = std::collections::BTreeMap<String, String>;
