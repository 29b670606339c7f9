//! Explicit configuration values passed into indexing and query evaluation.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_FIELD: &str = "TEXT";
pub const DEFAULT_K: usize = 1000;

/// Per-query settings. Nothing here is global; every evaluation call gets one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Field whose postings are scored.
    pub field: String,
    /// Number of ranked results to keep. Zero is rejected by `validate`.
    pub k: usize,
    /// Number of candidate chunks scored in parallel; 1 scores sequentially.
    pub partitions: usize,
    pub similarity: Similarity,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { field: DEFAULT_FIELD.to_string(), k: DEFAULT_K, partitions: 1, similarity: Similarity::default() }
    }
}

impl SearchConfig {
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.k == 0 {
            return Err(SearchError::InvalidConfiguration("top-k must be at least 1".into()));
        }
        if self.field.trim().is_empty() {
            return Err(SearchError::InvalidConfiguration("scoring field must not be empty".into()));
        }
        if self.partitions == 0 {
            return Err(SearchError::InvalidConfiguration("partitions must be at least 1".into()));
        }
        self.similarity.validate()
    }
}

/// Scoring function applied per matching query term and summed per document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Similarity {
    /// `(freq / normalized length) * ln(1 + N / df)`, with the index's length norm.
    #[default]
    #[serde(rename = "tfidf")]
    TfIdf,
    /// Okapi BM25 over raw field lengths.
    Bm25 { k1: f64, b: f64 },
    /// Query likelihood with Dirichlet smoothing.
    LmDirichlet { mu: f64 },
    /// Query likelihood with Jelinek-Mercer smoothing; `lambda` weighs the
    /// collection model.
    LmJelinekMercer { lambda: f64 },
}

impl Similarity {
    pub const BM25: Similarity = Similarity::Bm25 { k1: 1.2, b: 0.75 };
    pub const LM_DIRICHLET: Similarity = Similarity::LmDirichlet { mu: 2000.0 };
    pub const LM_JELINEK_MERCER: Similarity = Similarity::LmJelinekMercer { lambda: 0.7 };

    /// Short label used in run ids and run file names.
    pub fn label(&self) -> &'static str {
        match self {
            Similarity::TfIdf => "TFIDF",
            Similarity::Bm25 { .. } => "BM25",
            Similarity::LmDirichlet { .. } => "LMDS",
            Similarity::LmJelinekMercer { .. } => "LMJMS",
        }
    }

    /// Whether scoring needs raw field lengths and collection totals rather
    /// than the normalized length alone.
    pub fn uses_collection_model(&self) -> bool {
        !matches!(self, Similarity::TfIdf)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        let ok = match *self {
            Similarity::TfIdf => true,
            Similarity::Bm25 { k1, b } => k1.is_finite() && k1 >= 0.0 && (0.0..=1.0).contains(&b),
            Similarity::LmDirichlet { mu } => mu.is_finite() && mu > 0.0,
            Similarity::LmJelinekMercer { lambda } => lambda > 0.0 && lambda <= 1.0,
        };
        if ok {
            Ok(())
        } else {
            Err(SearchError::InvalidConfiguration(format!("invalid similarity parameters: {self:?}")))
        }
    }
}

impl std::str::FromStr for Similarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tfidf" => Ok(Similarity::TfIdf),
            "bm25" => Ok(Similarity::BM25),
            "lmds" | "lm-dirichlet" => Ok(Similarity::LM_DIRICHLET),
            "lmjms" | "lm-jelinek-mercer" => Ok(Similarity::LM_JELINEK_MERCER),
            other => Err(format!("unknown similarity: {other}")),
        }
    }
}

/// Length normalization applied to a field's token count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthNorm {
    /// `1 / sqrt(length)`, the classic vector-space norm.
    #[default]
    Classic,
    /// The raw token count.
    Linear,
    /// Every document weighs 1.0.
    Constant,
}

impl LengthNorm {
    /// Normalized length for a field holding `tokens` tokens. A field with no
    /// tokens has no defined length and yields 0.0, which the scorer rejects.
    pub fn apply(self, tokens: u32) -> f64 {
        if tokens == 0 {
            return 0.0;
        }
        match self {
            LengthNorm::Classic => 1.0 / (tokens as f64).sqrt(),
            LengthNorm::Linear => tokens as f64,
            LengthNorm::Constant => 1.0,
        }
    }
}

impl std::str::FromStr for LengthNorm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(LengthNorm::Classic),
            "linear" => Ok(LengthNorm::Linear),
            "constant" => Ok(LengthNorm::Constant),
            other => Err(format!("unknown length norm: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// A document whose required field matched nothing is a parse error.
    pub required: bool,
    /// Indexed fields are analyzed into postings; all fields are stored.
    pub indexed: bool,
}

impl FieldSpec {
    pub fn stored(name: &str) -> Self {
        Self { name: name.to_string(), required: false, indexed: false }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Ordered list of fields extracted from every document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// DOCNO (required), HEAD, BYLINE, DATELINE and an indexed TEXT body.
    pub fn trec() -> Self {
        Self::new(vec![
            FieldSpec::stored("DOCNO").required(),
            FieldSpec::stored("HEAD"),
            FieldSpec::stored("BYLINE"),
            FieldSpec::stored("DATELINE"),
            FieldSpec::stored("TEXT").indexed(),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn indexed(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.indexed)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::trec()
    }
}

/// Tokenization chain applied to field text and queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Letter and digit runs, lowercased, stopwords removed.
    #[default]
    Standard,
    /// Letter runs only, lowercased.
    Simple,
    /// Letter runs, lowercased, stopwords removed.
    Stop,
    /// The whole text as a single untouched token.
    Keyword,
}

impl std::str::FromStr for AnalyzerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(AnalyzerKind::Standard),
            "simple" => Ok(AnalyzerKind::Simple),
            "stop" => Ok(AnalyzerKind::Stop),
            "keyword" => Ok(AnalyzerKind::Keyword),
            other => Err(format!("unknown analyzer: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub kind: AnalyzerKind,
    /// English Snowball stemming. Ignored by the keyword analyzer.
    pub stem: bool,
}

impl AnalyzerConfig {
    pub fn new(kind: AnalyzerKind, stem: bool) -> Self {
        Self { kind, stem }
    }

    /// The given chain without stemming.
    pub fn unstemmed(kind: AnalyzerKind) -> Self {
        Self::new(kind, false)
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { kind: AnalyzerKind::Standard, stem: true }
    }
}
