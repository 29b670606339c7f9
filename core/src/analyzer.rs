use crate::config::{AnalyzerConfig, AnalyzerKind};
use crate::error::AccessError;
use crate::postings::QueryTermExtractor;
use crate::term::Term;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}\p{N}]+)*").expect("valid regex");
    static ref LETTER_RE: Regex = Regex::new(r"\p{L}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","an","and","are","as","at","be","but","by","for","if","in","into","is","it",
            "no","not","of","on","or","such","that","the","their","then","there","these",
            "they","this","to","was","will","with",
        ];
        words.iter().copied().collect()
    };
}

/// Text analyzer shared by indexing and querying.
///
/// Every kind except `Keyword` applies NFKC normalization and lowercasing
/// before splitting; stemming runs last when enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.config
    }

    /// Normalized tokens of `text` in order, repeats included.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let (splitter, drop_stopwords): (&Regex, bool) = match self.config.kind {
            AnalyzerKind::Keyword => {
                return if text.trim().is_empty() { Vec::new() } else { vec![text.to_string()] };
            }
            AnalyzerKind::Standard => (&*TOKEN_RE, true),
            AnalyzerKind::Simple => (&*LETTER_RE, false),
            AnalyzerKind::Stop => (&*LETTER_RE, true),
        };
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        splitter
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|tok| !(drop_stopwords && STOPWORDS.contains(*tok)))
            .map(|tok| if self.config.stem { STEMMER.stem(tok).into_owned() } else { tok.to_string() })
            .collect()
    }
}

impl QueryTermExtractor for Analyzer {
    /// Distinct terms in first-occurrence order.
    fn extract_terms(&self, query: &str, field: &str) -> Result<Vec<Term>, AccessError> {
        let mut seen = HashSet::new();
        Ok(self
            .tokens(query)
            .into_iter()
            .filter(|tok| seen.insert(tok.clone()))
            .map(|tok| Term::new(field, tok))
            .collect())
    }
}
