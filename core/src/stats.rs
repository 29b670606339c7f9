//! Per-query term statistics: postings rows and inverse document frequency.

use crate::error::{Result, SearchError};
use crate::postings::PostingsAccessor;
use crate::term::Term;
use crate::DocId;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Term → document → raw frequency. Rows never hold a zero frequency.
pub type TermFrequencyMap = HashMap<Term, HashMap<DocId, u32>>;

/// `ln(1 + total_docs / doc_freq)`, or 0 for a term no document contains.
///
/// The ratio is taken in floating point. Truncating `total_docs / doc_freq`
/// to an integer first gives different values, and different rankings, for
/// any term whose document frequency does not divide the corpus size.
pub fn idf(total_docs: u32, doc_freq: u32) -> f64 {
    if doc_freq == 0 {
        return 0.0;
    }
    (1.0 + total_docs as f64 / doc_freq as f64).ln()
}

/// Okapi BM25 inverse document frequency,
/// `ln(1 + (total_docs - doc_freq + 0.5) / (doc_freq + 0.5))`.
pub fn bm25_idf(total_docs: u32, doc_freq: u32) -> f64 {
    let (n, df) = (total_docs as f64, doc_freq as f64);
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Totals of one field across the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldStatistics {
    /// Documents with at least one token in the field.
    pub doc_count: u32,
    /// Tokens in the field over all documents.
    pub total_tokens: u64,
}

impl FieldStatistics {
    pub fn average_length(&self) -> f64 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_tokens as f64 / self.doc_count as f64
    }

    /// Smoothed probability of a term with `collection_freq` occurrences
    /// under the collection language model.
    pub fn collection_probability(&self, collection_freq: u64) -> f64 {
        (collection_freq as f64 + 1.0) / (self.total_tokens as f64 + 1.0)
    }
}

/// Statistics gathered once per query over the distinct query terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermStatistics {
    /// Distinct terms in first-occurrence order.
    pub terms: Vec<Term>,
    pub frequencies: TermFrequencyMap,
    pub idf: HashMap<Term, f64>,
    pub total_docs: u32,
}

struct TermRow {
    postings: HashMap<DocId, u32>,
    idf: f64,
}

fn dedup(terms: &[Term]) -> Vec<Term> {
    let mut seen = HashSet::new();
    terms.iter().filter(|t| seen.insert(*t)).cloned().collect()
}

fn gather_row<A: PostingsAccessor + ?Sized>(accessor: &A, term: &Term, total_docs: u32) -> Result<TermRow> {
    let postings: HashMap<DocId, u32> = accessor
        .postings(term)
        .map_err(|e| SearchError::accessor(Some(term), e))?
        .into_iter()
        .filter(|&(_, freq)| freq > 0)
        .collect();
    let doc_freq = postings.len() as u32;
    let idf = idf(total_docs, doc_freq);
    tracing::debug!(term = %term, doc_freq, idf, "term statistics");
    Ok(TermRow { postings, idf })
}

impl TermStatistics {
    /// Enumerate postings for each distinct term, one term at a time.
    pub fn gather<A: PostingsAccessor + ?Sized>(terms: &[Term], accessor: &A) -> Result<Self> {
        let terms = dedup(terms);
        let total_docs = accessor.total_documents().map_err(|e| SearchError::accessor(None, e))?;
        let rows = terms
            .iter()
            .map(|t| gather_row(accessor, t, total_docs))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(terms, rows, total_docs))
    }

    /// Same result as [`gather`](Self::gather), with terms enumerated on the
    /// rayon pool.
    pub fn gather_parallel<A: PostingsAccessor + Sync + ?Sized>(terms: &[Term], accessor: &A) -> Result<Self> {
        let terms = dedup(terms);
        let total_docs = accessor.total_documents().map_err(|e| SearchError::accessor(None, e))?;
        let rows = terms
            .par_iter()
            .map(|t| gather_row(accessor, t, total_docs))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(terms, rows, total_docs))
    }

    fn assemble(terms: Vec<Term>, rows: Vec<TermRow>, total_docs: u32) -> Self {
        let mut frequencies = TermFrequencyMap::with_capacity(terms.len());
        let mut idf = HashMap::with_capacity(terms.len());
        for (term, row) in terms.iter().zip(rows) {
            frequencies.insert(term.clone(), row.postings);
            idf.insert(term.clone(), row.idf);
        }
        Self { terms, frequencies, idf, total_docs }
    }

    pub fn doc_frequency(&self, term: &Term) -> u32 {
        self.frequencies.get(term).map_or(0, |row| row.len() as u32)
    }

    pub fn idf(&self, term: &Term) -> f64 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    /// Occurrences of `term` over the whole collection.
    pub fn collection_frequency(&self, term: &Term) -> u64 {
        self.frequencies.get(term).map_or(0, |row| row.values().map(|&f| f as u64).sum())
    }

    /// Union of every term's posting documents, ascending.
    pub fn candidates(&self) -> Vec<DocId> {
        let mut docs: Vec<DocId> = self
            .frequencies
            .values()
            .flat_map(|row| row.keys().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        docs.sort_unstable();
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;

    struct Fixed {
        rows: HashMap<String, Vec<(DocId, u32)>>,
        total: u32,
    }

    impl PostingsAccessor for Fixed {
        fn postings(&self, term: &Term) -> std::result::Result<Vec<(DocId, u32)>, AccessError> {
            Ok(self.rows.get(&term.text).cloned().unwrap_or_default())
        }
        fn document_frequency(&self, term: &Term) -> std::result::Result<u32, AccessError> {
            Ok(self.rows.get(&term.text).map_or(0, |r| r.len() as u32))
        }
        fn total_documents(&self) -> std::result::Result<u32, AccessError> {
            Ok(self.total)
        }
        fn normalized_length(&self, _doc: DocId, _field: &str) -> std::result::Result<f64, AccessError> {
            Ok(1.0)
        }
        fn field_length(&self, _doc: DocId, _field: &str) -> std::result::Result<u32, AccessError> {
            Ok(1)
        }
        fn field_statistics(&self, _field: &str) -> std::result::Result<FieldStatistics, AccessError> {
            Ok(FieldStatistics { doc_count: self.total, total_tokens: self.total as u64 })
        }
    }

    fn fixed() -> Fixed {
        let mut rows = HashMap::new();
        rows.insert("rare".to_string(), vec![(3, 2)]);
        rows.insert("common".to_string(), vec![(1, 1), (2, 4), (3, 1), (5, 1)]);
        Fixed { rows, total: 10 }
    }

    fn t(s: &str) -> Term {
        Term::new("TEXT", s)
    }

    #[test]
    fn idf_formula_and_absent_terms() {
        assert_eq!(idf(10, 0), 0.0);
        assert!((idf(10, 4) - (1.0f64 + 2.5).ln()).abs() < 1e-12);
        assert!(idf(10, 4) > (1.0f64 + (10 / 4) as f64).ln());
        let stats = TermStatistics::gather(&[t("rare"), t("ghost")], &fixed()).unwrap();
        assert_eq!(stats.idf(&t("ghost")), 0.0);
        assert!(stats.frequencies[&t("ghost")].is_empty());
        assert_eq!(stats.doc_frequency(&t("rare")), 1);
    }

    #[test]
    fn idf_does_not_increase_with_doc_freq() {
        let stats = TermStatistics::gather(&[t("rare"), t("common")], &fixed()).unwrap();
        assert!(stats.idf(&t("rare")) >= stats.idf(&t("common")));
        for df in 1..50 {
            assert!(idf(100, df) >= idf(100, df + 1));
        }
    }

    #[test]
    fn bm25_idf_and_collection_model() {
        assert!((bm25_idf(10, 4) - (1.0f64 + 6.5 / 4.5).ln()).abs() < 1e-12);
        assert!(bm25_idf(10, 10) > 0.0);
        let stats = TermStatistics::gather(&[t("common")], &fixed()).unwrap();
        assert_eq!(stats.collection_frequency(&t("common")), 7);
        assert_eq!(stats.collection_frequency(&t("ghost")), 0);
        let field = FieldStatistics { doc_count: 4, total_tokens: 19 };
        assert_eq!(field.average_length(), 4.75);
        assert_eq!(field.collection_probability(7), 0.4);
        assert_eq!(FieldStatistics::default().average_length(), 0.0);
    }

    #[test]
    fn repeated_terms_are_gathered_once() {
        let stats = TermStatistics::gather(&[t("common"), t("rare"), t("common")], &fixed()).unwrap();
        assert_eq!(stats.terms, vec![t("common"), t("rare")]);
        assert_eq!(stats.frequencies.len(), 2);
        assert_eq!(stats.candidates(), vec![1, 2, 3, 5]);
    }

    #[test]
    fn gathering_is_idempotent_and_parallel_agrees() {
        let terms = [t("common"), t("rare"), t("ghost")];
        let a = TermStatistics::gather(&terms, &fixed()).unwrap();
        let b = TermStatistics::gather(&terms, &fixed()).unwrap();
        let c = TermStatistics::gather_parallel(&terms, &fixed()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }
}
