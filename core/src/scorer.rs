//! Per-document scoring under a configurable similarity.
//!
//! The default is length-normalized TF-IDF,
//! `score(d) = Σ_t (freq(t, d) / len(d)) * idf(t)` over the distinct query
//! terms with a posting in `d`. Whatever the similarity, only documents in
//! the union of the terms' posting rows are scored.

use crate::config::Similarity;
use crate::error::{Result, SearchError};
use crate::postings::PostingsAccessor;
use crate::stats::{bm25_idf, FieldStatistics, TermStatistics};
use crate::topk::{ScoredDocument, TopK};
use crate::DocId;
use serde::Serialize;
use std::collections::HashMap;

/// A document dropped from scoring because its length was not a positive
/// finite number, or its score came out non-finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anomaly {
    pub doc_id: DocId,
    pub value: f64,
}

/// Output of one scoring pass.
#[derive(Debug, Clone)]
pub struct ScorePass {
    pub top: TopK,
    pub anomalies: Vec<Anomaly>,
}

/// Scores candidates of one query over one field.
pub struct Scorer<'a, A: ?Sized> {
    stats: &'a TermStatistics,
    accessor: &'a A,
    field: &'a str,
    similarity: Similarity,
    collection: FieldStatistics,
    /// Per-term factor aligned with `stats.terms`: the IDF for TF-IDF and
    /// BM25, the collection probability for the language models.
    term_model: Vec<f64>,
    lengths: HashMap<DocId, f64>,
}

impl<'a, A: PostingsAccessor + ?Sized> Scorer<'a, A> {
    /// TF-IDF scorer over the accessor's normalized lengths.
    pub fn new(stats: &'a TermStatistics, accessor: &'a A, field: &'a str) -> Self {
        let term_model = stats.terms.iter().map(|t| stats.idf(t)).collect();
        Self {
            stats,
            accessor,
            field,
            similarity: Similarity::TfIdf,
            collection: FieldStatistics::default(),
            term_model,
            lengths: HashMap::new(),
        }
    }

    /// Switch to `similarity`. `collection` holds the field totals and is
    /// only read by the BM25 and language-model similarities.
    pub fn with_similarity(mut self, similarity: Similarity, collection: FieldStatistics) -> Self {
        let stats = self.stats;
        self.term_model = stats
            .terms
            .iter()
            .map(|t| match similarity {
                Similarity::TfIdf => stats.idf(t),
                Similarity::Bm25 { .. } => bm25_idf(stats.total_docs, stats.doc_frequency(t)),
                Similarity::LmDirichlet { .. } | Similarity::LmJelinekMercer { .. } => {
                    collection.collection_probability(stats.collection_frequency(t))
                }
            })
            .collect();
        self.similarity = similarity;
        self.collection = collection;
        self.lengths.clear();
        self
    }

    fn document_length(&mut self, doc: DocId) -> Result<f64> {
        if let Some(&len) = self.lengths.get(&doc) {
            return Ok(len);
        }
        let len = if self.similarity.uses_collection_model() {
            self.accessor.field_length(doc, self.field).map(f64::from)
        } else {
            self.accessor.normalized_length(doc, self.field)
        }
        .map_err(|e| SearchError::accessor(None, e))?;
        self.lengths.insert(doc, len);
        Ok(len)
    }

    fn term_weight(&self, model: f64, freq: u32, len: f64) -> f64 {
        let tf = freq as f64;
        match self.similarity {
            Similarity::TfIdf => tf / len * model,
            Similarity::Bm25 { k1, b } => {
                let norm = k1 * (1.0 - b + b * len / self.collection.average_length());
                model * tf / (tf + norm)
            }
            Similarity::LmDirichlet { mu } => ((1.0 + tf / (mu * model)).ln() + (mu / (len + mu)).ln()).max(0.0),
            Similarity::LmJelinekMercer { lambda } => (1.0 + (1.0 - lambda) * (tf / len) / (lambda * model)).ln(),
        }
    }

    /// Score of `doc`, or `Err(anomaly)` inside `Ok` when the document has to
    /// be skipped.
    pub fn score(&mut self, doc: DocId) -> Result<std::result::Result<f64, Anomaly>> {
        let len = self.document_length(doc)?;
        if !(len.is_finite() && len > 0.0) {
            return Ok(Err(Anomaly { doc_id: doc, value: len }));
        }
        let mut total = 0.0;
        for (term, &model) in self.stats.terms.iter().zip(&self.term_model) {
            if let Some(&freq) = self.stats.frequencies.get(term).and_then(|row| row.get(&doc)) {
                total += self.term_weight(model, freq, len);
            }
        }
        if !total.is_finite() {
            return Ok(Err(Anomaly { doc_id: doc, value: total }));
        }
        Ok(Ok(total))
    }

    /// Score `docs` into a fresh selector of size `k`.
    pub fn score_into(&mut self, docs: &[DocId], k: usize) -> Result<ScorePass> {
        let mut top = TopK::new(k);
        let mut anomalies = Vec::new();
        for &doc in docs {
            match self.score(doc)? {
                Ok(score) => {
                    top.push(ScoredDocument::new(doc, score));
                }
                Err(anomaly) => {
                    tracing::warn!(doc_id = doc, value = anomaly.value, field = self.field, similarity = self.similarity.label(), "excluding document with invalid length or score");
                    anomalies.push(anomaly);
                }
            }
        }
        Ok(ScorePass { top, anomalies })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::term::Term;

    struct Synthetic {
        rows: HashMap<Term, Vec<(DocId, u32)>>,
        lengths: HashMap<DocId, f64>,
        tokens: HashMap<DocId, u32>,
        total: u32,
    }

    impl PostingsAccessor for Synthetic {
        fn postings(&self, term: &Term) -> std::result::Result<Vec<(DocId, u32)>, AccessError> {
            Ok(self.rows.get(term).cloned().unwrap_or_default())
        }
        fn document_frequency(&self, term: &Term) -> std::result::Result<u32, AccessError> {
            Ok(self.rows.get(term).map_or(0, |r| r.len() as u32))
        }
        fn total_documents(&self) -> std::result::Result<u32, AccessError> {
            Ok(self.total)
        }
        fn normalized_length(&self, doc: DocId, _field: &str) -> std::result::Result<f64, AccessError> {
            self.lengths.get(&doc).copied().ok_or_else(|| AccessError::new("normalized_length", "unknown doc"))
        }
        fn field_length(&self, doc: DocId, _field: &str) -> std::result::Result<u32, AccessError> {
            self.tokens.get(&doc).copied().ok_or_else(|| AccessError::new("field_length", "unknown doc"))
        }
        fn field_statistics(&self, _field: &str) -> std::result::Result<FieldStatistics, AccessError> {
            Ok(FieldStatistics { doc_count: 4, total_tokens: 40 })
        }
    }

    fn t(s: &str) -> Term {
        Term::new("TEXT", s)
    }

    fn synthetic() -> Synthetic {
        let mut rows = HashMap::new();
        rows.insert(t("oil"), vec![(0, 3), (1, 1)]);
        rows.insert(t("spill"), vec![(1, 2), (2, 5)]);
        let lengths = [(0, 0.5), (1, 0.25), (2, 2.0)].into_iter().collect();
        let tokens = [(0, 4), (1, 16), (2, 10)].into_iter().collect();
        Synthetic { rows, lengths, tokens, total: 8 }
    }

    #[test]
    fn matches_direct_computation() {
        let acc = synthetic();
        let stats = TermStatistics::gather(&[t("oil"), t("spill")], &acc).unwrap();
        let (oil, spill) = ((1.0f64 + 4.0).ln(), (1.0f64 + 4.0).ln());
        let mut scorer = Scorer::new(&stats, &acc, "TEXT");
        let expected = [
            (0, 3.0 / 0.5 * oil),
            (1, 1.0 / 0.25 * oil + 2.0 / 0.25 * spill),
            (2, 5.0 / 2.0 * spill),
        ];
        for (doc, want) in expected {
            let got = scorer.score(doc).unwrap().unwrap();
            assert!((got - want).abs() < 1e-12, "doc {doc}: {got} != {want}");
        }
    }

    fn scores_under(similarity: Similarity) -> Vec<f64> {
        let acc = synthetic();
        let stats = TermStatistics::gather(&[t("oil"), t("spill")], &acc).unwrap();
        let collection = acc.field_statistics("TEXT").unwrap();
        let mut scorer = Scorer::new(&stats, &acc, "TEXT").with_similarity(similarity, collection);
        (0..3).map(|doc| scorer.score(doc).unwrap().unwrap()).collect()
    }

    fn assert_close(got: &[f64], want: &[f64]) {
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-12, "{got:?} != {want:?}");
        }
    }

    #[test]
    fn bm25_uses_raw_lengths_and_average() {
        // N = 8, df = 2 for both terms, average length 40 / 4 = 10
        let idf = (1.0f64 + 6.5 / 2.5).ln();
        let w = |tf: f64, len: f64| idf * tf / (tf + 1.2 * (0.25 + 0.75 * len / 10.0));
        let want = [w(3.0, 4.0), w(1.0, 16.0) + w(2.0, 16.0), w(5.0, 10.0)];
        assert_close(&scores_under(Similarity::BM25), &want);
    }

    #[test]
    fn dirichlet_weights_are_clamped_at_zero() {
        // oil occurs 4 times, spill 7 times, in 40 collection tokens
        let (p_oil, p_spill) = (5.0 / 41.0, 8.0 / 41.0);
        let mu = 2000.0;
        let w = |tf: f64, p: f64, len: f64| ((1.0f64 + tf / (mu * p)).ln() + (mu / (len + mu)).ln()).max(0.0);
        let want = [w(3.0, p_oil, 4.0), w(1.0, p_oil, 16.0) + w(2.0, p_spill, 16.0), w(5.0, p_spill, 10.0)];
        let got = scores_under(Similarity::LM_DIRICHLET);
        assert_close(&got, &want);
        assert!(got.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn jelinek_mercer_mixes_document_and_collection_models() {
        let (p_oil, p_spill) = (5.0 / 41.0, 8.0 / 41.0);
        let w = |tf: f64, p: f64, len: f64| (1.0f64 + 0.3 * (tf / len) / (0.7 * p)).ln();
        let want = [w(3.0, p_oil, 4.0), w(1.0, p_oil, 16.0) + w(2.0, p_spill, 16.0), w(5.0, p_spill, 10.0)];
        assert_close(&scores_under(Similarity::LM_JELINEK_MERCER), &want);
    }

    #[test]
    fn zero_token_document_is_an_anomaly_for_every_similarity() {
        let mut acc = synthetic();
        acc.tokens.insert(2, 0);
        let stats = TermStatistics::gather(&[t("spill")], &acc).unwrap();
        let collection = acc.field_statistics("TEXT").unwrap();
        for similarity in [Similarity::BM25, Similarity::LM_DIRICHLET, Similarity::LM_JELINEK_MERCER] {
            let pass = Scorer::new(&stats, &acc, "TEXT")
                .with_similarity(similarity, collection)
                .score_into(&stats.candidates(), 10)
                .unwrap();
            assert_eq!(pass.anomalies, vec![Anomaly { doc_id: 2, value: 0.0 }]);
            assert_eq!(pass.top.into_sorted_vec().len(), 1);
        }
    }

    #[test]
    fn non_positive_length_is_an_anomaly() {
        let mut acc = synthetic();
        acc.lengths.insert(1, 0.0);
        acc.lengths.insert(2, -1.0);
        let stats = TermStatistics::gather(&[t("oil"), t("spill")], &acc).unwrap();
        let pass = Scorer::new(&stats, &acc, "TEXT").score_into(&stats.candidates(), 10).unwrap();
        let ids: Vec<DocId> = pass.anomalies.iter().map(|a| a.doc_id).collect();
        assert_eq!(ids, vec![1, 2]);
        let hits = pass.top.into_sorted_vec();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, 0);
    }

    #[test]
    fn accessor_failure_propagates() {
        let mut acc = synthetic();
        acc.lengths.remove(&2);
        let stats = TermStatistics::gather(&[t("spill")], &acc).unwrap();
        let err = Scorer::new(&stats, &acc, "TEXT").score_into(&stats.candidates(), 10).unwrap_err();
        assert!(matches!(err, SearchError::Accessor { .. }));
    }
}
