use crate::analyzer::Analyzer;
use crate::config::{LengthNorm, Schema};
use crate::error::AccessError;
use crate::postings::{DocumentSink, PostingsAccessor};
use crate::stats::FieldStatistics;
use crate::term::Term;
use crate::{DocId, Fields, TermId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Raw occurrence count, always at least 1.
    pub freq: u32,
}

/// All schema fields of one document, kept for presenting results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub fields: Fields,
}

impl StoredDocument {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Single-segment in-memory index.
///
/// Document ids are dense and assigned in insertion order, so every
/// postings list stays sorted by document without re-sorting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub schema: Schema,
    pub norm: LengthNorm,
    pub dictionary: HashMap<Term, TermId>,
    pub postings: Vec<Vec<Posting>>,
    /// Token count per indexed field, indexed by document id.
    pub field_lengths: HashMap<String, Vec<u32>>,
    pub docs: Vec<StoredDocument>,
    #[serde(skip)]
    analyzer: Analyzer,
}

impl InvertedIndex {
    pub fn new(schema: Schema, norm: LengthNorm, analyzer: Analyzer) -> Self {
        Self { schema, norm, analyzer, ..Self::default() }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn num_docs(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn document(&self, doc: DocId) -> Option<&StoredDocument> {
        self.docs.get(doc as usize)
    }

    pub fn stored_field(&self, doc: DocId, name: &str) -> Option<&str> {
        self.document(doc).and_then(|d| d.get(name))
    }

    pub fn term_postings(&self, term: &Term) -> &[Posting] {
        self.dictionary
            .get(term)
            .and_then(|&tid| self.postings.get(tid as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn field_length(&self, doc: DocId, field: &str) -> u32 {
        self.field_lengths
            .get(field)
            .and_then(|lens| lens.get(doc as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Add a document, returning its id.
    pub fn insert(&mut self, mut fields: Fields) -> Result<DocId, AccessError> {
        for spec in &self.schema.fields {
            let value = fields.entry(spec.name.clone()).or_default();
            if spec.required && value.trim().is_empty() {
                return Err(AccessError::new("add_document", format!("missing required field {}", spec.name)));
            }
        }
        let doc_id = self.num_docs();

        let indexed: Vec<String> = self.schema.indexed().map(|f| f.name.clone()).collect();
        for field in indexed {
            let tokens = self.analyzer.tokens(&fields[&field]);
            let mut tf: HashMap<String, u32> = HashMap::new();
            for tok in &tokens {
                *tf.entry(tok.clone()).or_insert(0) += 1;
            }
            for (text, freq) in tf {
                let next = self.postings.len() as TermId;
                let tid = *self.dictionary.entry(Term::new(field.clone(), text)).or_insert(next);
                if tid == next {
                    self.postings.push(Vec::new());
                }
                self.postings[tid as usize].push(Posting { doc_id, freq });
            }
            let lens = self.field_lengths.entry(field).or_default();
            lens.resize(doc_id as usize, 0);
            lens.push(tokens.len() as u32);
        }

        self.docs.push(StoredDocument { fields });
        Ok(doc_id)
    }

    /// Size of the vocabulary of `field`.
    pub fn vocabulary_size(&self, field: &str) -> usize {
        self.dictionary.keys().filter(|t| t.field == field).count()
    }

    /// Number of documents with at least one token in `field`.
    pub fn docs_with_field(&self, field: &str) -> usize {
        self.field_lengths.get(field).map_or(0, |lens| lens.iter().filter(|&&l| l > 0).count())
    }

    /// Total tokens indexed in `field`.
    pub fn sum_total_term_freq(&self, field: &str) -> u64 {
        self.field_lengths.get(field).map_or(0, |lens| lens.iter().map(|&l| l as u64).sum())
    }

    /// Total postings across the vocabulary of `field`.
    pub fn sum_doc_freq(&self, field: &str) -> u64 {
        self.dictionary
            .iter()
            .filter(|(t, _)| t.field == field)
            .map(|(_, &tid)| self.postings[tid as usize].len() as u64)
            .sum()
    }

    /// Occurrences of `term` across all documents.
    pub fn total_term_freq(&self, term: &Term) -> u64 {
        self.term_postings(term).iter().map(|p| p.freq as u64).sum()
    }
}

impl PostingsAccessor for InvertedIndex {
    fn postings(&self, term: &Term) -> Result<Vec<(DocId, u32)>, AccessError> {
        Ok(self.term_postings(term).iter().map(|p| (p.doc_id, p.freq)).collect())
    }

    fn document_frequency(&self, term: &Term) -> Result<u32, AccessError> {
        Ok(self.term_postings(term).len() as u32)
    }

    fn total_documents(&self) -> Result<u32, AccessError> {
        Ok(self.num_docs())
    }

    fn normalized_length(&self, doc: DocId, field: &str) -> Result<f64, AccessError> {
        Ok(self.norm.apply(InvertedIndex::field_length(self, doc, field)))
    }

    fn field_length(&self, doc: DocId, field: &str) -> Result<u32, AccessError> {
        Ok(InvertedIndex::field_length(self, doc, field))
    }

    fn field_statistics(&self, field: &str) -> Result<FieldStatistics, AccessError> {
        Ok(FieldStatistics {
            doc_count: self.docs_with_field(field) as u32,
            total_tokens: self.sum_total_term_freq(field),
        })
    }
}

impl DocumentSink for InvertedIndex {
    fn add_document(&mut self, fields: Fields) -> Result<(), AccessError> {
        self.insert(fields).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalyzerConfig, AnalyzerKind};

    fn doc(docno: &str, text: &str) -> Fields {
        let mut f = Fields::new();
        f.insert("DOCNO".into(), docno.into());
        f.insert("TEXT".into(), text.into());
        f
    }

    fn plain() -> InvertedIndex {
        InvertedIndex::new(
            Schema::trec(),
            LengthNorm::Linear,
            Analyzer::new(AnalyzerConfig::unstemmed(AnalyzerKind::Standard)),
        )
    }

    #[test]
    fn postings_are_sorted_and_counted() {
        let mut idx = plain();
        idx.add_document(doc("a", "new york new")).unwrap();
        idx.add_document(doc("b", "old york")).unwrap();
        let york = Term::new("TEXT", "york");
        assert_eq!(idx.postings(&york).unwrap(), vec![(0, 1), (1, 1)]);
        assert_eq!(idx.postings(&Term::new("TEXT", "new")).unwrap(), vec![(0, 2)]);
        assert_eq!(idx.document_frequency(&york).unwrap(), 2);
        assert_eq!(idx.normalized_length(0, "TEXT").unwrap(), 3.0);
        assert_eq!(idx.stored_field(1, "DOCNO"), Some("b"));
        assert_eq!(idx.stored_field(1, "HEAD"), Some(""));
    }

    #[test]
    fn absent_term_has_no_postings() {
        let mut idx = plain();
        idx.add_document(doc("a", "text")).unwrap();
        let ghost = Term::new("TEXT", "ghost");
        assert!(idx.postings(&ghost).unwrap().is_empty());
        assert_eq!(idx.document_frequency(&ghost).unwrap(), 0);
    }

    #[test]
    fn required_field_is_enforced() {
        let mut idx = plain();
        let mut f = Fields::new();
        f.insert("TEXT".into(), "orphan".into());
        assert!(idx.add_document(f).is_err());
        assert_eq!(idx.num_docs(), 0);
    }

    #[test]
    fn corpus_statistics() {
        let mut idx = plain();
        idx.add_document(doc("a", "new york new")).unwrap();
        idx.add_document(doc("b", "")).unwrap();
        idx.add_document(doc("c", "new")).unwrap();
        assert_eq!(idx.vocabulary_size("TEXT"), 2);
        assert_eq!(idx.docs_with_field("TEXT"), 2);
        assert_eq!(idx.sum_total_term_freq("TEXT"), 4);
        assert_eq!(idx.sum_doc_freq("TEXT"), 3);
        assert_eq!(idx.total_term_freq(&Term::new("TEXT", "new")), 3);
        assert_eq!(idx.normalized_length(1, "TEXT").unwrap(), 0.0);
        let field = idx.field_statistics("TEXT").unwrap();
        assert_eq!(field, FieldStatistics { doc_count: 2, total_tokens: 4 });
        assert_eq!(PostingsAccessor::field_length(&idx, 0, "TEXT").unwrap(), 3);
    }
}
