use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::postings::{PostingsAccessor, QueryTermExtractor};
use crate::scorer::{Anomaly, ScorePass, Scorer};
use crate::stats::{FieldStatistics, TermStatistics};
use crate::term::Term;
use crate::topk::{ScoredDocument, TopK};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

/// Ranked output of one query evaluation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ranking {
    /// Highest score first; equal scores by ascending document id.
    pub hits: Vec<ScoredDocument>,
    /// Candidates scored, before top-k truncation.
    pub total_hits: usize,
    pub anomalies: Vec<Anomaly>,
}

/// Score `terms` against `accessor` and keep the best `config.k` documents.
///
/// The accessor must be `Sync` so candidate partitions can be scored on the
/// rayon pool when `config.partitions > 1`.
pub fn evaluate<A: PostingsAccessor + Sync + ?Sized>(terms: &[Term], accessor: &A, config: &SearchConfig) -> Result<Ranking> {
    config.validate()?;
    if terms.is_empty() {
        return Err(SearchError::InvalidConfiguration("query has no terms".into()));
    }
    let start = Instant::now();

    let stats = if config.partitions > 1 {
        TermStatistics::gather_parallel(terms, accessor)?
    } else {
        TermStatistics::gather(terms, accessor)?
    };
    let candidates = stats.candidates();
    let collection = if config.similarity.uses_collection_model() {
        accessor.field_statistics(&config.field).map_err(|e| SearchError::accessor(None, e))?
    } else {
        FieldStatistics::default()
    };
    let scorer = || Scorer::new(&stats, accessor, &config.field).with_similarity(config.similarity, collection);

    let passes: Vec<ScorePass> = if config.partitions > 1 && candidates.len() > 1 {
        let chunk = candidates.len().div_ceil(config.partitions);
        candidates
            .par_chunks(chunk)
            .map(|part| scorer().score_into(part, config.k))
            .collect::<Result<Vec<_>>>()?
    } else {
        vec![scorer().score_into(&candidates, config.k)?]
    };

    let mut anomalies = Vec::new();
    let mut tops = Vec::with_capacity(passes.len());
    for pass in passes {
        anomalies.extend(pass.anomalies);
        tops.push(pass.top);
    }
    let top = if tops.len() == 1 { tops.remove(0) } else { TopK::merge(config.k, tops) };
    let total_hits = top.total_collected();
    let hits = top.into_sorted_vec();

    tracing::info!(
        similarity = config.similarity.label(),
        terms = stats.terms.len(),
        candidates = candidates.len(),
        returned = hits.len(),
        anomalies = anomalies.len(),
        took_ms = start.elapsed().as_millis() as u64,
        "query evaluated"
    );
    Ok(Ranking { hits, total_hits, anomalies })
}

/// Extract terms from `query` for `config.field`, then [`evaluate`].
pub fn search<A, E>(query: &str, extractor: &E, accessor: &A, config: &SearchConfig) -> Result<Ranking>
where
    A: PostingsAccessor + Sync + ?Sized,
    E: QueryTermExtractor + ?Sized,
{
    config.validate()?;
    let terms = extractor.extract_terms(query, &config.field).map_err(SearchError::Extractor)?;
    evaluate(&terms, accessor, config)
}
