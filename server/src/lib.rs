use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;
use trecrank_core::persist::{load_index, save_index, IndexPaths};
use trecrank_core::{search, DocumentSink, Fields, InvertedIndex, SearchConfig, SearchError, Similarity};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: i64,
    pub field: Option<String>,
    /// tfidf, bm25, lmds or lmjms
    pub similarity: Option<String>,
}
fn default_k() -> i64 { 10 }

/// Largest `k` a search request may ask for.
pub const MAX_K: usize = 1000;

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub anomalies: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub docno: String,
    pub score: f64,
    pub head: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub index: Arc<RwLock<InvertedIndex>>,
    pub defaults: SearchConfig,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, String);

impl AppState {
    pub fn load(index_dir: &str, defaults: SearchConfig, admin_token: Option<String>) -> Result<Self> {
        let index = load_index(&IndexPaths::new(index_dir))?;
        tracing::info!(index = %index_dir, num_docs = index.num_docs(), "index loaded");
        Ok(Self {
            index_paths_root: PathBuf::from(index_dir),
            index: Arc::new(RwLock::new(index)),
            defaults,
            admin_token,
        })
    }
}

pub fn build_app(index_dir: String, defaults: SearchConfig) -> Result<Router> {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState::load(&index_dir, defaults, admin_token)?;
    Ok(router(app_state))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn search_error(e: SearchError) -> ApiError {
    match e {
        SearchError::InvalidConfiguration(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        _ => {
            tracing::error!(error = %e, "query evaluation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    if params.k <= 0 || params.k > MAX_K as i64 {
        return Err((StatusCode::BAD_REQUEST, format!("k must be between 1 and {MAX_K}, got {}", params.k)));
    }
    let mut config = state.defaults.clone().with_k(params.k as usize);
    if let Some(field) = params.field {
        config.field = field;
    }
    if let Some(name) = &params.similarity {
        config.similarity = name.parse::<Similarity>().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    }

    let index = state.index.read();
    let ranking = search(&params.q, index.analyzer(), &*index, &config).map_err(search_error)?;

    let raw_terms: Vec<String> = params.q.split_whitespace().map(|s| s.to_string()).collect();
    let results = ranking
        .hits
        .iter()
        .filter_map(|hit| {
            let doc = index.document(hit.doc_id)?;
            let head = doc.get("HEAD").filter(|h| !h.is_empty()).map(str::to_string);
            let snippet = doc.get(&config.field).and_then(|text| snippet_from_text(text, &raw_terms));
            Some(SearchHit { doc_id: hit.doc_id, docno: doc.get("DOCNO").unwrap_or_default().to_string(), score: hit.score, head, snippet })
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: ranking.total_hits,
        anomalies: ranking.anomalies.len(),
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Result<Json<serde_json::Value>, ApiError> {
    let index = state.index.read();
    match index.document(doc_id) {
        Some(doc) => Ok(Json(serde_json::json!({ "doc_id": doc_id, "fields": doc.fields }))),
        None => Err((StatusCode::NOT_FOUND, format!("no document {doc_id}"))),
    }
}

fn snippet_from_text(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let lower = text.to_lowercase();
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| lower.find(&t.to_lowercase()))
        .filter(|&idx| lower.len() == text.len() && text.is_char_boundary(idx));
    let snippet: String = match first_idx {
        Some(idx) => {
            let start = text[..idx].char_indices().rev().take(100).last().map_or(idx, |(i, _)| i);
            text[start..].chars().take(300).collect()
        }
        None => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

// --- Admin endpoints ---
async fn index_batch(State(state): State<AppState>, headers: HeaderMap, Json(docs): Json<Vec<Fields>>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let mut index = state.index.write();
    let mut added = 0usize;
    let mut rejected = Vec::new();
    for (i, fields) in docs.into_iter().enumerate() {
        match index.add_document(fields) {
            Ok(()) => added += 1,
            Err(e) => rejected.push(serde_json::json!({ "position": i, "error": e.to_string() })),
        }
    }
    tracing::info!(added, rejected = rejected.len(), num_docs = index.num_docs(), "batch indexed");
    Ok(Json(serde_json::json!({ "added": added, "rejected": rejected, "num_docs": index.num_docs() })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let index = state.index.read();
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    save_index(&IndexPaths::new(&state.index_paths_root), &index, &created_at).map_err(|e| {
        tracing::error!(error = %e, "commit failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("commit failed: {e:#}"))
    })?;
    Ok(Json(serde_json::json!({ "committed": true, "num_docs": index.num_docs() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
