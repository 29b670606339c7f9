use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{router, AppState, MAX_K};
use tempfile::tempdir;
use tower::ServiceExt;
use trecrank_core::persist::{save_index, IndexPaths};
use trecrank_core::{Analyzer, DocumentSink, Fields, InvertedIndex, LengthNorm, Schema, SearchConfig};

fn fields(docno: &str, head: &str, text: &str) -> Fields {
    let mut f = Fields::new();
    f.insert("DOCNO".into(), docno.into());
    f.insert("HEAD".into(), head.into());
    f.insert("TEXT".into(), text.into());
    f
}

fn build_tiny_index(dir: &std::path::Path) {
    let mut index = InvertedIndex::new(Schema::trec(), LengthNorm::Classic, Analyzer::default());
    index.add_document(fields("AP-0", "Rust news", "Rust is great. rust systems programming.")).unwrap();
    index.add_document(fields("AP-1", "", "Learning rust slowly over many long evenings of study.")).unwrap();
    index.add_document(fields("AP-2", "", "Gardening tips.")).unwrap();
    save_index(&IndexPaths::new(dir), &index, "2024-01-01T00:00:00Z").unwrap();
}

fn app(dir: &std::path::Path) -> Router {
    let state = AppState::load(&dir.to_string_lossy(), SearchConfig::default(), Some("secret".into())).unwrap();
    router(state)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), get("/search?q=rust&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(json["total_hits"], 2);
    // two occurrences in a five-token body outrank one in an eight-token body
    assert_eq!(arr[0]["docno"], "AP-0");
    assert_eq!(arr[1]["docno"], "AP-1");
    assert_eq!(arr[0]["head"], "Rust news");
    assert!(arr[1]["head"].is_null());
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
    assert!(arr[0]["snippet"].as_str().unwrap().contains("<em>Rust</em>"));
}

#[tokio::test]
async fn similarity_can_be_chosen_per_request() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, body) = call(app(dir.path()), get("/search?q=rust&similarity=bm25")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert_eq!(json["results"][0]["docno"], "AP-0");
    let (status, _) = call(app(dir.path()), get("/search?q=rust&similarity=vsm")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_positive_k_is_rejected() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, _) = call(app(dir.path()), get("/search?q=rust&k=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(app(dir.path()), get("/search?q=rust&k=-3")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn k_above_cap_is_rejected() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, _) = call(app(dir.path()), get(&format!("/search?q=rust&k={}", MAX_K))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(app(dir.path()), get(&format!("/search?q=rust&k={}", MAX_K + 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("between 1 and 1000"));
}

#[tokio::test]
async fn stopword_only_query_is_a_configuration_error() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, body) = call(app(dir.path()), get("/search?q=the")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("query has no terms"));
}

#[tokio::test]
async fn unknown_query_word_is_an_empty_ranking() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, body) = call(app(dir.path()), get("/search?q=zeppelin")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 0);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn doc_endpoint_returns_stored_fields() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, body) = call(app(dir.path()), get("/doc/2")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["fields"]["DOCNO"], "AP-2");
    let (status, _) = call(app(dir.path()), get("/doc/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_requires_token_and_feeds_search() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());
    let batch = r#"[{"DOCNO": "NEW-1", "TEXT": "compost and gardening"}, {"TEXT": "no docno"}]"#;

    let unauthorized = Request::post("/index/batch")
        .header("content-type", "application/json")
        .body(Body::from(batch))
        .unwrap();
    let (status, _) = call(app.clone(), unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::post("/index/batch")
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", "secret")
        .body(Body::from(batch))
        .unwrap();
    let (status, body) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["added"], 1);
    assert_eq!(json["rejected"].as_array().unwrap().len(), 1);
    assert_eq!(json["num_docs"], 4);

    let (_, body) = call(app.clone(), get("/search?q=compost")).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["docno"], "NEW-1");

    let commit = Request::post("/index/commit").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, _) = call(app, commit).await;
    assert_eq!(status, StatusCode::OK);
    let reloaded = trecrank_core::persist::load_index(&IndexPaths::new(dir.path())).unwrap();
    assert_eq!(reloaded.num_docs(), 4);
}
