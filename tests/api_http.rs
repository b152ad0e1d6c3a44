// tests/api_http.rs
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use ticker_news_sentiment::api::AppState;
use ticker_news_sentiment::ingest::providers::yahoo::YahooNewsSource;
use ticker_news_sentiment::ingest::providers::yahoo_chart::YahooPriceSource;
use ticker_news_sentiment::sentiment::LexiconAnnotator;
use ticker_news_sentiment::{router, NewsStore};

async fn state() -> AppState {
    AppState {
        store: NewsStore::open_in_memory().await.unwrap(),
        annotator: Arc::new(LexiconAnnotator::new()),
        source: Arc::new(YahooNewsSource::from_fixture_str(include_str!(
            "fixtures/yahoo_search.json"
        ))),
        prices: Arc::new(YahooPriceSource::from_fixture_str(include_str!(
            "fixtures/yahoo_chart.json"
        ))),
    }
}

async fn call(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let res = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_ok() {
    let app = router(state().await);
    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_then_query_recent() {
    let st = state().await;

    let (status, report) = call(router(st.clone()), "POST", "/ingest/aapl").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["ticker"], "AAPL");
    assert_eq!(report["inserted"], 3);

    let (status, rows) = call(router(st.clone()), "GET", "/news/AAPL?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["link"], "https://finance.example/apple-beats");
    assert_eq!(rows[0]["sentiment_label"], "positive");

    let (_, again) = call(router(st), "POST", "/ingest/AAPL").await;
    assert_eq!(again["inserted"], 0);
    assert_eq!(again["skipped"], 3);
}

#[tokio::test]
async fn unknown_ticker_is_empty_list() {
    let (status, rows) = call(router(state().await), "GET", "/news/NVDA").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows, Value::Array(vec![]));
}

#[tokio::test]
async fn blank_ticker_is_bad_request() {
    let (status, body) = call(router(state().await), "GET", "/news/%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid ticker"));

    let (status, _) = call(router(state().await), "POST", "/ingest/%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_reports_label_distribution() {
    let st = state().await;
    call(router(st.clone()), "POST", "/ingest/AAPL").await;

    let (status, s) = call(router(st.clone()), "GET", "/news/aapl/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(s["ticker"], "AAPL");
    assert_eq!(s["total"], 3);
    assert_eq!(s["positive"], 1);
    assert_eq!(s["negative"], 1);
    assert_eq!(s["neutral"], 1);

    let (status, s) = call(router(st), "GET", "/news/NVDA/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(s["total"], 0);
}

#[tokio::test]
async fn history_returns_daily_closes() {
    let (status, rows) = call(router(state().await), "GET", "/history/aapl?period=5d").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["date"], "2024-04-29");
    assert_eq!(rows[0]["close"], 172.68);
    assert_eq!(rows[4]["close"], 183.38);
    assert_eq!(rows[4]["volume"], 0);
}

#[tokio::test]
async fn history_rejects_unknown_period() {
    let (status, body) = call(router(state().await), "GET", "/history/AAPL?period=2w").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid period"));
}
