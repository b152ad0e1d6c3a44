use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::analyze::DynAnnotator;
use crate::ingest::types::{DailyClose, HistoryPeriod, NewsSource, PriceSource, Ticker};
use crate::ingest::{self, IngestReport};
use crate::store::{NewsStore, PersistedRecord, SentimentSummary, StoreError, DEFAULT_RECENT_LIMIT};

const MAX_RECENT_LIMIT: usize = 1_000;

#[derive(Clone)]
pub struct AppState {
    pub store: NewsStore,
    pub annotator: DynAnnotator,
    pub source: Arc<dyn NewsSource>,
    pub prices: Arc<dyn PriceSource>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/news/{ticker}", get(recent_news))
        .route("/news/{ticker}/summary", get(news_summary))
        .route("/history/{ticker}", get(price_history))
        .route("/ingest/{ticker}", post(ingest_ticker))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Errors surfaced to HTTP clients as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadTicker(String),
    BadPeriod(String),
    Store(StoreError),
    Upstream(anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidTicker(t) => ApiError::BadTicker(t),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadTicker(t) => (StatusCode::BAD_REQUEST, format!("invalid ticker: {t:?}")),
            ApiError::BadPeriod(p) => (StatusCode::BAD_REQUEST, format!("invalid period: {p:?}")),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("storage failure: {e}"))
            }
            ApiError::Upstream(e) => {
                tracing::warn!(error = ?e, "upstream failure");
                (StatusCode::BAD_GATEWAY, format!("upstream failure: {e:#}"))
            }
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

#[derive(Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    period: Option<String>,
}

async fn recent_news(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<RecentQuery>,
) -> Result<Json<Vec<PersistedRecord>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_RECENT_LIMIT).min(MAX_RECENT_LIMIT);
    let rows = state.store.get_recent(&ticker, limit).await?;
    Ok(Json(rows))
}

async fn ingest_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<IngestReport>, ApiError> {
    let ticker = Ticker::parse(&ticker).ok_or(ApiError::BadTicker(ticker))?;
    let report = ingest::run_once(
        state.source.as_ref(),
        state.annotator.as_ref(),
        &state.store,
        &ticker,
    )
    .await?;
    Ok(Json(report))
}

async fn news_summary(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<SentimentSummary>, ApiError> {
    Ok(Json(state.store.sentiment_summary(&ticker).await?))
}

async fn price_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<DailyClose>>, ApiError> {
    let ticker = Ticker::parse(&ticker).ok_or(ApiError::BadTicker(ticker))?;
    let period = match q.period {
        Some(p) => HistoryPeriod::parse(&p).ok_or(ApiError::BadPeriod(p))?,
        None => HistoryPeriod::default(),
    };
    let rows = state
        .prices
        .daily_closes(&ticker, &period)
        .await
        .map_err(ApiError::Upstream)?;
    Ok(Json(rows))
}
