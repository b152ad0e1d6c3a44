// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod sentiment;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::types::{
    AnnotatedRecord, CanonicalNewsRecord, DailyClose, HistoryPeriod, NewsSource, PriceSource,
    PublishedAt, RawNewsItem, Ticker,
};
pub use crate::ingest::{run_once, IngestReport};
pub use crate::sentiment::{Sentiment, SentimentLabel};
pub use crate::store::{NewsStore, PersistedRecord, SentimentSummary, StoreError, StoreOptions};

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

/// Build the shared application state from config: open the store, pick the
/// annotator and the upstream sources.
pub async fn build_state(cfg: &config::AppConfig) -> anyhow::Result<api::AppState> {
    let store = NewsStore::open(&cfg.database_url, cfg.store_options())
        .await
        .with_context(|| format!("opening store at {}", cfg.database_url))?;

    let annotator_cfg = config::AnnotatorConfig::load_or_default(&cfg.annotator_config_path)
        .with_context(|| {
            format!(
                "loading annotator config from {}",
                cfg.annotator_config_path.display()
            )
        })?;
    let annotator = analyze::build_annotator(&annotator_cfg)?;

    let source = ingest::providers::yahoo::YahooNewsSource::from_base_url(
        &cfg.yahoo_base_url,
        cfg.news_count,
    )?;
    let prices = ingest::providers::yahoo_chart::YahooPriceSource::from_base_url(&cfg.yahoo_base_url)?;

    info!(
        annotator = annotator.name(),
        news_count = cfg.news_count,
        "application state ready"
    );

    Ok(api::AppState {
        store,
        annotator,
        source: Arc::new(source),
        prices: Arc::new(prices),
    })
}
