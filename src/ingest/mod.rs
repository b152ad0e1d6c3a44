// src/ingest/mod.rs
pub mod normalize;
pub mod providers;
pub mod types;

pub use normalize::{normalize, normalize_all, normalize_at, normalize_text};

use crate::analyze::annotator::{annotate_or_neutral, Annotator};
use crate::ingest::types::{AnnotatedRecord, CanonicalNewsRecord, NewsSource, Ticker};
use crate::store::{NewsStore, StoreError};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingestion runs started.");
        describe_counter!("ingest_fetched_total", "Raw items returned by the news source.");
        describe_counter!(
            "ingest_filtered_total",
            "Raw items dropped by normalization (no title)."
        );
        describe_counter!(
            "ingest_annotation_fallback_total",
            "Headlines that fell back to neutral sentiment."
        );
        describe_counter!("ingest_inserted_total", "Records newly persisted.");
        describe_counter!(
            "ingest_provider_errors_total",
            "News source fetch/parse errors."
        );
        describe_counter!("store_retries_total", "Storage retries after transient errors.");
        describe_counter!("store_errors_total", "Storage operations that failed.");
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_histogram!("ingest_run_ms", "End-to-end ingestion run time in milliseconds.");
    });
}

/// Outcome of one fetch → normalize → annotate → save run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub ticker: String,
    pub source: String,
    pub annotator: String,
    pub fetched: usize,
    pub normalized: usize,
    pub annotation_fallbacks: usize,
    pub inserted: usize,
    /// Normalized records that were already stored.
    pub skipped: usize,
    /// Degradations the caller should surface (failed fetch etc.).
    pub notices: Vec<String>,
}

/// Annotate each headline in order; failures degrade to neutral.
/// Returns the annotated records and the number of fallbacks.
pub async fn annotate_all(
    annotator: &dyn Annotator,
    records: Vec<CanonicalNewsRecord>,
) -> (Vec<AnnotatedRecord>, usize) {
    let mut fallbacks = 0usize;
    let mut out = Vec::with_capacity(records.len());
    for news in records {
        let (sentiment, fell_back) = annotate_or_neutral(annotator, &news.title).await;
        if fell_back {
            fallbacks += 1;
        }
        out.push(AnnotatedRecord::new(news, sentiment));
    }
    (out, fallbacks)
}

/// Run one ingestion for `ticker`.
///
/// A failed fetch yields an empty run with a notice; a failed save is returned
/// as `Err` so it can't be mistaken for "nothing new".
pub async fn run_once(
    source: &dyn NewsSource,
    annotator: &dyn Annotator,
    store: &NewsStore,
    ticker: &Ticker,
) -> Result<IngestReport, StoreError> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    counter!("ingest_runs_total").increment(1);

    let mut notices = Vec::new();
    let raw = match source.fetch_raw(ticker).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "ingest", error = ?e, provider = source.name(), %ticker, "provider error");
            notices.push(format!("news fetch from {} failed: {e:#}", source.name()));
            Vec::new()
        }
    };
    let fetched = raw.len();

    let canonical: Vec<CanonicalNewsRecord> = normalize_all(&raw).collect();
    let normalized = canonical.len();

    let (annotated, annotation_fallbacks) = annotate_all(annotator, canonical).await;
    if annotation_fallbacks > 0 {
        notices.push(format!(
            "{annotation_fallbacks} headline(s) scored neutral after {} annotator errors",
            annotator.name()
        ));
    }

    let inserted = store.save(ticker.as_str(), &annotated).await?;

    counter!("ingest_fetched_total").increment(fetched as u64);
    counter!("ingest_filtered_total").increment((fetched - normalized) as u64);
    counter!("ingest_inserted_total").increment(inserted as u64);
    histogram!("ingest_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    tracing::info!(
        target: "ingest",
        %ticker,
        fetched,
        normalized,
        inserted,
        annotation_fallbacks,
        "ingest run finished"
    );

    Ok(IngestReport {
        ticker: ticker.to_string(),
        source: source.name().to_string(),
        annotator: annotator.name().to_string(),
        fetched,
        normalized,
        annotation_fallbacks,
        inserted,
        skipped: normalized - inserted,
        notices,
    })
}
