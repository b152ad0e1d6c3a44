// src/store/mod.rs
//! SQLite-backed store for annotated headlines, deduplicated on `(ticker, link)`.

pub mod dates;
pub mod error;

use std::collections::HashSet;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use chrono::{DateTime, SubsecRound, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row, Sqlite, Transaction};
use tracing::{debug, info, warn};

use crate::ingest::types::{AnnotatedRecord, Ticker};
use crate::sentiment::SentimentLabel;

pub use dates::resolve_published;
pub use error::{Result, StoreError};

pub const DEFAULT_RECENT_LIMIT: usize = 50;

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: i64,
    pub ticker: String,
    pub title: String,
    pub publisher: String,
    pub link: String,
    pub published_date: DateTime<Utc>,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for PersistedRecord {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let label: String = row.try_get("sentiment_label")?;
        let sentiment_label =
            label
                .parse::<SentimentLabel>()
                .map_err(|e| sqlx::Error::ColumnDecode {
                    index: "sentiment_label".to_string(),
                    source: e.into(),
                })?;
        Ok(Self {
            id: row.try_get("id")?,
            ticker: row.try_get("ticker")?,
            title: row.try_get("title")?,
            publisher: row.try_get("publisher")?,
            link: row.try_get("link")?,
            published_date: row.try_get("published_date")?,
            sentiment_label,
            sentiment_score: row.try_get("sentiment_score")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Per-ticker label counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub ticker: String,
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
    /// Extra attempts after the first one, transient errors only.
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(2),
            max_retries: 3,
            retry_base: Duration::from_millis(50),
        }
    }
}

/// Owns the persisted record set. `save` is the only write path.
#[derive(Clone)]
pub struct NewsStore {
    pool: SqlitePool,
    opts: StoreOptions,
}

impl NewsStore {
    /// Open (creating if missing) the database at `url` and apply migrations.
    pub async fn open(url: &str, opts: StoreOptions) -> Result<Self> {
        let connect = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(opts.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(opts.max_connections.max(1))
            .acquire_timeout(opts.acquire_timeout)
            .connect_with(connect)
            .await?;
        Self::with_pool(pool, opts).await
    }

    /// Private in-memory database (single pinned connection), for tests and demos.
    pub async fn open_in_memory() -> Result<Self> {
        let opts = StoreOptions {
            max_connections: 1,
            ..StoreOptions::default()
        };
        let connect = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(opts.acquire_timeout)
            .connect_with(connect)
            .await?;
        Self::with_pool(pool, opts).await
    }

    async fn with_pool(pool: SqlitePool, opts: StoreOptions) -> Result<Self> {
        MIGRATOR.run(&pool).await?;
        info!(target: "store", "news store ready");
        Ok(Self { pool, opts })
    }

    /// Wait for in-flight work and close every connection.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Insert records whose link is new for `ticker`, all-or-nothing.
    /// Returns the number of rows actually inserted.
    pub async fn save(&self, ticker: &str, records: &[AnnotatedRecord]) -> Result<usize> {
        let ticker =
            Ticker::parse(ticker).ok_or_else(|| StoreError::InvalidTicker(ticker.to_string()))?;
        let inserted = self
            .with_retry("save", || self.save_once(&ticker, records))
            .await?;
        info!(
            target: "store",
            ticker = %ticker,
            incoming = records.len(),
            inserted,
            "save committed"
        );
        Ok(inserted)
    }

    async fn save_once(&self, ticker: &Ticker, records: &[AnnotatedRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let existing: Vec<String> =
            sqlx::query_scalar("SELECT link FROM news_sentiment WHERE ticker = ?")
                .bind(ticker.as_str())
                .fetch_all(&mut *tx)
                .await?;
        let seen: HashSet<String> = existing.into_iter().collect();
        debug!(target: "store", ticker = %ticker, existing = seen.len(), "loaded existing links");

        let inserted = stage_batch(&mut tx, ticker, records, seen).await?;

        // Dropping `tx` on any early return above rolls the batch back.
        tx.commit().await?;
        Ok(inserted)
    }

    /// Most recent records for `ticker`, newest publication first.
    pub async fn get_recent(&self, ticker: &str, limit: usize) -> Result<Vec<PersistedRecord>> {
        let Some(ticker) = Ticker::parse(ticker) else {
            return Err(StoreError::InvalidTicker(ticker.to_string()));
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_retry("get_recent", || self.fetch_recent(&ticker, limit))
            .await
    }

    async fn fetch_recent(&self, ticker: &Ticker, limit: i64) -> Result<Vec<PersistedRecord>> {
        let rows = sqlx::query_as::<_, PersistedRecord>(
            "SELECT id, ticker, title, publisher, link, published_date, \
                    sentiment_label, sentiment_score, created_at \
             FROM news_sentiment \
             WHERE ticker = ? \
             ORDER BY published_date DESC, id DESC \
             LIMIT ?",
        )
        .bind(ticker.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count(&self, ticker: &str) -> Result<i64> {
        let Some(ticker) = Ticker::parse(ticker) else {
            return Err(StoreError::InvalidTicker(ticker.to_string()));
        };
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news_sentiment WHERE ticker = ?")
            .bind(ticker.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Label distribution of everything stored for `ticker`.
    pub async fn sentiment_summary(&self, ticker: &str) -> Result<SentimentSummary> {
        let Some(ticker) = Ticker::parse(ticker) else {
            return Err(StoreError::InvalidTicker(ticker.to_string()));
        };
        let (total, positive, negative, neutral) = self
            .with_retry("sentiment_summary", || self.fetch_summary(&ticker))
            .await?;
        Ok(SentimentSummary {
            ticker: ticker.to_string(),
            total,
            positive,
            negative,
            neutral,
        })
    }

    async fn fetch_summary(&self, ticker: &Ticker) -> Result<(i64, i64, i64, i64)> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            "SELECT COUNT(*), \
                    COALESCE(SUM(sentiment_label = 'positive'), 0), \
                    COALESCE(SUM(sentiment_label = 'negative'), 0), \
                    COALESCE(SUM(sentiment_label = 'neutral'), 0) \
             FROM news_sentiment \
             WHERE ticker = ?",
        )
        .bind(ticker.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let base = self.opts.retry_base;
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: base,
            initial_interval: base,
            max_interval: base * 32,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < self.opts.max_retries => {
                    attempt += 1;
                    let delay = backoff.next_backoff().unwrap_or(base);
                    counter!("store_retries_total", "op" => op).increment(1);
                    warn!(target: "store", op, attempt, ?delay, error = %e, "transient storage error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    counter!("store_errors_total", "op" => op).increment(1);
                    warn!(target: "store", op, error = %e, "storage operation failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Insert every record whose link is not in `seen`. The unique
/// `(ticker, link)` index still rejects anything the set missed.
async fn stage_batch(
    tx: &mut Transaction<'_, Sqlite>,
    ticker: &Ticker,
    records: &[AnnotatedRecord],
    mut seen: HashSet<String>,
) -> Result<usize> {
    let now = Utc::now().trunc_subsecs(0);
    let mut inserted = 0usize;

    for rec in records {
        if seen.contains(&rec.news.link) {
            debug!(target: "store", link = %rec.news.link, "skipping duplicate");
            continue;
        }
        let published = resolve_published(&rec.news.published, now);

        sqlx::query(
            "INSERT INTO news_sentiment \
             (ticker, title, publisher, link, published_date, sentiment_label, sentiment_score, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ticker.as_str())
        .bind(&rec.news.title)
        .bind(&rec.news.publisher)
        .bind(&rec.news.link)
        .bind(published)
        .bind(rec.sentiment_label.as_str())
        .bind(rec.sentiment_score)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        seen.insert(rec.news.link.clone());
        inserted += 1;
    }
    Ok(inserted)
}
