// src/ingest/types.rs
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

/// Fallback link for items that carry no URL at all. The link doubles as the
/// dedup key, so it must always be present.
pub const NO_LINK: &str = "No Link Found";
pub const UNKNOWN_PUBLISHER: &str = "Unknown";

/// Trimmed, uppercased, non-empty exchange symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.is_empty() {
            return None;
        }
        Some(Self(t.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publication time as delivered upstream. Resolved to a timestamp by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublishedAt {
    /// Unix seconds.
    Timestamp(f64),
    Text(String),
}

impl PublishedAt {
    fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Number(n) => n.as_f64().map(PublishedAt::Timestamp),
            serde_json::Value::String(s) if !s.trim().is_empty() => {
                Some(PublishedAt::Text(s.trim().to_string()))
            }
            _ => None,
        }
    }
}

// ------------------------------------------------------------
// Raw upstream shapes
// ------------------------------------------------------------

/// Top-level fields of an upstream item. Legacy (flat) responses carry
/// everything here; newer responses only keep leftovers next to `content`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FlatFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub publisher: Option<String>,
    #[serde(
        default,
        rename = "providerPublishTime",
        deserialize_with = "lenient_published"
    )]
    pub provider_publish_time: Option<PublishedAt>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UrlRef {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderRef {
    #[serde(
        default,
        rename = "displayName",
        deserialize_with = "lenient_string"
    )]
    pub display_name: Option<String>,
}

/// The `content` container of the nested shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NestedContent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(
        default,
        rename = "clickThroughUrl",
        deserialize_with = "lenient_object"
    )]
    pub click_through_url: Option<UrlRef>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub provider: Option<ProviderRef>,
    #[serde(default, rename = "pubDate", deserialize_with = "lenient_published")]
    pub pub_date: Option<PublishedAt>,
}

/// One upstream news item, in one of the two known response shapes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Envelope")]
pub enum RawNewsItem {
    /// Fields live under `content`; `top` keeps the top-level fields for fallback.
    Nested {
        content: NestedContent,
        top: FlatFields,
    },
    Flat(FlatFields),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default, deserialize_with = "lenient_object")]
    content: Option<NestedContent>,
    #[serde(flatten)]
    top: FlatFields,
}

impl From<Envelope> for RawNewsItem {
    fn from(e: Envelope) -> Self {
        match e.content {
            Some(content) => RawNewsItem::Nested {
                content,
                top: e.top,
            },
            None => RawNewsItem::Flat(e.top),
        }
    }
}

impl RawNewsItem {
    /// Decode an arbitrary JSON value. Non-object input yields `None`.
    pub fn from_json(v: serde_json::Value) -> Option<Self> {
        if !v.is_object() {
            return None;
        }
        serde_json::from_value(v).ok()
    }
}

// Upstream fields change type without notice; anything unexpected reads as absent.

fn lenient_string<'de, D>(d: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_published<'de, D>(d: D) -> std::result::Result<Option<PublishedAt>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(d)?;
    Ok(PublishedAt::from_json(&v))
}

fn lenient_object<'de, D, T>(d: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let v = serde_json::Value::deserialize(d)?;
    if !v.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(v).ok())
}

// ------------------------------------------------------------
// Canonical + annotated records
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNewsRecord {
    pub title: String,
    pub link: String,
    pub publisher: String,
    pub published: PublishedAt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub news: CanonicalNewsRecord,
    pub sentiment_label: crate::sentiment::SentimentLabel,
    pub sentiment_score: f64,
}

impl AnnotatedRecord {
    pub fn new(news: CanonicalNewsRecord, sentiment: crate::sentiment::Sentiment) -> Self {
        Self {
            news,
            sentiment_label: sentiment.label,
            sentiment_score: sentiment.score,
        }
    }
}

/// Upstream collaborator returning raw items for one ticker.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_raw(&self, ticker: &Ticker) -> Result<Vec<RawNewsItem>>;
    fn name(&self) -> &'static str;
}

// ------------------------------------------------------------
// Price history
// ------------------------------------------------------------

/// Lookback windows the chart endpoint accepts.
pub const HISTORY_PERIODS: [&str; 11] = [
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];
pub const DEFAULT_HISTORY_PERIOD: &str = "1mo";

/// Validated lookback window such as `1mo` or `1y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPeriod(&'static str);

impl HistoryPeriod {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        HISTORY_PERIODS
            .iter()
            .find(|p| **p == raw)
            .copied()
            .map(HistoryPeriod)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Default for HistoryPeriod {
    fn default() -> Self {
        HistoryPeriod(DEFAULT_HISTORY_PERIOD)
    }
}

/// One trading day: split/dividend adjusted close and volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: chrono::NaiveDate,
    pub close: f64,
    pub volume: u64,
}

/// Upstream collaborator returning daily closes for one ticker.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn daily_closes(&self, ticker: &Ticker, period: &HistoryPeriod)
        -> Result<Vec<DailyClose>>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ticker_is_trimmed_and_uppercased() {
        assert_eq!(Ticker::parse(" aapl ").unwrap().as_str(), "AAPL");
        assert!(Ticker::parse("   ").is_none());
    }

    #[test]
    fn content_key_selects_nested_variant() {
        let v = json!({
            "id": "x",
            "content": { "title": "A", "pubDate": "2024-05-01T12:00:00Z" }
        });
        match RawNewsItem::from_json(v).unwrap() {
            RawNewsItem::Nested { content, .. } => {
                assert_eq!(content.title.as_deref(), Some("A"));
                assert_eq!(
                    content.pub_date,
                    Some(PublishedAt::Text("2024-05-01T12:00:00Z".into()))
                );
            }
            other => panic!("expected nested, got {other:?}"),
        }
    }

    #[test]
    fn wrong_types_read_as_absent() {
        let v = json!({
            "title": 42,
            "link": ["nope"],
            "providerPublishTime": 1_700_000_000,
            "content": "not an object"
        });
        let item = RawNewsItem::from_json(v).unwrap();
        assert_eq!(
            item,
            RawNewsItem::Flat(FlatFields {
                provider_publish_time: Some(PublishedAt::Timestamp(1_700_000_000.0)),
                ..FlatFields::default()
            })
        );
    }

    #[test]
    fn history_periods_are_validated() {
        assert_eq!(HistoryPeriod::parse(" 3MO ").unwrap().as_str(), "3mo");
        assert_eq!(HistoryPeriod::default().as_str(), "1mo");
        assert!(HistoryPeriod::parse("2w").is_none());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(RawNewsItem::from_json(json!("headline")).is_none());
    }
}
