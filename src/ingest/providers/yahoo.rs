use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::ingest::types::{NewsSource, RawNewsItem, Ticker};

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    news: Vec<serde_json::Value>,
}

pub struct YahooNewsSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        base_url: String,
        news_count: u32,
        client: reqwest::Client,
    },
}

impl YahooNewsSource {
    /// Serve a captured search response instead of calling out.
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_base_url(base_url: &str, news_count: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (ticker-news-sentiment/0.1)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building yahoo http client")?;
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                news_count: news_count.max(1),
                client,
            },
        })
    }

    /// Accepts either a search response object or a bare array of items.
    fn parse_items_from_str(s: &str) -> Result<Vec<RawNewsItem>> {
        let t0 = std::time::Instant::now();
        let values = match serde_json::from_str::<serde_json::Value>(s).context("parsing yahoo json")? {
            serde_json::Value::Array(items) => items,
            obj @ serde_json::Value::Object(_) => {
                serde_json::from_value::<SearchResp>(obj)
                    .context("decoding yahoo search response")?
                    .news
            }
            _ => return Err(anyhow!("unexpected yahoo payload")),
        };

        let total = values.len();
        let out: Vec<RawNewsItem> = values.into_iter().filter_map(RawNewsItem::from_json).collect();
        if out.len() < total {
            tracing::debug!(
                target: "ingest",
                skipped = total - out.len(),
                "skipped undecodable yahoo items"
            );
        }

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl NewsSource for YahooNewsSource {
    async fn fetch_raw(&self, ticker: &Ticker) -> Result<Vec<RawNewsItem>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http {
                base_url,
                news_count,
                client,
            } => {
                let url = format!("{base_url}/v1/finance/search");
                let count = news_count.to_string();
                let resp = client
                    .get(&url)
                    .query(&[
                        ("q", ticker.as_str()),
                        ("quotesCount", "0"),
                        ("newsCount", count.as_str()),
                    ])
                    .send()
                    .await;
                let resp = match resp {
                    Ok(r) => r,
                    Err(e) => {
                        counter!("ingest_provider_errors_total").increment(1);
                        return Err(e).context("yahoo http get()");
                    }
                };
                let status = resp.status();
                if !status.is_success() {
                    counter!("ingest_provider_errors_total").increment(1);
                    return Err(anyhow!("yahoo search returned {status}"));
                }
                let parsed = match resp.text().await {
                    Ok(body) => Self::parse_items_from_str(&body),
                    Err(e) => Err(e).context("yahoo http .text()"),
                };
                if parsed.is_err() {
                    counter!("ingest_provider_errors_total").increment(1);
                }
                parsed
            }
        }
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_array_and_search_object_both_parse() {
        let arr = r#"[{"title":"A"}, 7, {"content":{"title":"B"}}]"#;
        assert_eq!(YahooNewsSource::parse_items_from_str(arr).unwrap().len(), 2);

        let obj = r#"{"count":1,"quotes":[],"news":[{"title":"A","link":"l"}]}"#;
        assert_eq!(YahooNewsSource::parse_items_from_str(obj).unwrap().len(), 1);
    }

    #[test]
    fn missing_news_key_is_empty() {
        assert!(YahooNewsSource::parse_items_from_str("{}").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(YahooNewsSource::parse_items_from_str("<html>").is_err());
        assert!(YahooNewsSource::parse_items_from_str("\"str\"").is_err());
    }
}
