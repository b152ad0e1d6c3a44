//! Daily price history from the Yahoo chart endpoint.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use metrics::counter;
use serde::Deserialize;

use crate::ingest::types::{DailyClose, HistoryPeriod, PriceSource, Ticker};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartData>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
    #[serde(default)]
    adjclose: Vec<AdjCloseSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseSeries {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

pub struct YahooPriceSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl YahooPriceSource {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (ticker-news-sentiment/0.1)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building yahoo chart client")?;
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                client,
            },
        })
    }

    /// Days with a missing close are skipped; a missing volume reads as 0.
    /// The adjusted close wins over the raw close when present.
    fn parse_closes(s: &str) -> Result<Vec<DailyClose>> {
        let resp: ChartResponse = serde_json::from_str(s).context("parsing yahoo chart json")?;
        if let Some(err) = resp.chart.error {
            bail!("yahoo chart error: {} - {}", err.code, err.description);
        }
        let data = resp
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| anyhow!("yahoo chart response has no result"))?;

        let quote = data.indicators.quote.into_iter().next();
        let adj = data.indicators.adjclose.into_iter().next();

        let mut out = Vec::with_capacity(data.timestamp.len());
        for (i, ts) in data.timestamp.iter().enumerate() {
            let adjusted = adj.as_ref().and_then(|a| a.adjclose.get(i).copied().flatten());
            let raw = quote.as_ref().and_then(|q| q.close.get(i).copied().flatten());
            let Some(close) = adjusted.or(raw).filter(|c| c.is_finite()) else {
                continue;
            };
            let Some(day) = DateTime::from_timestamp(*ts, 0) else {
                continue;
            };
            let volume = quote
                .as_ref()
                .and_then(|q| q.volume.get(i).copied().flatten())
                .unwrap_or(0);
            out.push(DailyClose {
                date: day.date_naive(),
                close,
                volume,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn daily_closes(&self, ticker: &Ticker, period: &HistoryPeriod) -> Result<Vec<DailyClose>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_closes(s),
            Mode::Http { base_url, client } => {
                let url = format!("{base_url}/v8/finance/chart/{}", ticker.as_str());
                let res: Result<Vec<DailyClose>> = async {
                    let resp = client
                        .get(&url)
                        .query(&[("range", period.as_str()), ("interval", "1d")])
                        .send()
                        .await
                        .context("yahoo chart get()")?;
                    // Yahoo reports unknown symbols as 404 with a JSON error body.
                    let body = resp.text().await.context("yahoo chart .text()")?;
                    Self::parse_closes(&body)
                }
                .await;
                if let Err(e) = &res {
                    counter!("ingest_provider_errors_total").increment(1);
                    tracing::warn!(target: "ingest", error = ?e, %ticker, "price history fetch failed");
                }
                res
            }
        }
    }

    fn name(&self) -> &'static str {
        "yahoo-chart"
    }
}
