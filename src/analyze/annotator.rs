//! Sentiment annotator boundary: trait, lexicon/FinBERT implementations, neutral fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::annotator::AnnotatorConfig;
use crate::sentiment::{LexiconAnnotator, Sentiment, SentimentLabel};

pub type AnnotateFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Sentiment>> + Send + 'a>>;

/// Headline classifier: text in, label + confidence out.
pub trait Annotator: Send + Sync {
    fn annotate<'a>(&'a self, text: &'a str) -> AnnotateFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynAnnotator = Arc<dyn Annotator>;

/// Run the annotator and substitute `{neutral, 0.0}` on failure.
/// Returns the sentiment and whether the fallback was used.
pub async fn annotate_or_neutral(annotator: &dyn Annotator, text: &str) -> (Sentiment, bool) {
    match annotator.annotate(text).await {
        Ok(s) => (Sentiment::new(s.label, s.score), false),
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                error = %e,
                annotator = annotator.name(),
                "annotation failed; using neutral fallback"
            );
            counter!("ingest_annotation_fallback_total").increment(1);
            (Sentiment::NEUTRAL_FALLBACK, true)
        }
    }
}

/// Factory: build an annotator according to config. Provider names are
/// case-insensitive; unknown names are an error.
pub fn build_annotator(config: &AnnotatorConfig) -> anyhow::Result<DynAnnotator> {
    match config.provider.trim().to_ascii_lowercase().as_str() {
        "finbert" => Ok(Arc::new(FinbertHttpAnnotator::new(config)?)),
        "lexicon" => Ok(Arc::new(LexiconAnnotator::new())),
        other => Err(anyhow!("unsupported annotator provider: {other}")),
    }
}

impl Annotator for LexiconAnnotator {
    fn annotate<'a>(&'a self, text: &'a str) -> AnnotateFuture<'a> {
        let out = self.classify(text);
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "lexicon"
    }
}

// ------------------------------------------------------------
// Hosted FinBERT text-classification endpoint
// ------------------------------------------------------------

pub struct FinbertHttpAnnotator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// The inference API answers either `[{..}]` or `[[{..}]]` (one list per input).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResp {
    Batched(Vec<Vec<LabelScore>>),
    Single(Vec<LabelScore>),
}

impl FinbertHttpAnnotator {
    pub fn new(config: &AnnotatorConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("ticker-news-sentiment/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building annotator http client")?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn classify(&self, text: &str) -> anyhow::Result<Sentiment> {
        #[derive(Serialize)]
        struct Req<'a> {
            inputs: &'a str,
        }

        let mut req = self.http.post(&self.endpoint).json(&Req { inputs: text });
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await.context("finbert http post")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("finbert endpoint returned {status}"));
        }
        let body: ClassifyResp = resp.json().await.context("decoding finbert response")?;
        pick_top_label(body)
    }
}

fn pick_top_label(body: ClassifyResp) -> anyhow::Result<Sentiment> {
    let scores = match body {
        ClassifyResp::Batched(mut v) => {
            if v.is_empty() {
                Vec::new()
            } else {
                v.swap_remove(0)
            }
        }
        ClassifyResp::Single(v) => v,
    };
    let best = scores
        .into_iter()
        .filter(|ls| ls.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| anyhow!("finbert response had no labels"))?;
    let label: SentimentLabel = best.label.parse()?;
    Ok(Sentiment::new(label, best.score))
}

impl Annotator for FinbertHttpAnnotator {
    fn annotate<'a>(&'a self, text: &'a str) -> AnnotateFuture<'a> {
        Box::pin(self.classify(text))
    }
    fn name(&self) -> &'static str {
        "finbert"
    }
}
