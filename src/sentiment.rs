use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../finance_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid finance lexicon")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" => Ok(SentimentLabel::Positive),
            "negative" | "neg" => Ok(SentimentLabel::Negative),
            "neutral" | "neu" => Ok(SentimentLabel::Neutral),
            other => anyhow::bail!("unknown sentiment label: {other}"),
        }
    }
}

/// Label plus confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

impl Sentiment {
    /// Substituted whenever the classifier fails.
    pub const NEUTRAL_FALLBACK: Sentiment = Sentiment {
        label: SentimentLabel::Neutral,
        score: 0.0,
    };

    pub fn new(label: SentimentLabel, score: f64) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { label, score }
    }
}

/// Offline headline classifier backed by the embedded finance lexicon.
#[derive(Debug, Clone, Default)]
pub struct LexiconAnnotator;

impl LexiconAnnotator {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (net score, total absolute evidence).
    /// A negator in the previous 1..=3 tokens flips a word's sign.
    pub fn score_text(&self, text: &str) -> (i32, u32) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut net: i32 = 0;
        let mut evidence: u32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            net += if negated { -base } else { base };
            evidence += base.unsigned_abs();
        }

        (net, evidence)
    }

    pub fn classify(&self, text: &str) -> Sentiment {
        let (net, evidence) = self.score_text(text);
        let magnitude = f64::from(net.unsigned_abs());
        match net.signum() {
            1 => Sentiment::new(SentimentLabel::Positive, magnitude / (magnitude + 1.0)),
            -1 => Sentiment::new(SentimentLabel::Negative, magnitude / (magnitude + 1.0)),
            _ => Sentiment::new(SentimentLabel::Neutral, 1.0 / (1.0 + f64::from(evidence))),
        }
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "without"
            | "fails"
    )
}
