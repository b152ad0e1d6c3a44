//! One-shot ingestion: `ingest_once <TICKER> [LIMIT]`.
//! Fetches, annotates and stores headlines, then prints the most recent rows.

use anyhow::{bail, Context};
use ticker_news_sentiment::{build_state, config, ingest, telemetry, Ticker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(raw_ticker) = args.next() else {
        bail!("usage: ingest_once <TICKER> [LIMIT]");
    };
    let ticker = Ticker::parse(&raw_ticker).context("ticker must not be empty")?;
    let limit = match args.next() {
        Some(s) => s.parse::<usize>().context("LIMIT must be a positive integer")?,
        None => 10,
    };

    let cfg = config::app::load_default()?;
    let state = build_state(&cfg).await?;

    let outcome = ingest::run_once(
        state.source.as_ref(),
        state.annotator.as_ref(),
        &state.store,
        &ticker,
    )
    .await;

    let result = match outcome {
        Ok(report) => {
            for n in &report.notices {
                eprintln!("notice: {n}");
            }
            println!(
                "{}: fetched={} normalized={} inserted={} skipped={} neutral_fallbacks={}",
                report.ticker,
                report.fetched,
                report.normalized,
                report.inserted,
                report.skipped,
                report.annotation_fallbacks
            );

            match state.store.sentiment_summary(ticker.as_str()).await {
                Ok(s) => println!(
                    "stored: total={} positive={} negative={} neutral={}",
                    s.total, s.positive, s.negative, s.neutral
                ),
                Err(e) => eprintln!("notice: summary unavailable: {e}"),
            }

            match state.store.get_recent(ticker.as_str(), limit).await {
                Ok(rows) => {
                    for r in rows {
                        println!(
                            "{}  {:<8} {:.2}  {}",
                            r.published_date.format("%Y-%m-%d %H:%M"),
                            r.sentiment_label,
                            r.sentiment_score,
                            r.title
                        );
                    }
                    Ok(())
                }
                Err(e) => Err(e).context("reading recent records"),
            }
        }
        Err(e) => Err(e).context("saving ingested records failed; nothing was stored"),
    };

    state.store.close().await;
    result
}
