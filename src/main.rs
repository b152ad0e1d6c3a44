//! Ticker News Sentiment HTTP entrypoint.
//! Boots the Axum server with the news store, annotator and `/metrics`.

use shuttle_axum::ShuttleAxum;
use ticker_news_sentiment::{build_state, config, metrics::Metrics, router, telemetry};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = config::app::load_default()?;
    let state = build_state(&cfg).await?;

    let mut app = router(state);
    match Metrics::init() {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(app.into())
}
