// tests/store_dedup.rs
use chrono::{TimeZone, Utc};
use ticker_news_sentiment::store::DEFAULT_RECENT_LIMIT;
use ticker_news_sentiment::{
    AnnotatedRecord, CanonicalNewsRecord, NewsStore, PublishedAt, Sentiment, SentimentLabel,
    StoreError, StoreOptions,
};

fn record(link: &str, published: PublishedAt, score: f64) -> AnnotatedRecord {
    AnnotatedRecord::new(
        CanonicalNewsRecord {
            title: format!("Headline for {link}"),
            link: link.to_string(),
            publisher: "Reuters".into(),
            published,
        },
        Sentiment {
            label: SentimentLabel::Neutral,
            score,
        },
    )
}

fn at(day: u32) -> PublishedAt {
    PublishedAt::Timestamp(Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap().timestamp() as f64)
}

#[tokio::test]
async fn saving_same_batch_twice_is_idempotent() {
    let store = NewsStore::open_in_memory().await.unwrap();
    let batch = vec![record("a", at(1), 0.5), record("b", at(2), 0.5), record("c", at(3), 0.5)];

    let first = store.save("AAPL", &batch).await.unwrap();
    assert_eq!(first, 3);
    let before = store.count("AAPL").await.unwrap();

    let second = store.save("AAPL", &batch).await.unwrap();
    assert_eq!(second, 0);
    assert_eq!(store.count("AAPL").await.unwrap(), before);
}

#[tokio::test]
async fn partial_overlap_inserts_only_new_links() {
    let store = NewsStore::open_in_memory().await.unwrap();
    store.save("AAPL", &[record("a", at(1), 0.5)]).await.unwrap();
    let n = store
        .save("AAPL", &[record("a", at(1), 0.5), record("b", at(2), 0.5)])
        .await
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(store.count("AAPL").await.unwrap(), 2);
}

#[tokio::test]
async fn dedup_key_is_scoped_per_ticker() {
    let store = NewsStore::open_in_memory().await.unwrap();
    assert_eq!(store.save("AAPL", &[record("x", at(1), 0.5)]).await.unwrap(), 1);
    assert_eq!(store.save("TSLA", &[record("x", at(1), 0.5)]).await.unwrap(), 1);
    assert_eq!(store.count("AAPL").await.unwrap(), 1);
    assert_eq!(store.count("TSLA").await.unwrap(), 1);
}

#[tokio::test]
async fn ticker_case_does_not_defeat_dedup() {
    let store = NewsStore::open_in_memory().await.unwrap();
    assert_eq!(store.save("aapl", &[record("x", at(1), 0.5)]).await.unwrap(), 1);
    assert_eq!(store.save("AAPL", &[record("x", at(1), 0.5)]).await.unwrap(), 0);
    assert_eq!(store.get_recent(" Aapl ", 10).await.unwrap()[0].ticker, "AAPL");
}

#[tokio::test]
async fn get_recent_returns_newest_first_and_truncates() {
    let store = NewsStore::open_in_memory().await.unwrap();
    store
        .save(
            "AAPL",
            &[record("mid", at(2), 0.5), record("old", at(1), 0.5), record("new", at(3), 0.5)],
        )
        .await
        .unwrap();

    let got = store.get_recent("AAPL", 2).await.unwrap();
    let links: Vec<&str> = got.iter().map(|r| r.link.as_str()).collect();
    assert_eq!(links, vec!["new", "mid"]);
    assert!(got[0].published_date > got[1].published_date);
}

#[tokio::test]
async fn get_recent_for_unknown_ticker_is_empty() {
    let store = NewsStore::open_in_memory().await.unwrap();
    assert!(store.get_recent("NVDA", DEFAULT_RECENT_LIMIT).await.unwrap().is_empty());
}

#[tokio::test]
async fn default_limit_caps_at_fifty() {
    let store = NewsStore::open_in_memory().await.unwrap();
    let batch: Vec<_> = (0..60)
        .map(|i| record(&format!("l{i}"), PublishedAt::Timestamp(1_700_000_000.0 + f64::from(i)), 0.5))
        .collect();
    assert_eq!(store.save("AAPL", &batch).await.unwrap(), 60);
    let got = store.get_recent("AAPL", DEFAULT_RECENT_LIMIT).await.unwrap();
    assert_eq!(got.len(), 50);
    assert_eq!(got[0].link, "l59");
}

#[tokio::test]
async fn fault_mid_batch_rolls_back_everything() {
    let store = NewsStore::open_in_memory().await.unwrap();
    // Third record violates the score range constraint while staging.
    let batch = vec![
        record("r1", at(1), 0.1),
        record("r2", at(2), 0.2),
        record("r3", at(3), 1.5),
        record("r4", at(4), 0.4),
        record("r5", at(5), 0.5),
    ];

    let err = store.save("AAPL", &batch).await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)), "got {err:?}");
    assert!(err.is_constraint_violation());
    assert!(!err.is_transient());
    assert_eq!(store.count("AAPL").await.unwrap(), 0);

    // The store stays usable after the rollback.
    assert_eq!(store.save("AAPL", &batch[..2]).await.unwrap(), 2);
}

#[tokio::test]
async fn unparseable_dates_fall_back_to_write_time() {
    let store = NewsStore::open_in_memory().await.unwrap();
    let before = Utc::now().timestamp();
    store
        .save(
            "AAPL",
            &[
                record("text-date", PublishedAt::Text("sometime last week".into()), 0.5),
                record("rfc2822", PublishedAt::Text("Wed, 01 May 2024 12:00:00 +0000".into()), 0.5),
            ],
        )
        .await
        .unwrap();
    let got = store.get_recent("AAPL", 10).await.unwrap();
    let by_link = |l: &str| got.iter().find(|r| r.link == l).unwrap();
    assert!(by_link("text-date").published_date.timestamp() >= before);
    assert_eq!(by_link("rfc2822").published_date.timestamp(), 1_714_564_800);
}

#[tokio::test]
async fn empty_ticker_is_a_distinct_error() {
    let store = NewsStore::open_in_memory().await.unwrap();
    assert!(matches!(
        store.get_recent("", 5).await,
        Err(StoreError::InvalidTicker(_))
    ));
}

#[tokio::test]
async fn millisecond_epochs_keep_newest_first_ordering() {
    let store = NewsStore::open_in_memory().await.unwrap();
    let may_1 = 1_714_564_800.0;
    let may_2_ms = 1_714_651_200_000.0;
    store
        .save(
            "AAPL",
            &[
                record("secs", PublishedAt::Timestamp(may_1), 0.5),
                record("millis", PublishedAt::Timestamp(may_2_ms), 0.5),
            ],
        )
        .await
        .unwrap();

    let got = store.get_recent("AAPL", 10).await.unwrap();
    let links: Vec<&str> = got.iter().map(|r| r.link.as_str()).collect();
    assert_eq!(links, vec!["millis", "secs"]);
    assert_eq!(got[0].published_date.timestamp(), 1_714_651_200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_saves_of_one_link_store_it_once() {
    let tmp = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", tmp.path().join("race.db").display());
    let store = NewsStore::open(&url, StoreOptions::default()).await.unwrap();

    let batch = vec![record("shared", at(1), 0.5), record("also-shared", at(2), 0.5)];
    let (a, b) = tokio::join!(store.save("AAPL", &batch), store.save("AAPL", &batch));
    let (a, b) = (a.unwrap(), b.unwrap());

    // One writer commits both rows; the other sees them and inserts nothing.
    assert_eq!(a + b, 2);
    assert!(a == 0 || b == 0, "inserted {a} and {b}");
    assert_eq!(store.count("AAPL").await.unwrap(), 2);
    store.close().await;
}
