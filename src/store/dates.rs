//! Best-effort resolution of upstream publication times.

use chrono::{DateTime, Datelike, NaiveDateTime, SubsecRound, Utc};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::types::PublishedAt;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// 9999-12-31T23:59:59Z. Stored dates are compared as text, so they must
/// keep a four-digit year.
const MAX_UNIX_SECS: f64 = 253_402_300_799.0;

/// Resolve to a second-precision UTC timestamp; anything unparseable or
/// outside years 1970..=9999 becomes `now`.
pub fn resolve_published(raw: &PublishedAt, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = match raw {
        PublishedAt::Timestamp(secs) => from_unix(*secs),
        PublishedAt::Text(s) => parse_text(s),
    }
    .filter(|dt| (1970..=9999).contains(&dt.year()));
    match parsed {
        Some(dt) => dt.trunc_subsecs(0),
        None => {
            tracing::debug!(target: "store", raw = ?raw, "unparseable publication date; using now");
            now.trunc_subsecs(0)
        }
    }
}

/// Unix seconds; values too large for seconds are read as milliseconds.
fn from_unix(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let secs = if secs > MAX_UNIX_SECS { secs / 1_000.0 } else { secs };
    if secs > MAX_UNIX_SECS {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

fn parse_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(n) = s.parse::<f64>() {
        return from_unix(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OffsetDateTime::parse(s, &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
    {
        return Some(dt);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap()
    }

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn numeric_is_unix_seconds() {
        let ts = expected().timestamp() as f64 + 0.75;
        assert_eq!(resolve_published(&PublishedAt::Timestamp(ts), now()), expected());
    }

    #[test]
    fn text_formats_are_parsed() {
        for s in [
            "2024-05-01T12:00:00Z",
            "2024-05-01T14:00:00+02:00",
            "Wed, 01 May 2024 12:00:00 +0000",
            "2024-05-01 12:00:00",
            "1714564800",
        ] {
            assert_eq!(
                resolve_published(&PublishedAt::Text(s.into()), now()),
                expected(),
                "format {s}"
            );
        }
    }

    #[test]
    fn garbage_falls_back_to_now() {
        assert_eq!(resolve_published(&PublishedAt::Text("yesterday".into()), now()), now());
        assert_eq!(resolve_published(&PublishedAt::Timestamp(f64::NAN), now()), now());
        assert_eq!(resolve_published(&PublishedAt::Timestamp(1e300), now()), now());
        assert_eq!(resolve_published(&PublishedAt::Timestamp(-5.0), now()), now());
    }

    #[test]
    fn millisecond_epochs_are_scaled() {
        let ms = expected().timestamp() as f64 * 1_000.0;
        assert_eq!(resolve_published(&PublishedAt::Timestamp(ms), now()), expected());
        assert_eq!(
            resolve_published(&PublishedAt::Text("1714564800000".into()), now()),
            expected()
        );
    }

    #[test]
    fn years_beyond_four_digits_fall_back_to_now() {
        assert_eq!(
            resolve_published(&PublishedAt::Text("+12024-05-01T12:00:00Z".into()), now()),
            now()
        );
        assert_eq!(
            resolve_published(&PublishedAt::Text("0099-05-01 12:00:00".into()), now()),
            now()
        );
    }
}
