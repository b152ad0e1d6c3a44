// src/ingest/normalize.rs
//! Canonicalization of upstream news items (nested and flat shapes).

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::{
    CanonicalNewsRecord, FlatFields, PublishedAt, RawNewsItem, NO_LINK, UNKNOWN_PUBLISHER,
};

const TITLE_MAX_CHARS: usize = 1500;

/// Clean headline text: decode entities, fold quotes, collapse whitespace.
///
/// Headlines arrive as plain text, so `<` and `>` are kept verbatim
/// ("VIX > 30" is a headline, not markup).
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 3) Collapse whitespace (incl. NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > TITLE_MAX_CHARS {
        out = out.chars().take(TITLE_MAX_CHARS).collect();
    }
    out
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn clean_title(s: Option<&str>) -> Option<String> {
    s.map(normalize_text).filter(|t| !t.is_empty())
}

/// Fields resolved so far; `None` means "keep looking".
#[derive(Default)]
struct Resolved {
    title: Option<String>,
    link: Option<String>,
    publisher: Option<String>,
    published: Option<PublishedAt>,
}

impl Resolved {
    fn fill_from_top(&mut self, top: &FlatFields) {
        if self.title.is_none() {
            self.title = clean_title(top.title.as_deref());
        }
        if self.link.is_none() {
            self.link = non_empty(top.link.as_deref()).or_else(|| non_empty(top.url.as_deref()));
        }
        if self.publisher.is_none() {
            self.publisher = non_empty(top.publisher.as_deref());
        }
        if self.published.is_none() {
            self.published = top.provider_publish_time.clone();
        }
    }
}

/// Normalize one item using `now` as the publication fallback.
/// Returns `None` when no title can be extracted.
pub fn normalize_at(item: &RawNewsItem, now: DateTime<Utc>) -> Option<CanonicalNewsRecord> {
    let mut r = Resolved::default();

    let top = match item {
        RawNewsItem::Nested { content, top } => {
            r.title = clean_title(content.title.as_deref());
            r.link = content
                .click_through_url
                .as_ref()
                .and_then(|c| non_empty(c.url.as_deref()));
            r.publisher = content
                .provider
                .as_ref()
                .and_then(|p| non_empty(p.display_name.as_deref()));
            r.published = content.pub_date.clone();
            top
        }
        RawNewsItem::Flat(top) => top,
    };
    r.fill_from_top(top);

    let Some(title) = r.title else {
        tracing::debug!(target: "ingest", "dropping item without title");
        return None;
    };

    Some(CanonicalNewsRecord {
        title,
        link: r.link.unwrap_or_else(|| NO_LINK.to_string()),
        publisher: r.publisher.unwrap_or_else(|| UNKNOWN_PUBLISHER.to_string()),
        published: r
            .published
            .unwrap_or_else(|| PublishedAt::Timestamp(now.timestamp() as f64)),
    })
}

pub fn normalize(item: &RawNewsItem) -> Option<CanonicalNewsRecord> {
    normalize_at(item, Utc::now())
}

/// Lazily normalize a sequence; items without a title are skipped.
pub fn normalize_all<'a, I>(items: I) -> impl Iterator<Item = CanonicalNewsRecord> + 'a
where
    I: IntoIterator<Item = &'a RawNewsItem>,
    I::IntoIter: 'a,
{
    let now = Utc::now();
    items.into_iter().filter_map(move |it| normalize_at(it, now))
}
