//! Source registry: RSS/Atom feed connectors plus HTML-scraped sources.
//!
//! Each connector turns its origin into normalized `NewsItem`s and nothing
//! more; time-window filtering happens here at fetch, everything else in
//! the pipeline. A malformed entry is logged and skipped, never fatal for
//! the feed.

mod scraped;

pub use scraped::{ExtractionRules, ScrapedSource};

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info};

use satwire_common::{item_id, url_hash, NewsItem};

use crate::traits::SourceConnector;

const USER_AGENT: &str = "satwire-ingest/0.1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const SUMMARY_MAX_CHARS: usize = 300;

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Feed sources
// ---------------------------------------------------------------------------

/// Static description of one RSS/Atom source.
#[derive(Debug, Clone)]
pub struct FeedSpec {
    /// Registry key.
    pub name: &'static str,
    /// Publication name; `None` means it is derived per item (Google News
    /// aggregates many outlets and encodes the outlet in the title).
    pub source_ref: Option<&'static str>,
    pub feed_url: &'static str,
    pub category: &'static str,
    pub tags: &'static [&'static str],
}

pub struct FeedSource {
    spec: FeedSpec,
    http: reqwest::Client,
}

impl FeedSource {
    pub fn new(spec: FeedSpec) -> Self {
        Self {
            spec,
            http: http_client(),
        }
    }

    fn normalize_entry(&self, entry: feed_rs::model::Entry) -> Option<NewsItem> {
        let url = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

        let raw_title = entry.title.as_ref().map(|t| t.content.clone())?;
        if raw_title.is_empty() {
            return None;
        }

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        // Google News embeds the outlet in the title ("Headline - Outlet").
        let (title, source_ref) = if self.spec.source_ref.is_none() {
            split_aggregated_title(&raw_title)
        } else {
            (raw_title, self.spec.source_ref.map(str::to_string))
        };

        let summary = entry
            .summary
            .as_ref()
            .map(|s| strip_html(&s.content))
            .filter(|s| !s.is_empty())
            .map(|s| truncate_chars(&s, SUMMARY_MAX_CHARS));

        let author = entry
            .authors
            .first()
            .map(|a| a.name.clone())
            .filter(|a| !a.is_empty());

        let image_url = entry
            .media
            .first()
            .and_then(|m| m.thumbnails.first().map(|t| t.image.uri.clone()));

        let hash = url_hash(&url);

        Some(NewsItem {
            id: item_id(self.spec.name, &hash),
            source: self.spec.name.to_string(),
            source_ref,
            title,
            summary,
            url,
            author,
            published_at,
            tags: self.spec.tags.iter().map(|t| t.to_string()).collect(),
            url_hash: Some(hash),
            image_url,
            category: self.spec.category.to_string(),
            raw: serde_json::Map::new(),
            translation_status: None,
            group_id: None,
        })
    }
}

#[async_trait]
impl SourceConnector for FeedSource {
    fn name(&self) -> &str {
        self.spec.name
    }

    async fn fetch(&self, window_hours: i64) -> Result<Vec<NewsItem>> {
        info!(source = %self.spec.name, url = %self.spec.feed_url, "Fetching feed");

        let resp = self
            .http
            .get(self.spec.feed_url)
            .send()
            .await
            .context("feed fetch failed")?;
        let bytes = resp.bytes().await.context("failed to read feed body")?;
        let feed = feed_rs::parser::parse(&bytes[..]).context("failed to parse feed")?;

        let cutoff = Utc::now() - chrono::Duration::hours(window_hours);
        let mut items = Vec::new();
        for entry in feed.entries {
            let Some(item) = self.normalize_entry(entry) else {
                debug!(source = %self.spec.name, "Skipping malformed entry");
                continue;
            };
            if !within_window(item.published_at, cutoff) {
                continue;
            }
            items.push(item);
        }

        info!(source = %self.spec.name, count = items.len(), "Feed fetched");
        Ok(items)
    }
}

/// Dateless items pass: better a stray old article than silently dropping
/// feeds that omit timestamps.
fn within_window(published_at: Option<DateTime<Utc>>, cutoff: DateTime<Utc>) -> bool {
    published_at.map_or(true, |p| p >= cutoff)
}

/// Split "Headline - Outlet" into the headline and the outlet name, on the
/// last " - " occurrence.
fn split_aggregated_title(title: &str) -> (String, Option<String>) {
    match title.rsplit_once(" - ") {
        Some((head, outlet)) if !head.trim().is_empty() && !outlet.trim().is_empty() => {
            (head.trim().to_string(), Some(outlet.trim().to_string()))
        }
        _ => (title.to_string(), None),
    }
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Drop HTML tags, decode the common entities, collapse whitespace. Tags
/// become spaces so adjacent text nodes do not fuse.
pub(crate) fn strip_html(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All built-in sources, in registration order. The engine processes
/// sources in this order, so summaries and progress are deterministic.
pub fn builtin_sources() -> Vec<Arc<dyn SourceConnector>> {
    let feeds = [
        FeedSpec {
            name: "googlenews",
            source_ref: None,
            feed_url: "https://news.google.com/rss/search?q=bitcoin&hl=en-US&gl=US",
            category: "news",
            tags: &["bitcoin"],
        },
        FeedSpec {
            name: "bitcoinmagazine",
            source_ref: Some("Bitcoin Magazine"),
            feed_url: "https://bitcoinmagazine.com/feed",
            category: "news",
            tags: &["bitcoin"],
        },
        FeedSpec {
            name: "optech",
            source_ref: Some("Bitcoin Optech"),
            feed_url: "https://bitcoinops.org/feed.xml",
            category: "technical",
            tags: &["bitcoin", "technical", "development"],
        },
        FeedSpec {
            name: "coindesk",
            source_ref: Some("CoinDesk"),
            feed_url: "https://www.coindesk.com/arc/outboundfeeds/rss/",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "cointelegraph",
            source_ref: Some("Cointelegraph"),
            feed_url: "https://cointelegraph.com/rss",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "theblock",
            source_ref: Some("The Block"),
            feed_url: "https://www.theblock.co/rss.xml",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "decrypt",
            source_ref: Some("Decrypt"),
            feed_url: "https://decrypt.co/feed",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "bitcoincom",
            source_ref: Some("Bitcoin.com"),
            feed_url: "https://news.bitcoin.com/feed/",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "blockworks",
            source_ref: Some("Blockworks"),
            feed_url: "https://blockworks.co/feed/",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "cryptoslate",
            source_ref: Some("CryptoSlate"),
            feed_url: "https://cryptoslate.com/feed/",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "coindeskkorea",
            source_ref: Some("코인데스크코리아"),
            feed_url: "https://www.coindeskkorea.com/feed/",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "blockmedia",
            source_ref: Some("블록미디어"),
            feed_url: "https://www.blockmedia.co.kr/feed/",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
        FeedSpec {
            name: "tokenpost",
            source_ref: Some("토큰포스트"),
            feed_url: "https://www.tokenpost.kr/rss",
            category: "news",
            tags: &["bitcoin", "crypto"],
        },
    ];

    let mut sources: Vec<Arc<dyn SourceConnector>> = feeds
        .into_iter()
        .map(|spec| Arc::new(FeedSource::new(spec)) as Arc<dyn SourceConnector>)
        .collect();

    sources.push(Arc::new(ScrapedSource::new(ExtractionRules {
        name: "theminermag",
        source_ref: "The Miner Mag",
        list_url: "https://theminermag.com/news",
        link_pattern: "/news/",
        category: "news",
        tags: &["bitcoin", "mining"],
    })));

    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_unique_names_in_stable_order() {
        let sources = builtin_sources();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();

        assert_eq!(names.first(), Some(&"googlenews"));
        assert_eq!(names.last(), Some(&"theminermag"));

        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len(), "duplicate source names");
    }

    #[test]
    fn strips_tags_and_entities() {
        assert_eq!(
            strip_html("<p>Bitcoin &amp; Lightning</p>\n\n<b>news</b>"),
            "Bitcoin & Lightning news"
        );
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn splits_aggregated_titles_on_last_separator() {
        let (title, outlet) = split_aggregated_title("Bitcoin rises - again - Bloomberg");
        assert_eq!(title, "Bitcoin rises - again");
        assert_eq!(outlet.as_deref(), Some("Bloomberg"));

        let (title, outlet) = split_aggregated_title("No outlet here");
        assert_eq!(title, "No outlet here");
        assert!(outlet.is_none());
    }

    #[test]
    fn dateless_entries_pass_the_window() {
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        assert!(within_window(None, cutoff));
        assert!(within_window(Some(Utc::now()), cutoff));
        assert!(!within_window(
            Some(Utc::now() - chrono::Duration::hours(48)),
            cutoff
        ));
    }

    #[test]
    fn long_summaries_are_truncated_with_ellipsis() {
        let long = "a".repeat(400);
        let out = truncate_chars(&long, SUMMARY_MAX_CHARS);
        assert_eq!(out.chars().count(), SUMMARY_MAX_CHARS);
        assert!(out.ends_with("..."));
    }
}
