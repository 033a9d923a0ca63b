//! HTML list-page scraping for sources without a usable feed.
//!
//! No headless browser: the list page is fetched as plain HTML and
//! article anchors are pulled out by pattern. Titles come from the anchor
//! text, tags stripped. Scraped items rarely expose a machine-readable
//! publish date, so they are left dateless and pass the fetch window.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use satwire_common::{item_id, url_hash, NewsItem};

use crate::traits::SourceConnector;

use super::{http_client, strip_html};

/// Scraped list pages are capped so one run never ingests a full archive.
const MAX_ARTICLES: usize = 20;

/// How to pull article links out of one list page.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    /// Registry key.
    pub name: &'static str,
    pub source_ref: &'static str,
    pub list_url: &'static str,
    /// Substring an article href must contain.
    pub link_pattern: &'static str,
    pub category: &'static str,
    pub tags: &'static [&'static str],
}

pub struct ScrapedSource {
    rules: ExtractionRules,
    http: reqwest::Client,
}

impl ScrapedSource {
    pub fn new(rules: ExtractionRules) -> Self {
        Self {
            rules,
            http: http_client(),
        }
    }
}

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]+href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).expect("valid regex")
});

/// Extract `(url, title)` pairs for anchors whose resolved href contains
/// `pattern`. Relative hrefs resolve against `base_url`; anchors with no
/// visible text and repeated URLs are dropped.
pub fn extract_articles(html: &str, base_url: &str, pattern: &str) -> Vec<(String, String)> {
    let base = url::Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut articles = Vec::new();

    for cap in ANCHOR_RE.captures_iter(html) {
        let raw_href = &cap[1];

        let resolved = if raw_href.starts_with("http://") || raw_href.starts_with("https://") {
            raw_href.to_string()
        } else if let Some(base) = &base {
            match base.join(raw_href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            }
        } else {
            continue;
        };

        if !resolved.contains(pattern) {
            continue;
        }
        // The list page itself usually matches its own pattern.
        if resolved.trim_end_matches('/') == base_url.trim_end_matches('/') {
            continue;
        }

        let title = strip_html(&cap[2]);
        if title.is_empty() {
            continue;
        }

        if seen.insert(resolved.clone()) {
            articles.push((resolved, title));
            if articles.len() >= MAX_ARTICLES {
                break;
            }
        }
    }

    articles
}

#[async_trait]
impl SourceConnector for ScrapedSource {
    fn name(&self) -> &str {
        self.rules.name
    }

    async fn fetch(&self, _window_hours: i64) -> Result<Vec<NewsItem>> {
        info!(source = %self.rules.name, url = %self.rules.list_url, "Scraping list page");

        let resp = self
            .http
            .get(self.rules.list_url)
            .send()
            .await
            .context("list page fetch failed")?;
        let html = resp.text().await.context("failed to read list page body")?;

        let articles = extract_articles(&html, self.rules.list_url, self.rules.link_pattern);
        if articles.is_empty() {
            // An empty list page means the markup changed, not a quiet day.
            bail!("no articles extracted from {}", self.rules.list_url);
        }

        let items = articles
            .into_iter()
            .map(|(url, title)| {
                let hash = url_hash(&url);
                NewsItem {
                    id: item_id(self.rules.name, &hash),
                    source: self.rules.name.to_string(),
                    source_ref: Some(self.rules.source_ref.to_string()),
                    title,
                    summary: None,
                    url,
                    author: None,
                    published_at: None,
                    tags: self.rules.tags.iter().map(|t| t.to_string()).collect(),
                    url_hash: Some(hash),
                    image_url: None,
                    category: self.rules.category.to_string(),
                    raw: serde_json::Map::new(),
                    translation_status: None,
                    group_id: None,
                }
            })
            .collect::<Vec<_>>();

        info!(source = %self.rules.name, count = items.len(), "List page scraped");
        Ok(items)
    }
}
