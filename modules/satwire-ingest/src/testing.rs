//! In-memory mocks and item builders for pipeline and engine tests.
//!
//! Everything here is deterministic and network-free. Mocks are built
//! fluently (`MockStore::new().with_existing_hash(..)`) and expose
//! accessors for asserting on recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use satwire_common::{
    item_id, url_hash, NewsItem, ProgressUpdate, SourceStatus, TranslationStatus,
};
use satwire_store::StoredCandidate;

use crate::traits::{ItemStore, ProgressSink, SourceConnector, Translator};

// ---------------------------------------------------------------------------
// Item builders
// ---------------------------------------------------------------------------

fn base_item(source: &str, title: &str, url: String) -> NewsItem {
    let hash = url_hash(&url);
    NewsItem {
        id: item_id(source, &hash),
        source: source.to_string(),
        source_ref: None,
        title: title.to_string(),
        summary: None,
        url,
        author: None,
        published_at: Some(Utc::now()),
        tags: Vec::new(),
        url_hash: Some(hash),
        image_url: None,
        category: "news".to_string(),
        raw: serde_json::Map::new(),
        translation_status: None,
        group_id: None,
    }
}

/// Item with a unique URL and the given title.
pub fn item_with_title(source: &str, title: &str) -> NewsItem {
    let url = format!("https://{source}.example.com/{}", Uuid::new_v4());
    base_item(source, title, url)
}

/// Item with a fixed, caller-chosen URL hash.
pub fn item_with_hash(source: &str, title: &str, hash: &str) -> NewsItem {
    let mut item = item_with_title(source, title);
    item.url_hash = Some(hash.to_string());
    item.id = item_id(source, hash);
    item
}

/// Item whose URL lives on a specific domain.
pub fn item_on_domain(source: &str, title: &str, domain: &str) -> NewsItem {
    let url = format!("https://{domain}/{}", Uuid::new_v4());
    base_item(source, title, url)
}

/// Persisted-candidate fixture for grouping tests.
pub fn candidate(
    id: &str,
    title: &str,
    url: &str,
    published_at: DateTime<Utc>,
    group_id: Option<&str>,
) -> StoredCandidate {
    StoredCandidate {
        id: id.to_string(),
        title: title.to_string(),
        url: url.to_string(),
        published_at: Some(published_at),
        group_id: group_id.map(str::to_string),
        original_title: None,
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockStoreState {
    existing: HashSet<String>,
    candidates: Vec<StoredCandidate>,
    saved: Vec<NewsItem>,
    group_updates: Vec<(String, String)>,
    statuses: HashMap<String, SourceStatus>,
    failing_ids: HashSet<String>,
}

/// In-memory [`ItemStore`]. Saved items feed back into the duplicate set,
/// so save-then-rerun sequences behave like the real store.
#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockStoreState>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing_hash(self, hash: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .existing
            .insert(hash.to_string());
        self
    }

    pub fn with_candidate(self, candidate: StoredCandidate) -> Self {
        self.state.lock().unwrap().candidates.push(candidate);
        self
    }

    /// Make `save` fail for this item id.
    pub fn with_save_failure(self, item_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_ids
            .insert(item_id.to_string());
        self
    }

    pub fn saved_items(&self) -> Vec<NewsItem> {
        self.state.lock().unwrap().saved.clone()
    }

    pub fn group_updates(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().group_updates.clone()
    }

    pub fn status_for(&self, source: &str) -> Option<SourceStatus> {
        self.state.lock().unwrap().statuses.get(source).cloned()
    }
}

#[async_trait]
impl ItemStore for MockStore {
    async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>> {
        let state = self.state.lock().unwrap();
        let mut known = state.existing.clone();
        known.extend(state.saved.iter().filter_map(|i| i.url_hash.clone()));
        Ok(hashes
            .iter()
            .filter(|h| known.contains(*h))
            .cloned()
            .collect())
    }

    async fn candidates_in_window(
        &self,
        domain: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredCandidate>> {
        let state = self.state.lock().unwrap();
        let mut matches: Vec<StoredCandidate> = state
            .candidates
            .iter()
            .filter(|c| c.domain() == domain)
            // NULL publish dates fall outside the window, matching the
            // real store's `published_at >= $1` predicate.
            .filter(|c| c.published_at.map_or(false, |p| p >= since))
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.published_at);
        // Retroactive group assignments are visible to later queries.
        for (id, gid) in &state.group_updates {
            if let Some(c) = matches.iter_mut().find(|c| &c.id == id) {
                c.group_id = Some(gid.clone());
            }
        }
        Ok(matches)
    }

    async fn save(&self, item: &NewsItem) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_ids.contains(&item.id) {
            bail!("injected save failure for {}", item.id);
        }
        if !state.saved.iter().any(|i| i.id == item.id) {
            state.saved.push(item.clone());
        }
        Ok(())
    }

    async fn set_group_id(&self, item_id: &str, group_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .group_updates
            .push((item_id.to_string(), group_id.to_string()));
        Ok(())
    }

    async fn upsert_source_status(
        &self,
        source: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let status = state
            .statuses
            .entry(source.to_string())
            .or_insert_with(|| SourceStatus {
                source: source.to_string(),
                last_success_at: None,
                last_error_at: None,
                last_error_message: None,
            });
        // Success and error timestamps accumulate independently, like the
        // real upsert's two branches.
        if success {
            status.last_success_at = Some(Utc::now());
        } else {
            status.last_error_at = Some(Utc::now());
            status.last_error_message = error.map(str::to_string);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockTranslator
// ---------------------------------------------------------------------------

enum TranslatorBehavior {
    AlwaysOk,
    AlwaysFail,
    FailBatchOkSingle,
    Unavailable,
}

pub struct MockTranslator {
    behavior: TranslatorBehavior,
}

impl MockTranslator {
    /// Every call succeeds, rewriting titles to a visibly translated form.
    pub fn always_ok() -> Self {
        Self {
            behavior: TranslatorBehavior::AlwaysOk,
        }
    }

    /// Batch marks everything failed; singles error out too.
    pub fn always_fail() -> Self {
        Self {
            behavior: TranslatorBehavior::AlwaysFail,
        }
    }

    /// Batch marks everything failed, but the per-item retry succeeds.
    pub fn fail_batch_ok_single() -> Self {
        Self {
            behavior: TranslatorBehavior::FailBatchOkSingle,
        }
    }

    /// `is_available` reports false; any call is a test bug.
    pub fn unavailable() -> Self {
        Self {
            behavior: TranslatorBehavior::Unavailable,
        }
    }

    fn translate_ok(item: &mut NewsItem) {
        item.title = format!("번역: {}", item.title);
        if let Some(summary) = &item.summary {
            item.summary = Some(format!("번역: {summary}"));
        }
        item.translation_status = Some(TranslationStatus::Ok);
    }
}

#[async_trait]
impl Translator for MockTranslator {
    fn is_available(&self) -> bool {
        !matches!(self.behavior, TranslatorBehavior::Unavailable)
    }

    async fn translate_batch(&self, items: &mut [NewsItem]) -> Result<()> {
        match self.behavior {
            TranslatorBehavior::AlwaysOk => {
                for item in items.iter_mut() {
                    Self::translate_ok(item);
                }
            }
            TranslatorBehavior::AlwaysFail | TranslatorBehavior::FailBatchOkSingle => {
                for item in items.iter_mut() {
                    item.translation_status = Some(TranslationStatus::Failed);
                }
            }
            TranslatorBehavior::Unavailable => bail!("translator called while unavailable"),
        }
        Ok(())
    }

    async fn translate_single(&self, item: &mut NewsItem) -> Result<()> {
        match self.behavior {
            TranslatorBehavior::AlwaysOk | TranslatorBehavior::FailBatchOkSingle => {
                Self::translate_ok(item);
                Ok(())
            }
            TranslatorBehavior::AlwaysFail => bail!("injected translation failure"),
            TranslatorBehavior::Unavailable => bail!("translator called while unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

/// Source connector returning a fixed item list, or a fixed error.
pub struct MockConnector {
    name: String,
    items: Vec<NewsItem>,
    error: Option<String>,
}

impl MockConnector {
    pub fn with_items(name: &str, items: Vec<NewsItem>) -> Self {
        Self {
            name: name.to_string(),
            items,
            error: None,
        }
    }

    pub fn failing(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

#[async_trait]
impl SourceConnector for MockConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _window_hours: i64) -> Result<Vec<NewsItem>> {
        match &self.error {
            Some(e) => bail!("{e}"),
            None => Ok(self.items.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// CollectingSink
// ---------------------------------------------------------------------------

/// Progress sink that records every update it receives.
#[derive(Default)]
pub struct CollectingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for CollectingSink {
    async fn update(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
