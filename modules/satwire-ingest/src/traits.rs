//! Trait abstractions for the fetch engine's dependencies.
//!
//! SourceConnector — one per registered source, pure fetch, no store access.
//! ItemStore — the persistence surface the pipeline stages consume.
//! Translator — the external translation capability, batch + single.
//! ProgressSink — optional fire-and-forget run progress reporting.
//!
//! These enable deterministic testing with the in-memory mocks in
//! `testing.rs`: no network, no database.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use satwire_common::{NewsItem, ProgressUpdate};
use satwire_store::{FeedStore, StoredCandidate};

// ---------------------------------------------------------------------------
// SourceConnector
// ---------------------------------------------------------------------------

/// Turns one feed or scraped page into a normalized item list.
/// Must not require any engine state; a failing connector raises and is
/// isolated by the engine.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Registry key of this source.
    fn name(&self) -> &str;

    /// Fetch items published within the lookback window.
    async fn fetch(&self, window_hours: i64) -> Result<Vec<NewsItem>>;
}

// ---------------------------------------------------------------------------
// ItemStore
// ---------------------------------------------------------------------------

/// The persistent-store surface consumed by the pipeline stages.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Batched exact-duplicate check: which of these hashes already exist.
    async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>>;

    /// Persisted items in the grouping window for one domain, oldest first.
    async fn candidates_in_window(
        &self,
        domain: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredCandidate>>;

    /// Persist one item. Idempotent per primary key.
    async fn save(&self, item: &NewsItem) -> Result<()>;

    /// Retroactively assign a group id to a persisted item.
    async fn set_group_id(&self, item_id: &str, group_id: &str) -> Result<()>;

    /// Record one source's run outcome.
    async fn upsert_source_status(
        &self,
        source: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<()>;
}

#[async_trait]
impl ItemStore for FeedStore {
    async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>> {
        FeedStore::existing_hashes(self, hashes).await
    }

    async fn candidates_in_window(
        &self,
        domain: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredCandidate>> {
        FeedStore::candidates_in_window(self, domain, since).await
    }

    async fn save(&self, item: &NewsItem) -> Result<()> {
        FeedStore::save(self, item).await
    }

    async fn set_group_id(&self, item_id: &str, group_id: &str) -> Result<()> {
        FeedStore::set_group_id(self, item_id, group_id).await
    }

    async fn upsert_source_status(
        &self,
        source: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<()> {
        FeedStore::upsert_source_status(self, source, success, error).await
    }
}

// ---------------------------------------------------------------------------
// Translator
// ---------------------------------------------------------------------------

/// External translation capability. Both calls set each item's
/// `translation_status` and rewrite `title`/`summary` on success; the
/// caller owns retry policy across the two granularities.
#[async_trait]
pub trait Translator: Send + Sync {
    /// False when the provider cannot be called (no credentials). The
    /// translate stage then marks items failed without calling out.
    fn is_available(&self) -> bool;

    /// Translate a whole source batch, chunked internally to respect the
    /// provider's payload limits. A chunk-level provider error marks that
    /// chunk's items failed; it never fails the whole call.
    async fn translate_batch(&self, items: &mut [NewsItem]) -> Result<()>;

    /// Translate one item (the per-item retry path after a batch pass).
    async fn translate_single(&self, item: &mut NewsItem) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ProgressSink
// ---------------------------------------------------------------------------

/// Optional run progress receiver. Updates are fire-and-forget: a sink
/// must never block or fail the run.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn update(&self, update: ProgressUpdate);
}
