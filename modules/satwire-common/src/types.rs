use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw-bag key carrying the cluster id assigned by the grouping stage.
pub const RAW_GROUP_ID_KEY: &str = "dedup_group_id";

/// Raw-bag key holding the pre-translation title. Grouping compares
/// original titles so translated text never skews token overlap.
pub const RAW_ORIGINAL_TITLE_KEY: &str = "title";

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    Ok,
    Failed,
    Skipped,
}

impl std::fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslationStatus::Ok => write!(f, "ok"),
            TranslationStatus::Failed => write!(f, "failed"),
            TranslationStatus::Skipped => write!(f, "skipped"),
        }
    }
}

// --- NewsItem ---

/// The uniform record every source connector must produce before its
/// output enters the pipeline. Pipeline stages mutate `translation_status`
/// and the raw bag; everything else is set at normalization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    /// Globally unique, `{source}_{url_hash}`.
    pub id: String,
    /// Registry key of the producing source.
    pub source: String,
    /// Human-readable origin (publication name), when known.
    pub source_ref: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    pub url: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// 16-hex-char digest of the normalized URL. Items without one are
    /// treated as non-deduplicable and pass the dedup stage unfiltered.
    pub url_hash: Option<String>,
    pub image_url: Option<String>,
    pub category: String,
    /// Opaque provenance bag. Carries the original title backup and the
    /// grouping annotation; everything else in it is source-specific.
    pub raw: Map<String, Value>,
    pub translation_status: Option<TranslationStatus>,
    /// Mirrored from the raw bag at persist time for query efficiency.
    pub group_id: Option<String>,
}

impl NewsItem {
    /// Host of the item's URL, empty when unparseable.
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn group_id_from_raw(&self) -> Option<String> {
        self.raw
            .get(RAW_GROUP_ID_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn set_group_id(&mut self, group_id: &str) {
        self.raw.insert(
            RAW_GROUP_ID_KEY.to_string(),
            Value::String(group_id.to_string()),
        );
        self.group_id = Some(group_id.to_string());
    }

    /// Title to use for similarity comparison: the raw-bag backup when a
    /// translation has replaced `title`, otherwise `title` itself.
    pub fn original_title(&self) -> &str {
        self.raw
            .get(RAW_ORIGINAL_TITLE_KEY)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.title)
    }

    /// Back up the current title into the raw bag before translation
    /// overwrites it. First write wins.
    pub fn backup_original_title(&mut self) {
        if !self.raw.contains_key(RAW_ORIGINAL_TITLE_KEY) {
            self.raw.insert(
                RAW_ORIGINAL_TITLE_KEY.to_string(),
                Value::String(self.title.clone()),
            );
        }
    }
}

// --- Source status ---

/// One persisted record per source key, updated after every per-source
/// pipeline run regardless of item-level outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
}

// --- Run results ---

/// Per-source outcome inside a run summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRunResult {
    pub success: bool,
    pub fetched: u32,
    pub saved: u32,
    pub duplicates: u32,
    pub filtered: u32,
    pub translation_failed: u32,
    pub translation_dropped: u32,
    pub error: Option<String>,
}

/// The externally visible result of one full run. `success = false`
/// means at least one source failed, not that nothing was saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub total_fetched: u32,
    pub total_saved: u32,
    pub total_duplicates: u32,
    pub total_filtered: u32,
    pub total_translation_failed: u32,
    pub total_translation_dropped: u32,
    /// Keyed by source, populated in registration order.
    pub per_source: Vec<(String, SourceRunResult)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            total_fetched: 0,
            total_saved: 0,
            total_duplicates: 0,
            total_filtered: 0,
            total_translation_failed: 0,
            total_translation_dropped: 0,
            per_source: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    /// Fold one source's outcome into the running totals.
    pub fn absorb(&mut self, source: &str, result: SourceRunResult) {
        self.total_fetched += result.fetched;
        self.total_saved += result.saved;
        self.total_duplicates += result.duplicates;
        self.total_filtered += result.filtered;
        self.total_translation_failed += result.translation_failed;
        self.total_translation_dropped += result.translation_dropped;
        if !result.success {
            self.success = false;
        }
        self.per_source.push((source.to_string(), result));
    }

    pub fn source_result(&self, source: &str) -> Option<&SourceRunResult> {
        self.per_source
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, r)| r)
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Fetch Run Complete ===")?;
        writeln!(f, "Success:             {}", self.success)?;
        writeln!(f, "Fetched:             {}", self.total_fetched)?;
        writeln!(f, "Saved:               {}", self.total_saved)?;
        writeln!(f, "Duplicates:          {}", self.total_duplicates)?;
        writeln!(f, "Filtered:            {}", self.total_filtered)?;
        writeln!(f, "Translation failed:  {}", self.total_translation_failed)?;
        writeln!(f, "Translation dropped: {}", self.total_translation_dropped)?;
        for (source, result) in &self.per_source {
            match &result.error {
                Some(e) => writeln!(f, "  {source}: ERROR {e}")?,
                None => writeln!(
                    f,
                    "  {source}: fetched {} saved {} dup {} filtered {}",
                    result.fetched, result.saved, result.duplicates, result.filtered
                )?,
            }
        }
        Ok(())
    }
}

// --- Progress reporting ---

/// Partial update pushed to an optional progress sink. Fields left as
/// `None` keep their previous value on the receiving side.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub sources_total: Option<u32>,
    pub current_source: Option<String>,
    pub sources_completed: Option<u32>,
    pub items_fetched: Option<u32>,
    pub items_saved: Option<u32>,
    pub items_duplicates: Option<u32>,
}
