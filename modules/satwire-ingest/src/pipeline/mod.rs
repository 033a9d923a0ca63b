//! The per-source processing pipeline.
//!
//! A fixed, ordered stage sequence (dedup → topic filter → translate →
//! group → persist) built once at engine construction. Each stage
//! consumes and returns the run context, shrinking its item list and
//! incrementing its counters; nothing is dropped silently.

mod dedup;
mod grouping;
mod persist;
mod topic_filter;
mod translate;

pub use dedup::DedupStage;
pub use grouping::GroupingStage;
pub use persist::PersistStage;
pub use topic_filter::TopicFilterStage;
pub use translate::TranslateStage;

use anyhow::Result;
use async_trait::async_trait;

use satwire_common::NewsItem;

/// Mutable state threaded through the stage sequence for one source's
/// pipeline pass. Owned exclusively by the engine for the duration of the
/// pass; stages receive it, mutate it, and return it.
#[derive(Debug)]
pub struct RunContext {
    pub source: String,
    pub items: Vec<NewsItem>,

    // Counters, monotonically increasing within a pass.
    pub fetched: u32,
    pub duplicates: u32,
    pub filtered: u32,
    pub translation_failed: u32,
    pub translation_dropped: u32,
    pub saved: u32,

    /// When true, items whose translation failed are dropped at persist.
    pub translation_required: bool,
}

impl RunContext {
    pub fn new(source: &str, items: Vec<NewsItem>, translation_required: bool) -> Self {
        let fetched = items.len() as u32;
        Self {
            source: source.to_string(),
            items,
            fetched,
            duplicates: 0,
            filtered: 0,
            translation_failed: 0,
            translation_dropped: 0,
            saved: 0,
            translation_required,
        }
    }
}

/// One pipeline stage. Implementations must only drop items from
/// `ctx.items`, never the context itself, and must account for every
/// dropped or failed item in a named counter.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: RunContext) -> Result<RunContext>;
}
