//! Ingestion pipeline for a Bitcoin-only news wire.
//!
//! Sources (RSS feeds and ad-hoc scraped listings) are fetched
//! concurrently, then each source's items run sequentially through a
//! fixed stage sequence: dedup, topic filter, translate, group, persist.
//! The fetch engine aggregates per-source outcomes into a run summary.

pub mod engine;
pub mod pipeline;
pub mod similarity;
pub mod sources;
pub mod state;
pub mod traits;
pub mod translator;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::FetchEngine;
pub use state::RunState;
