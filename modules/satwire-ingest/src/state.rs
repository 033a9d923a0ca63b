//! Shared run-progress state.
//!
//! One `RunState` is held for the process lifetime and updated by the
//! engine through the [`ProgressSink`] trait; anything with a clone can
//! take a consistent snapshot (a status endpoint, a CLI spinner, a test).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use satwire_common::ProgressUpdate;

use crate::traits::ProgressSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Fetching,
    Processing,
}

/// Snapshot of one run's progress.
#[derive(Debug, Clone, Serialize)]
pub struct RunProgress {
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub sources_total: u32,
    pub sources_completed: u32,
    pub current_source: Option<String>,
    pub items_fetched: u32,
    pub items_saved: u32,
    pub items_duplicates: u32,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub next_fetch_at: Option<DateTime<Utc>>,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            status: RunStatus::Idle,
            started_at: None,
            sources_total: 0,
            sources_completed: 0,
            current_source: None,
            items_fetched: 0,
            items_saved: 0,
            items_duplicates: 0,
            last_fetch_at: None,
            next_fetch_at: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct RunState {
    inner: Arc<Mutex<RunProgress>>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RunProgress {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mark a run as started, resetting per-run counters.
    pub fn begin_run(&self) {
        let mut progress = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let last_fetch_at = progress.last_fetch_at;
        let next_fetch_at = progress.next_fetch_at;
        *progress = RunProgress {
            status: RunStatus::Fetching,
            started_at: Some(Utc::now()),
            last_fetch_at,
            next_fetch_at,
            ..Default::default()
        };
    }

    /// Mark a run as finished and record when the next one is due.
    pub fn finish_run(&self, next_fetch_at: Option<DateTime<Utc>>) {
        let mut progress = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        progress.status = RunStatus::Idle;
        progress.current_source = None;
        progress.last_fetch_at = Some(Utc::now());
        progress.next_fetch_at = next_fetch_at;
    }
}

#[async_trait]
impl ProgressSink for RunState {
    async fn update(&self, update: ProgressUpdate) {
        let mut progress = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(total) = update.sources_total {
            progress.sources_total = total;
        }
        if let Some(source) = update.current_source {
            progress.status = RunStatus::Processing;
            progress.current_source = Some(source);
        }
        if let Some(completed) = update.sources_completed {
            progress.sources_completed = completed;
        }
        if let Some(fetched) = update.items_fetched {
            progress.items_fetched = fetched;
        }
        if let Some(saved) = update.items_saved {
            progress.items_saved = saved;
        }
        if let Some(duplicates) = update.items_duplicates {
            progress.items_duplicates = duplicates;
        }
    }
}
