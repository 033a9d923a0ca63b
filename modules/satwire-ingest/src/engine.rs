//! Fetch fan-out and per-source pipeline orchestration.
//!
//! Fetching is concurrent across all registered sources; processing is
//! sequential per source, in registration order, so store access and run
//! summaries stay deterministic. One failing source never touches the
//! others: its error lands in the summary and its status row, nothing
//! else.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info};

use satwire_common::{
    NewsItem, ProgressUpdate, RunSummary, SatwireError, SourceRunResult,
};

use crate::pipeline::{
    DedupStage, GroupingStage, PersistStage, RunContext, Stage, TopicFilterStage, TranslateStage,
};
use crate::traits::{ItemStore, ProgressSink, SourceConnector, Translator};

pub struct FetchEngine {
    store: Arc<dyn ItemStore>,
    sources: Vec<Arc<dyn SourceConnector>>,
    stages: Vec<Box<dyn Stage>>,
    window_hours: i64,
    translation_required: bool,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl FetchEngine {
    pub fn new(
        store: Arc<dyn ItemStore>,
        translator: Option<Arc<dyn Translator>>,
        sources: Vec<Arc<dyn SourceConnector>>,
        window_hours: i64,
        translation_required: bool,
    ) -> Self {
        // Stage order is fixed: dedup first so nothing downstream pays for
        // known items, grouping after translate so original titles are
        // already backed up, persist last.
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(DedupStage::new(store.clone())),
            Box::new(TopicFilterStage),
            Box::new(TranslateStage::new(translator)),
            Box::new(GroupingStage::new(store.clone())),
            Box::new(PersistStage::new(store.clone())),
        ];

        Self {
            store,
            sources,
            stages,
            window_hours,
            translation_required,
            progress: None,
        }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    async fn report(&self, update: ProgressUpdate) {
        if let Some(sink) = &self.progress {
            sink.update(update).await;
        }
    }

    /// Run the full pipeline over every registered source.
    pub async fn run_all(&self) -> RunSummary {
        self.run_sources(&self.sources).await
    }

    /// Run the full pipeline over a single source by registry key.
    pub async fn run_source(&self, name: &str) -> Result<RunSummary> {
        let source = self
            .sources
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| SatwireError::UnknownSource(name.to_string()))?;
        Ok(self.run_sources(std::slice::from_ref(&source)).await)
    }

    async fn run_sources(&self, sources: &[Arc<dyn SourceConnector>]) -> RunSummary {
        let started_at = Utc::now();
        let mut summary = RunSummary::new(started_at);

        info!(sources = sources.len(), "Fetch run started");
        self.report(ProgressUpdate {
            sources_total: Some(sources.len() as u32),
            sources_completed: Some(0),
            ..Default::default()
        })
        .await;

        // Concurrent fan-out. Each fetch resolves to its outcome; a panic-
        // free Result per source, never a short-circuit.
        let fetches = sources.iter().map(|source| {
            let source = source.clone();
            let window_hours = self.window_hours;
            async move {
                let outcome = source.fetch(window_hours).await;
                (source.name().to_string(), outcome)
            }
        });
        let fetched: Vec<(String, Result<Vec<NewsItem>>)> = join_all(fetches).await;

        // Sequential processing in registration order.
        let mut completed = 0u32;
        for (name, outcome) in fetched {
            self.report(ProgressUpdate {
                current_source: Some(name.clone()),
                ..Default::default()
            })
            .await;

            let result = match outcome {
                Ok(items) => self.process_fetched(&name, items).await,
                Err(e) => {
                    error!(source = %name, error = %e, "Fetch failed");
                    SourceRunResult {
                        success: false,
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            };

            if let Err(e) = self
                .store
                .upsert_source_status(&name, result.success, result.error.as_deref())
                .await
            {
                error!(source = %name, error = %e, "Failed to record source status");
            }

            summary.absorb(&name, result);
            completed += 1;

            self.report(ProgressUpdate {
                sources_completed: Some(completed),
                items_fetched: Some(summary.total_fetched),
                items_saved: Some(summary.total_saved),
                items_duplicates: Some(summary.total_duplicates),
                ..Default::default()
            })
            .await;
        }

        summary.finished_at = Some(Utc::now());
        info!(%summary, "Fetch run finished");
        summary
    }

    /// Run one source's fetched items through the stage sequence.
    async fn process_fetched(&self, source: &str, items: Vec<NewsItem>) -> SourceRunResult {
        let mut ctx = RunContext::new(source, items, self.translation_required);

        for stage in &self.stages {
            ctx = match stage.run(ctx).await {
                Ok(ctx) => ctx,
                Err(e) => {
                    error!(source = %source, stage = stage.name(), error = %e, "Stage failed");
                    return SourceRunResult {
                        success: false,
                        error: Some(format!("{} stage: {e}", stage.name())),
                        ..Default::default()
                    };
                }
            };
        }

        SourceRunResult {
            success: true,
            fetched: ctx.fetched,
            saved: ctx.saved,
            duplicates: ctx.duplicates,
            filtered: ctx.filtered,
            translation_failed: ctx.translation_failed,
            translation_dropped: ctx.translation_dropped,
            error: None,
        }
    }
}
