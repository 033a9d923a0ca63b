//! Final write-out stage: translation policy enforcement and isolated,
//! per-item saves.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use satwire_common::TranslationStatus;

use super::{RunContext, Stage};
use crate::traits::ItemStore;

pub struct PersistStage {
    store: Arc<dyn ItemStore>,
}

impl PersistStage {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for PersistStage {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn run(&self, mut ctx: RunContext) -> Result<RunContext> {
        let mut saved = 0u32;
        let mut dropped = 0u32;
        let mut failed = 0u32;

        for item in &ctx.items {
            // Fail-closed happens here, not in the translate stage: failed
            // items ride through grouping so their counters stay accurate,
            // then get dropped at the door.
            if ctx.translation_required
                && item.translation_status == Some(TranslationStatus::Failed)
            {
                dropped += 1;
                warn!(
                    source = %ctx.source,
                    id = %item.id,
                    title = %item.title,
                    "Dropping untranslated item, translation is required"
                );
                continue;
            }

            // One bad row must not sink the batch. Saves are individually
            // idempotent inserts; an error is logged and the loop moves on.
            match self.store.save(item).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    failed += 1;
                    warn!(source = %ctx.source, id = %item.id, error = %e, "Save failed");
                }
            }
        }

        info!(
            source = %ctx.source,
            saved,
            dropped,
            failed,
            "Persist complete"
        );

        ctx.saved += saved;
        ctx.translation_dropped += dropped;
        Ok(ctx)
    }
}
