//! Batch translation with per-item retry and fail-open status marking.
//!
//! Items that still fail after the retry pass are *kept* with
//! `translation_status = failed`; dropping them is deferred to the
//! persist stage where the translation-required policy is enforced.
//! Failed rows are useful telemetry and can be reprocessed out of band.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use satwire_common::TranslationStatus;

use super::{RunContext, Stage};
use crate::traits::Translator;
use crate::translator::contains_korean;

/// Sources already publishing in the target language; their items are
/// copied through untouched, never sent to the provider.
pub const NATIVE_LANGUAGE_SOURCES: &[&str] = &["coindeskkorea", "blockmedia", "tokenpost"];

pub struct TranslateStage {
    translator: Option<Arc<dyn Translator>>,
}

impl TranslateStage {
    pub fn new(translator: Option<Arc<dyn Translator>>) -> Self {
        Self { translator }
    }

    fn mark_all(ctx: &mut RunContext, status: TranslationStatus) {
        for item in &mut ctx.items {
            item.translation_status = Some(status);
        }
    }
}

#[async_trait]
impl Stage for TranslateStage {
    fn name(&self) -> &'static str {
        "translate"
    }

    async fn run(&self, mut ctx: RunContext) -> Result<RunContext> {
        if ctx.items.is_empty() {
            return Ok(ctx);
        }

        // Grouping compares pre-translation titles; back them up before
        // anything can overwrite them.
        for item in &mut ctx.items {
            item.backup_original_title();
        }

        let Some(translator) = &self.translator else {
            Self::mark_all(&mut ctx, TranslationStatus::Skipped);
            return Ok(ctx);
        };

        if NATIVE_LANGUAGE_SOURCES.contains(&ctx.source.as_str()) {
            info!(source = %ctx.source, "Native-language source, translation skipped");
            Self::mark_all(&mut ctx, TranslationStatus::Skipped);
            return Ok(ctx);
        }

        if !translator.is_available() {
            warn!(source = %ctx.source, "Translator unavailable, marking batch failed");
            Self::mark_all(&mut ctx, TranslationStatus::Failed);
            ctx.translation_failed += ctx.items.len() as u32;
            return Ok(ctx);
        }

        // Items already in the target language need no provider call.
        let items = std::mem::take(&mut ctx.items);
        let (mut pending, mut done): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| !contains_korean(&item.title));
        for item in &mut done {
            item.translation_status = Some(TranslationStatus::Skipped);
        }
        if pending.is_empty() {
            ctx.items = done;
            return Ok(ctx);
        }

        // Batch pass. Chunk-level provider errors are absorbed inside the
        // translator by marking that chunk failed.
        translator.translate_batch(&mut pending).await?;
        ctx.items = pending;
        ctx.items.append(&mut done);

        // Individual retry — batch failures are frequently one malformed
        // item poisoning the whole chunk's response.
        let failed_count = ctx
            .items
            .iter()
            .filter(|i| i.translation_status == Some(TranslationStatus::Failed))
            .count();
        if failed_count > 0 {
            info!(
                source = %ctx.source,
                failed = failed_count,
                "Batch translation left failures, retrying individually"
            );
            for item in &mut ctx.items {
                if item.translation_status != Some(TranslationStatus::Failed) {
                    continue;
                }
                match translator.translate_single(item).await {
                    Ok(()) => {
                        if item.translation_status == Some(TranslationStatus::Ok) {
                            info!(source = %ctx.source, id = %item.id, "Individual retry succeeded");
                        }
                    }
                    Err(e) => {
                        warn!(source = %ctx.source, id = %item.id, error = %e, "Individual retry failed");
                        item.translation_status = Some(TranslationStatus::Failed);
                    }
                }
            }
        }

        // Fail-open: failures stay in the list, counted once each.
        let mut still_failed = 0u32;
        for item in &ctx.items {
            if item.translation_status == Some(TranslationStatus::Failed) {
                still_failed += 1;
                debug!(source = %ctx.source, id = %item.id, "Keeping untranslated item");
            }
        }
        ctx.translation_failed += still_failed;

        if still_failed > 0 {
            warn!(
                source = %ctx.source,
                failed = still_failed,
                "Items kept in original language after translation failure"
            );
        }

        Ok(ctx)
    }
}
