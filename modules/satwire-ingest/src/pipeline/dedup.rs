//! Exact-duplicate elimination by normalized-URL hash.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{RunContext, Stage};
use crate::traits::ItemStore;

/// Drops items whose URL hash already exists in the store or earlier in
/// the same batch. The store is queried once per pass, batched — never
/// per item. Items without a hash are non-deduplicable and pass through.
/// Input order is preserved.
pub struct DedupStage {
    store: Arc<dyn ItemStore>,
}

impl DedupStage {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for DedupStage {
    fn name(&self) -> &'static str {
        "dedup"
    }

    async fn run(&self, mut ctx: RunContext) -> Result<RunContext> {
        let hashes: Vec<String> = ctx
            .items
            .iter()
            .filter_map(|item| item.url_hash.clone())
            .collect();

        let existing = self.store.existing_hashes(&hashes).await?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut kept = Vec::with_capacity(ctx.items.len());
        let mut duplicates = 0u32;

        for item in ctx.items.drain(..) {
            let Some(hash) = item.url_hash.clone() else {
                kept.push(item);
                continue;
            };
            if existing.contains(&hash) || seen.contains(&hash) {
                duplicates += 1;
            } else {
                seen.insert(hash);
                kept.push(item);
            }
        }

        info!(
            source = %ctx.source,
            new = kept.len(),
            duplicates,
            "Dedup complete"
        );

        ctx.duplicates += duplicates;
        ctx.items = kept;
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[tokio::test]
    async fn persisted_hash_is_dropped() {
        let store = Arc::new(MockStore::new().with_existing_hash("aaaa000000000001"));
        let items = vec![
            item_with_hash("coindesk", "One", "aaaa000000000001"),
            item_with_hash("coindesk", "Two", "bbbb000000000002"),
        ];
        let ctx = RunContext::new("coindesk", items, false);

        let ctx = DedupStage::new(store).run(ctx).await.unwrap();

        assert_eq!(ctx.items.len(), 1);
        assert_eq!(ctx.items[0].title, "Two");
        assert_eq!(ctx.duplicates, 1);
    }

    #[tokio::test]
    async fn in_batch_repeat_is_dropped() {
        let store = Arc::new(MockStore::new());
        let items = vec![
            item_with_hash("coindesk", "One", "cccc000000000003"),
            item_with_hash("coindesk", "One again", "cccc000000000003"),
        ];
        let ctx = RunContext::new("coindesk", items, false);

        let ctx = DedupStage::new(store).run(ctx).await.unwrap();

        assert_eq!(ctx.items.len(), 1);
        assert_eq!(ctx.items[0].title, "One");
        assert_eq!(ctx.duplicates, 1);
    }

    #[tokio::test]
    async fn hashless_items_pass_through() {
        let store = Arc::new(MockStore::new());
        let mut item = item_with_hash("coindesk", "No hash", "dddd000000000004");
        item.url_hash = None;
        let ctx = RunContext::new("coindesk", vec![item.clone(), item], false);

        let ctx = DedupStage::new(store).run(ctx).await.unwrap();

        // Both survive: no hash means non-deduplicable.
        assert_eq!(ctx.items.len(), 2);
        assert_eq!(ctx.duplicates, 0);
    }

    #[tokio::test]
    async fn input_order_is_preserved() {
        let store = Arc::new(MockStore::new());
        let items = vec![
            item_with_hash("coindesk", "A", "aa00000000000001"),
            item_with_hash("coindesk", "B", "bb00000000000002"),
            item_with_hash("coindesk", "C", "cc00000000000003"),
        ];
        let ctx = RunContext::new("coindesk", items, false);

        let ctx = DedupStage::new(store).run(ctx).await.unwrap();

        let titles: Vec<&str> = ctx.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn second_run_against_same_store_passes_nothing_twice() {
        // Idempotence: after the first run's survivors are persisted, a
        // second identical batch dedupes entirely.
        let store = Arc::new(MockStore::new());
        let items = vec![
            item_with_hash("coindesk", "One", "ee00000000000001"),
            item_with_hash("coindesk", "Two", "ff00000000000002"),
        ];

        let ctx = RunContext::new("coindesk", items.clone(), false);
        let ctx = DedupStage::new(store.clone()).run(ctx).await.unwrap();
        for item in &ctx.items {
            store.save(item).await.unwrap();
        }

        let ctx2 = RunContext::new("coindesk", items, false);
        let ctx2 = DedupStage::new(store).run(ctx2).await.unwrap();

        assert_eq!(ctx2.items.len(), 0);
        assert_eq!(ctx2.duplicates, 2);
    }
}
