//! Near-duplicate grouping by title similarity.
//!
//! A new item is compared against *group representatives only* — the
//! chronologically earliest member of each group — never against
//! arbitrary members. Comparing against every member lets a chain of
//! loosely-related articles snowball into one giant cluster (A matches
//! B, B matches C, so A, B, C merge even though A and C are unrelated).
//! Representative-only comparison caps that transitive growth.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info};

use satwire_common::{url_hash, NewsItem};
use satwire_store::StoredCandidate;

use crate::similarity;
use crate::traits::ItemStore;

use super::{RunContext, Stage};

/// Sliding candidate window, in hours, relative to the item's publish time.
pub const WINDOW_HOURS: i64 = 24;

pub struct GroupingStage {
    store: Arc<dyn ItemStore>,
}

impl GroupingStage {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Assign a group id to one item, creating or joining groups among the
    /// persisted candidates in the same domain and time window.
    pub async fn assign_group_id(&self, item: &mut NewsItem) -> Result<String> {
        if item.title.is_empty() || item.url.is_empty() {
            let group_id = new_group_id(item);
            item.set_group_id(&group_id);
            return Ok(group_id);
        }

        let published_at = item.published_at.unwrap_or_else(Utc::now);
        let cutoff = published_at - Duration::hours(WINDOW_HOURS);
        let domain = item.domain();

        // Translated titles carry fewer comparable tokens; always compare
        // the pre-translation backups.
        let title = item.original_title().to_string();

        // Oldest first, so the first candidate seen per group id is that
        // group's representative.
        let candidates = self.store.candidates_in_window(&domain, cutoff).await?;

        let mut representatives: HashMap<String, &StoredCandidate> = HashMap::new();
        let mut rep_order: Vec<String> = Vec::new();
        let mut ungrouped: Vec<&StoredCandidate> = Vec::new();

        for candidate in &candidates {
            if candidate.title.is_empty() || candidate.url.is_empty() {
                continue;
            }
            match &candidate.group_id {
                Some(gid) => {
                    if !representatives.contains_key(gid) {
                        representatives.insert(gid.clone(), candidate);
                        rep_order.push(gid.clone());
                    }
                }
                None => ungrouped.push(candidate),
            }
        }

        // 1. Best-scoring representative above threshold wins.
        let mut best_score = 0.0_f64;
        let mut best_group: Option<&str> = None;
        for gid in &rep_order {
            let representative = representatives[gid];
            if let Some(score) = similarity::match_score(&title, representative.comparison_title())
            {
                if score > best_score {
                    best_score = score;
                    best_group = Some(gid.as_str());
                    debug!(
                        title = %title,
                        rep = %representative.comparison_title(),
                        score,
                        group = %gid,
                        "Representative match"
                    );
                }
            }
        }
        if let Some(gid) = best_group {
            let gid = gid.to_string();
            item.set_group_id(&gid);
            return Ok(gid);
        }

        // 2. First matching ungrouped single founds a new group; the single
        //    becomes its representative retroactively.
        for candidate in ungrouped {
            if let Some(score) = similarity::match_score(&title, candidate.comparison_title()) {
                let group_id = new_group_id(item);
                item.set_group_id(&group_id);
                self.store.set_group_id(&candidate.id, &group_id).await?;
                info!(
                    title = %title,
                    matched = %candidate.comparison_title(),
                    score,
                    group = %group_id,
                    "New group formed"
                );
                return Ok(group_id);
            }
        }

        // 3. Singleton group.
        let group_id = new_group_id(item);
        item.set_group_id(&group_id);
        Ok(group_id)
    }
}

/// Group ids are traceable to their founding article: the founder's URL
/// hash, falling back to a timestamp when the item has no URL identity.
fn new_group_id(item: &NewsItem) -> String {
    let key = item
        .url_hash
        .clone()
        .or_else(|| {
            if item.url.is_empty() {
                None
            } else {
                Some(url_hash(&item.url))
            }
        })
        .unwrap_or_else(|| Utc::now().timestamp().to_string());
    format!("group_{key}")
}

#[async_trait]
impl Stage for GroupingStage {
    fn name(&self) -> &'static str {
        "grouping"
    }

    async fn run(&self, mut ctx: RunContext) -> Result<RunContext> {
        let mut items = std::mem::take(&mut ctx.items);
        for item in &mut items {
            self.assign_group_id(item).await?;
        }
        ctx.items = items;
        Ok(ctx)
    }
}
