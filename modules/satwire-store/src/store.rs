use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;

use satwire_common::{NewsItem, SourceStatus};

/// A persisted item projected down to the fields the grouping stage
/// compares against: identity, title, origin, window position, group.
#[derive(Debug, Clone)]
pub struct StoredCandidate {
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub group_id: Option<String>,
    /// Pre-translation title from the raw bag, when present.
    pub original_title: Option<String>,
}

impl StoredCandidate {
    /// Title used for similarity comparison.
    pub fn comparison_title(&self) -> &str {
        self.original_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.title)
    }

    /// Host of the candidate's URL, empty when unparseable.
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Postgres-backed feed item store.
#[derive(Clone)]
pub struct FeedStore {
    pool: PgPool,
}

impl FeedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return the subset of `hashes` that already exist in the store.
    /// One batched query per pipeline run, never per item.
    pub async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>> {
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query("SELECT url_hash FROM feed_items WHERE url_hash = ANY($1)")
            .bind(hashes)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.try_get::<Option<String>, _>("url_hash").ok().flatten())
            .collect())
    }

    /// Items published at or after `since`, oldest first. The oldest-first
    /// order is what makes the first row seen per group id the group's
    /// representative. Domain filtering happens on the host after the
    /// window-bounded query, mirroring how the candidate set is defined.
    pub async fn candidates_in_window(
        &self,
        domain: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, url, published_at, group_id, raw->>'title' AS original_title
            FROM feed_items
            WHERE published_at >= $1
            ORDER BY published_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .into_iter()
            .map(|r| StoredCandidate {
                id: r.get("id"),
                title: r.get("title"),
                url: r.get("url"),
                published_at: r.get("published_at"),
                group_id: r.get("group_id"),
                original_title: r.get("original_title"),
            })
            .filter(|c| c.domain() == domain)
            .collect();
        Ok(candidates)
    }

    /// Insert one item. Idempotent per primary key; a conflicting id is a
    /// no-op so replays never abort a batch. The group id column mirrors
    /// the raw-bag annotation, falling back to the item id.
    pub async fn save(&self, item: &NewsItem) -> Result<()> {
        let group_id = item
            .group_id_from_raw()
            .or_else(|| item.group_id.clone())
            .unwrap_or_else(|| item.id.clone());
        let raw = serde_json::Value::Object(item.raw.clone());
        let tags = serde_json::to_value(&item.tags)?;

        sqlx::query(
            r#"
            INSERT INTO feed_items (
                id, source, source_ref, title, summary, url, author,
                published_at, fetched_at, tags, url_hash, raw, image_url,
                category, translation_status, group_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&item.id)
        .bind(&item.source)
        .bind(&item.source_ref)
        .bind(&item.title)
        .bind(item.summary.as_deref().unwrap_or(""))
        .bind(&item.url)
        .bind(&item.author)
        .bind(item.published_at)
        .bind(&tags)
        .bind(&item.url_hash)
        .bind(&raw)
        .bind(&item.image_url)
        .bind(&item.category)
        .bind(item.translation_status.map(|s| s.to_string()))
        .bind(&group_id)
        .execute(&self.pool)
        .await?;

        debug!(id = %item.id, group_id = %group_id, "Saved feed item");
        Ok(())
    }

    /// Retroactively assign a group id to an already-persisted item
    /// (converting an ungrouped single into a group representative).
    /// Updates both the mirror column and the raw-bag annotation.
    pub async fn set_group_id(&self, item_id: &str, group_id: &str) -> Result<()> {
        // Path literal matches RAW_GROUP_ID_KEY in satwire-common.
        sqlx::query(
            r#"
            UPDATE feed_items
            SET group_id = $2,
                raw = jsonb_set(COALESCE(raw, '{}'::jsonb), '{dedup_group_id}', to_jsonb($2::text))
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the outcome of one source's pipeline run. Success and error
    /// timestamps accumulate independently so a later success does not
    /// erase the last error message.
    pub async fn upsert_source_status(
        &self,
        source: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<()> {
        if success {
            sqlx::query(
                r#"
                INSERT INTO source_status (source, last_success_at)
                VALUES ($1, now())
                ON CONFLICT (source) DO UPDATE SET last_success_at = now()
                "#,
            )
            .bind(source)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO source_status (source, last_error_at, last_error_message)
                VALUES ($1, now(), $2)
                ON CONFLICT (source) DO UPDATE
                SET last_error_at = now(), last_error_message = $2
                "#,
            )
            .bind(source)
            .bind(error)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Read back one source's status row, `None` when the source has
    /// never completed a run.
    pub async fn source_status(&self, source: &str) -> Result<Option<SourceStatus>> {
        let row = sqlx::query(
            r#"
            SELECT source, last_success_at, last_error_at, last_error_message
            FROM source_status
            WHERE source = $1
            "#,
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SourceStatus {
            source: r.get("source"),
            last_success_at: r.get("last_success_at"),
            last_error_at: r.get("last_error_at"),
            last_error_message: r.get("last_error_message"),
        }))
    }
}
