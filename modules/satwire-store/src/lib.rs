//! Postgres persistence for the ingestion pipeline.
//!
//! One store struct over a `PgPool`. Schema lives in `schema.sql`;
//! migrations are managed outside this crate.

mod store;

pub use store::{FeedStore, StoredCandidate};
