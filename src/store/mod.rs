//! Storage abstraction for the migration engine.
//!
//! The [`Store`] trait defines every read and write the pipeline performs
//! against the content schema, so the same orchestration drives the Postgres
//! backend in production and the in-memory backend in tests.
//!
//! Writes are idempotent. Each one runs in its own transaction on a pooled
//! connection, and a failed write leaves nothing behind.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert_content_item`](Store::upsert_content_item) | Insert or overwrite a post by slug |
//! | [`ensure_taxonomy_entity`](Store::ensure_taxonomy_entity) | Insert a category/tag unless its slug exists |
//! | [`link_content_to_taxonomy`](Store::link_content_to_taxonomy) | Insert a post↔entity pair unless present |
//! | [`find_content_id`](Store::find_content_id) | Look up a post by slug |
//! | [`find_taxonomy_id`](Store::find_taxonomy_id) | Look up a category/tag by slug |
//! | [`list_content_metadata`](Store::list_content_metadata) | Every post's id, slug and stored metadata |
//! | [`ping`](Store::ping) | Connectivity check |
//! | [`missing_tables`](Store::missing_tables) | Schema check |
//! | [`row_counts`](Store::row_counts) | Per-table row counts |

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ContentItem, StoredContent, TableCounts, TaxonomyEntity, TaxonomyKind};

/// Tables the engine reads and writes. Validation fails if any is missing.
pub const REQUIRED_TABLES: [&str; 5] = [
    "posts",
    "categories",
    "tags",
    "post_categories",
    "post_tags",
];

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert keyed by slug; on conflict overwrite every mutable field.
    ///
    /// Returns the persisted row id.
    async fn upsert_content_item(&self, item: &ContentItem) -> Result<i64>;

    /// Insert keyed by (kind, slug); an existing row is left untouched.
    async fn ensure_taxonomy_entity(&self, entity: &TaxonomyEntity) -> Result<()>;

    /// Insert the (content, entity) pair; an existing pair is a no-op.
    async fn link_content_to_taxonomy(
        &self,
        kind: TaxonomyKind,
        content_id: i64,
        entity_id: i64,
    ) -> Result<()>;

    async fn find_content_id(&self, slug: &str) -> Result<Option<i64>>;

    async fn find_taxonomy_id(&self, kind: TaxonomyKind, slug: &str) -> Result<Option<i64>>;

    /// Every persisted post with non-null stored metadata.
    async fn list_content_metadata(&self) -> Result<Vec<StoredContent>>;

    async fn ping(&self) -> Result<()>;

    /// Names from `required` that do not exist in the target schema.
    async fn missing_tables(&self, required: &[&str]) -> Result<Vec<String>>;

    async fn row_counts(&self) -> Result<TableCounts>;
}
