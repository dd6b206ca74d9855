//! Postgres-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the content schema owned by the CMS:
//! `posts`, `categories`, `tags`, `post_categories` and `post_tags`. The
//! schema is never created here; [`Store::missing_tables`] lets validation
//! refuse to run against a database that lacks it.
//!
//! Id columns are read through a `::bigint` cast so serial and bigserial
//! keys both decode as `i64`.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use tracing::warn;

use crate::error::Result;
use crate::models::{ContentItem, StoredContent, TableCounts, TaxonomyEntity, TaxonomyKind};

use super::Store;

const UPSERT_POST: &str = r#"
    INSERT INTO posts (
        slug, title, content, excerpt, meta_description, featured_image,
        published_at, status, type, frontmatter
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    ON CONFLICT (slug) DO UPDATE SET
        title = EXCLUDED.title,
        content = EXCLUDED.content,
        excerpt = EXCLUDED.excerpt,
        meta_description = EXCLUDED.meta_description,
        featured_image = EXCLUDED.featured_image,
        published_at = EXCLUDED.published_at,
        status = EXCLUDED.status,
        type = EXCLUDED.type,
        frontmatter = EXCLUDED.frontmatter,
        updated_at = CURRENT_TIMESTAMP
    RETURNING id::bigint
"#;

/// Postgres implementation of the [`Store`] trait.
///
/// Wraps the process-wide [`PgPool`]; every write checks out one connection
/// for the length of its transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Commit on success, roll back on failure.
///
/// A failed rollback is only logged: the connection is discarded by the pool
/// and the original error is what the caller needs to see.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    result: std::result::Result<T, sqlx::Error>,
) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(e.into())
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_content_item(&self, item: &ContentItem) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query_scalar::<_, i64>(UPSERT_POST)
            .bind(&item.slug)
            .bind(&item.title)
            .bind(&item.body)
            .bind(&item.excerpt)
            .bind(&item.meta_description)
            .bind(&item.featured_image)
            .bind(item.published_at)
            .bind(item.status.as_str())
            .bind(item.kind.as_str())
            .bind(Json(&item.original_metadata))
            .fetch_one(&mut *tx)
            .await;

        finish(tx, result).await
    }

    async fn ensure_taxonomy_entity(&self, entity: &TaxonomyEntity) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = match entity.kind {
            TaxonomyKind::Category => {
                sqlx::query(
                    r#"
                    INSERT INTO categories (name, slug, description)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (slug) DO NOTHING
                    "#,
                )
                .bind(&entity.name)
                .bind(&entity.slug)
                .bind(entity.description())
                .execute(&mut *tx)
                .await
            }
            TaxonomyKind::Tag => {
                sqlx::query(
                    r#"
                    INSERT INTO tags (name, slug)
                    VALUES ($1, $2)
                    ON CONFLICT (slug) DO NOTHING
                    "#,
                )
                .bind(&entity.name)
                .bind(&entity.slug)
                .execute(&mut *tx)
                .await
            }
        };

        finish(tx, result.map(|_| ())).await
    }

    async fn link_content_to_taxonomy(
        &self,
        kind: TaxonomyKind,
        content_id: i64,
        entity_id: i64,
    ) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (post_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        );

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&sql)
            .bind(content_id)
            .bind(entity_id)
            .execute(&mut *tx)
            .await;

        finish(tx, result.map(|_| ())).await
    }

    async fn find_content_id(&self, slug: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id::bigint FROM posts WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn find_taxonomy_id(&self, kind: TaxonomyKind, slug: &str) -> Result<Option<i64>> {
        let sql = format!("SELECT id::bigint FROM {} WHERE slug = $1", kind.table());
        let id = sqlx::query_scalar::<_, i64>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list_content_metadata(&self) -> Result<Vec<StoredContent>> {
        // `::jsonb` also accepts a text column holding JSON.
        let rows = sqlx::query(
            r#"
            SELECT id::bigint AS id, slug, frontmatter::jsonb AS frontmatter
            FROM posts
            WHERE frontmatter IS NOT NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(metadata): Json<serde_json::Value> = row.try_get("frontmatter")?;
            stored.push(StoredContent {
                id: row.try_get("id")?,
                slug: row.try_get("slug")?,
                metadata,
            });
        }
        Ok(stored)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn missing_tables(&self, required: &[&str]) -> Result<Vec<String>> {
        let wanted: Vec<String> = required.iter().map(|t| t.to_string()).collect();
        let existing: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name::text = ANY($1)
            "#,
        )
        .bind(&wanted)
        .fetch_all(&self.pool)
        .await?;

        Ok(wanted
            .into_iter()
            .filter(|t| !existing.contains(t))
            .collect())
    }

    async fn row_counts(&self) -> Result<TableCounts> {
        let mut counts = [0i64; 5];
        for (slot, table) in counts.iter_mut().zip(super::REQUIRED_TABLES) {
            *slot = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
        }
        let [posts, categories, tags, post_categories, post_tags] = counts;
        Ok(TableCounts {
            posts,
            categories,
            tags,
            post_categories,
            post_tags,
        })
    }
}
