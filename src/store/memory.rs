//! In-memory [`Store`] implementation for tests and local dry runs.
//!
//! All tables live behind one `std::sync::Mutex`, so each write is applied
//! atomically, the same way a committed transaction would be. Ids are
//! assigned from per-table counters starting at 1.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ContentItem, StoredContent, TableCounts, TaxonomyEntity, TaxonomyKind};

use super::{Store, REQUIRED_TABLES};

/// A post row plus its bookkeeping timestamps.
#[derive(Debug, Clone)]
pub struct StoredPost {
    pub id: i64,
    pub item: ContentItem,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    posts: BTreeMap<String, StoredPost>,
    next_post_id: i64,
    entities: BTreeMap<(TaxonomyKind, String), (i64, TaxonomyEntity)>,
    next_entity_id: i64,
    links: BTreeSet<(TaxonomyKind, i64, i64)>,
}

/// In-memory store mirroring the Postgres content schema.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    absent_tables: HashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            absent_tables: HashSet::new(),
        }
    }

    /// Pretend `table` does not exist, for schema validation tests.
    pub fn without_table(mut self, table: &str) -> Self {
        self.absent_tables.insert(table.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored post by slug.
    pub fn post(&self, slug: &str) -> Option<StoredPost> {
        self.lock().posts.get(slug).cloned()
    }

    /// Stored entity by kind and slug.
    pub fn entity(&self, kind: TaxonomyKind, slug: &str) -> Option<TaxonomyEntity> {
        self.lock()
            .entities
            .get(&(kind, slug.to_string()))
            .map(|(_, e)| e.clone())
    }

    /// Slugs of the entities of `kind` linked to the post `slug`.
    pub fn linked_slugs(&self, slug: &str, kind: TaxonomyKind) -> Vec<String> {
        let tables = self.lock();
        let Some(post) = tables.posts.get(slug) else {
            return Vec::new();
        };
        let mut slugs: Vec<String> = tables
            .links
            .iter()
            .filter(|(k, content_id, _)| *k == kind && *content_id == post.id)
            .filter_map(|(_, _, entity_id)| {
                tables
                    .entities
                    .iter()
                    .find(|((k, _), (id, _))| *k == kind && id == entity_id)
                    .map(|((_, s), _)| s.clone())
            })
            .collect();
        slugs.sort();
        slugs
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_content_item(&self, item: &ContentItem) -> Result<i64> {
        let now = Utc::now();
        let mut tables = self.lock();
        if let Some(existing) = tables.posts.get_mut(&item.slug) {
            existing.item = item.clone();
            existing.updated_at = now;
            return Ok(existing.id);
        }

        tables.next_post_id += 1;
        let id = tables.next_post_id;
        tables.posts.insert(
            item.slug.clone(),
            StoredPost {
                id,
                item: item.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn ensure_taxonomy_entity(&self, entity: &TaxonomyEntity) -> Result<()> {
        let mut tables = self.lock();
        let key = (entity.kind, entity.slug.clone());
        if !tables.entities.contains_key(&key) {
            tables.next_entity_id += 1;
            let id = tables.next_entity_id;
            tables.entities.insert(key, (id, entity.clone()));
        }
        Ok(())
    }

    async fn link_content_to_taxonomy(
        &self,
        kind: TaxonomyKind,
        content_id: i64,
        entity_id: i64,
    ) -> Result<()> {
        self.lock().links.insert((kind, content_id, entity_id));
        Ok(())
    }

    async fn find_content_id(&self, slug: &str) -> Result<Option<i64>> {
        Ok(self.lock().posts.get(slug).map(|p| p.id))
    }

    async fn find_taxonomy_id(&self, kind: TaxonomyKind, slug: &str) -> Result<Option<i64>> {
        Ok(self
            .lock()
            .entities
            .get(&(kind, slug.to_string()))
            .map(|(id, _)| *id))
    }

    async fn list_content_metadata(&self) -> Result<Vec<StoredContent>> {
        let tables = self.lock();
        let mut stored: Vec<StoredContent> = tables
            .posts
            .values()
            .filter(|p| !p.item.original_metadata.is_null())
            .map(|p| StoredContent {
                id: p.id,
                slug: p.item.slug.clone(),
                metadata: p.item.original_metadata.clone(),
            })
            .collect();
        stored.sort_by_key(|s| s.id);
        Ok(stored)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn missing_tables(&self, required: &[&str]) -> Result<Vec<String>> {
        Ok(required
            .iter()
            .filter(|t| !REQUIRED_TABLES.contains(*t) || self.absent_tables.contains(**t))
            .map(|t| t.to_string())
            .collect())
    }

    async fn row_counts(&self) -> Result<TableCounts> {
        let tables = self.lock();
        let entities_of = |kind: TaxonomyKind| {
            tables.entities.keys().filter(|(k, _)| *k == kind).count() as i64
        };
        let links_of =
            |kind: TaxonomyKind| tables.links.iter().filter(|(k, _, _)| *k == kind).count() as i64;
        Ok(TableCounts {
            posts: tables.posts.len() as i64,
            categories: entities_of(TaxonomyKind::Category),
            tags: entities_of(TaxonomyKind::Tag),
            post_categories: links_of(TaxonomyKind::Category),
            post_tags: links_of(TaxonomyKind::Tag),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, Status};
    use serde_json::json;
    use std::path::PathBuf;

    fn item(slug: &str, title: &str) -> ContentItem {
        ContentItem {
            slug: slug.to_string(),
            title: title.to_string(),
            body: "body".to_string(),
            excerpt: "body".to_string(),
            meta_description: None,
            featured_image: None,
            published_at: None,
            status: Status::Published,
            kind: ContentKind::Post,
            original_metadata: json!({"title": title}),
            source_path: PathBuf::from(format!("{}.md", slug)),
        }
    }

    fn tag(name: &str, slug: &str) -> TaxonomyEntity {
        TaxonomyEntity {
            kind: TaxonomyKind::Tag,
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_slug() {
        let store = InMemoryStore::new();
        let id1 = store.upsert_content_item(&item("a", "First")).await.unwrap();
        let id2 = store.upsert_content_item(&item("a", "Second")).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.post("a").unwrap().item.title, "Second");
        assert_eq!(store.row_counts().await.unwrap().posts, 1);
    }

    #[tokio::test]
    async fn ensure_entity_keeps_first_row() {
        let store = InMemoryStore::new();
        store.ensure_taxonomy_entity(&tag("React", "react")).await.unwrap();
        store.ensure_taxonomy_entity(&tag("react", "react")).await.unwrap();
        assert_eq!(store.row_counts().await.unwrap().tags, 1);
        assert_eq!(store.entity(TaxonomyKind::Tag, "react").unwrap().name, "React");
    }

    #[tokio::test]
    async fn same_slug_in_different_kinds_are_distinct() {
        let store = InMemoryStore::new();
        store.ensure_taxonomy_entity(&tag("Rust", "rust")).await.unwrap();
        store
            .ensure_taxonomy_entity(&TaxonomyEntity {
                kind: TaxonomyKind::Category,
                name: "Rust".into(),
                slug: "rust".into(),
            })
            .await
            .unwrap();
        let counts = store.row_counts().await.unwrap();
        assert_eq!((counts.categories, counts.tags), (1, 1));
    }

    #[tokio::test]
    async fn links_are_idempotent() {
        let store = InMemoryStore::new();
        let post = store.upsert_content_item(&item("a", "A")).await.unwrap();
        store.ensure_taxonomy_entity(&tag("Rust", "rust")).await.unwrap();
        let tag_id = store
            .find_taxonomy_id(TaxonomyKind::Tag, "rust")
            .await
            .unwrap()
            .unwrap();
        store
            .link_content_to_taxonomy(TaxonomyKind::Tag, post, tag_id)
            .await
            .unwrap();
        store
            .link_content_to_taxonomy(TaxonomyKind::Tag, post, tag_id)
            .await
            .unwrap();
        assert_eq!(store.row_counts().await.unwrap().post_tags, 1);
        assert_eq!(store.linked_slugs("a", TaxonomyKind::Tag), vec!["rust"]);
    }

    #[tokio::test]
    async fn missing_tables_reports_absent() {
        let store = InMemoryStore::new().without_table("post_tags");
        let missing = store.missing_tables(&REQUIRED_TABLES).await.unwrap();
        assert_eq!(missing, vec!["post_tags"]);
    }
}
