//! Core data models used throughout the migration engine.
//!
//! These types represent the documents, content rows, taxonomy entities and
//! per-document outcomes that flow through the load pipeline.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A source file read from the content tree. Lives only for one task.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub raw_text: String,
}

/// Publication status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Draft,
    Published,
    Archived,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Published => "published",
            Status::Archived => "archived",
        }
    }
}

/// What sort of content a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Post,
    Page,
    Project,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Page => "page",
            ContentKind::Project => "project",
        }
    }

    /// Parse a kind name, case-insensitively. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "post" => Some(ContentKind::Post),
            "page" => Some(ContentKind::Page),
            "project" => Some(ContentKind::Project),
            _ => None,
        }
    }
}

/// Normalized content row, persisted in `posts`.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub status: Status,
    pub kind: ContentKind,
    /// Full header metadata plus `_migration` provenance, as JSON.
    pub original_metadata: serde_json::Value,
    pub source_path: PathBuf,
}

/// Category or tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaxonomyKind {
    Category,
    Tag,
}

impl TaxonomyKind {
    pub const ALL: [TaxonomyKind; 2] = [TaxonomyKind::Category, TaxonomyKind::Tag];

    /// Entity table name.
    pub fn table(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "categories",
            TaxonomyKind::Tag => "tags",
        }
    }

    /// Link table name.
    pub fn link_table(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "post_categories",
            TaxonomyKind::Tag => "post_tags",
        }
    }

    /// Entity id column in the link table.
    pub fn link_column(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category_id",
            TaxonomyKind::Tag => "tag_id",
        }
    }

    /// Metadata keys holding names for this kind, in precedence order.
    pub fn metadata_keys(&self) -> [&'static str; 2] {
        match self {
            TaxonomyKind::Category => ["categories", "category"],
            TaxonomyKind::Tag => ["tags", "tag"],
        }
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonomyKind::Category => write!(f, "category"),
            TaxonomyKind::Tag => write!(f, "tag"),
        }
    }
}

/// A category or tag to be ensured in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyEntity {
    pub kind: TaxonomyKind,
    pub name: String,
    pub slug: String,
}

impl TaxonomyEntity {
    /// Description written alongside auto-created categories.
    pub fn description(&self) -> Option<String> {
        match self.kind {
            TaxonomyKind::Category => Some(format!("Auto-generated category for {}", self.name)),
            TaxonomyKind::Tag => None,
        }
    }
}

/// A persisted content row as re-read by the link stage.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub id: i64,
    pub slug: String,
    pub metadata: serde_json::Value,
}

/// Row counts for every table the engine writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub posts: i64,
    pub categories: i64,
    pub tags: i64,
    pub post_categories: i64,
    pub post_tags: i64,
}

/// Where in the pipeline a recoverable failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Read,
    Parse,
    SkipCheck,
    Persist,
    Task,
    Taxonomy,
    Link,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Read => "read",
            FailureStage::Parse => "parse",
            FailureStage::SkipCheck => "skip-check",
            FailureStage::Persist => "persist",
            FailureStage::Task => "task",
            FailureStage::Taxonomy => "taxonomy",
            FailureStage::Link => "link",
        }
    }
}

/// A recoverable failure, tagged with the input that caused it.
///
/// `subject` is a source path for document stages, an entity name for the
/// taxonomy stage, and `slug -> kind:name` for the link stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub subject: String,
    pub stage: FailureStage,
    pub cause: String,
}

/// Outcome of processing one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Processed { slug: String },
    Skipped { slug: String },
    Failed(Failure),
}
