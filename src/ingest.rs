//! Per-document load pipeline.
//!
//! One call to [`process_document`] takes a source path through
//! read → parse → normalize → taxonomy accumulation → skip-existing check →
//! upsert. Every failure is caught here and returned as a
//! [`DocumentOutcome::Failed`] tagged with the stage it happened in, so a bad
//! document never affects its siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::models::{ContentItem, DocumentOutcome, Failure, FailureStage, SourceDocument};
use crate::normalize::normalize;
use crate::parser::parse_document;
use crate::store::Store;
use crate::taxonomy::{DocumentTaxonomy, TaxonomyAccumulator};

/// Reserved metadata key holding migration provenance.
pub const MIGRATION_KEY: &str = "_migration";

/// Shared, read-only state for every document task in a run.
pub struct IngestContext {
    pub store: Arc<dyn Store>,
    pub taxonomy: Arc<TaxonomyAccumulator>,
    pub root: PathBuf,
    pub images_dir: PathBuf,
    pub excerpt_length: usize,
    pub strict_headers: bool,
    pub dry_run: bool,
    pub skip_existing: bool,
}

/// A document that parsed and normalized cleanly, ready to persist.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub item: ContentItem,
    pub taxonomy: DocumentTaxonomy,
}

pub async fn process_document(ctx: &IngestContext, path: &Path) -> DocumentOutcome {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => return failed(path, FailureStage::Read, e.to_string()),
    };
    let raw_text = decode_text(path, bytes);
    let document = SourceDocument {
        path: path.to_path_buf(),
        raw_text,
    };

    let prepared = match prepare_document(
        &document,
        &ctx.root,
        ctx.excerpt_length,
        ctx.strict_headers,
        Utc::now(),
    ) {
        Ok(prepared) => prepared,
        Err(failure) => {
            error!(
                path = %failure.subject,
                stage = failure.stage.as_str(),
                cause = %failure.cause,
                "document failed"
            );
            return DocumentOutcome::Failed(failure);
        }
    };
    let PreparedDocument { item, taxonomy } = prepared;

    if let Some(image) = &item.featured_image {
        check_image(&ctx.images_dir, image, path).await;
    }

    ctx.taxonomy.record_document(&taxonomy);

    if ctx.skip_existing {
        match ctx.store.find_content_id(&item.slug).await {
            Ok(Some(_)) => {
                debug!(slug = %item.slug, "already stored, skipping");
                return DocumentOutcome::Skipped { slug: item.slug };
            }
            Ok(None) => {}
            Err(e) => return failed(path, FailureStage::SkipCheck, e.to_string()),
        }
    }

    if !ctx.dry_run {
        if let Err(e) = ctx.store.upsert_content_item(&item).await {
            return failed(path, FailureStage::Persist, e.to_string());
        }
    }

    debug!(
        path = %path.display(),
        slug = %item.slug,
        status = item.status.as_str(),
        kind = item.kind.as_str(),
        dry_run = ctx.dry_run,
        "document loaded"
    );
    DocumentOutcome::Processed { slug: item.slug }
}

/// Parse and normalize one document without touching the store.
///
/// A header defect is a failure when `strict_headers` is set; otherwise the
/// degraded parse (empty metadata, raw body) is used.
pub fn prepare_document(
    document: &SourceDocument,
    root: &Path,
    excerpt_length: usize,
    strict_headers: bool,
    migrated_at: DateTime<Utc>,
) -> Result<PreparedDocument, Failure> {
    let parsed = parse_document(&document.raw_text);
    if let Some(defect) = &parsed.defect {
        if strict_headers {
            return Err(Failure {
                subject: document.path.display().to_string(),
                stage: FailureStage::Parse,
                cause: defect.to_string(),
            });
        }
        warn!(
            path = %document.path.display(),
            defect = %defect,
            "loading document without its header"
        );
    }

    let relative = document.path.strip_prefix(root).unwrap_or(&document.path);
    let fields = normalize(&parsed.metadata, &parsed.body, relative, excerpt_length);
    let taxonomy = DocumentTaxonomy::from_metadata(&parsed.metadata);

    let mut original_metadata = parsed.metadata.to_json();
    if let Value::Object(map) = &mut original_metadata {
        map.insert(
            MIGRATION_KEY.to_string(),
            json!({
                "originalPath": document.path.display().to_string(),
                "migratedAt": migrated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
        );
    }

    let item = ContentItem {
        slug: fields.slug,
        title: fields.title,
        body: fields.body,
        excerpt: fields.excerpt,
        meta_description: fields.meta_description,
        featured_image: fields.featured_image,
        published_at: fields.published_at,
        status: fields.status,
        kind: fields.kind,
        original_metadata,
        source_path: document.path.clone(),
    };

    Ok(PreparedDocument { item, taxonomy })
}

/// Decode file bytes as UTF-8, replacing invalid sequences with U+FFFD.
fn decode_text(path: &Path, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                path = %path.display(),
                offset = e.utf8_error().valid_up_to(),
                "document is not valid UTF-8, invalid bytes replaced"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

/// Warn when a site-local `/images/...` reference has no file behind it.
async fn check_image(images_dir: &Path, image: &str, document: &Path) {
    let Some(rest) = image.strip_prefix("/images/") else {
        return;
    };
    let candidate = images_dir.join(rest);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        warn!(
            path = %document.display(),
            image = %candidate.display(),
            "featured image not found"
        );
    }
}

fn failed(path: &Path, stage: FailureStage, cause: String) -> DocumentOutcome {
    error!(
        path = %path.display(),
        stage = stage.as_str(),
        cause = %cause,
        "document failed"
    );
    DocumentOutcome::Failed(Failure {
        subject: path.display().to_string(),
        stage,
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, Status, TaxonomyKind};
    use crate::store::memory::InMemoryStore;
    use tempfile::TempDir;

    fn doc(path: &str, raw: &str) -> SourceDocument {
        SourceDocument {
            path: PathBuf::from(path),
            raw_text: raw.to_string(),
        }
    }

    fn prepare(document: &SourceDocument, strict: bool) -> Result<PreparedDocument, Failure> {
        prepare_document(document, Path::new("content"), 160, strict, Utc::now())
    }

    #[test]
    fn prepares_full_item() {
        let document = doc(
            "content/pages/2024-01-15-about-us.md",
            "---\ntitle: About\ntags: [Team, team, Culture]\nimage: ./about.png\n---\nHello there.\n",
        );
        let prepared = prepare(&document, true).unwrap();
        let item = prepared.item;

        assert_eq!(item.slug, "about-us");
        assert_eq!(item.title, "About");
        assert_eq!(item.kind, ContentKind::Page);
        assert_eq!(item.status, Status::Published);
        assert_eq!(item.body, "Hello there.");
        assert_eq!(item.featured_image.as_deref(), Some("/about.png"));
        assert_eq!(prepared.taxonomy.tags, vec!["Team", "Culture"]);

        assert_eq!(item.original_metadata["title"], "About");
        assert_eq!(
            item.original_metadata[MIGRATION_KEY]["originalPath"],
            "content/pages/2024-01-15-about-us.md"
        );
        assert!(item.original_metadata[MIGRATION_KEY]["migratedAt"].is_string());
    }

    #[test]
    fn broken_header_fails_when_strict() {
        let document = doc("content/broken.md", "---\ntitle: [unclosed\n---\nbody\n");
        let failure = prepare(&document, true).unwrap_err();
        assert_eq!(failure.stage, FailureStage::Parse);
        assert_eq!(failure.subject, "content/broken.md");
    }

    #[test]
    fn broken_header_degrades_when_lenient() {
        let document = doc("content/broken.md", "---\ntitle: [unclosed\n---\nbody\n");
        let prepared = prepare(&document, false).unwrap();
        assert_eq!(prepared.item.slug, "broken");
        assert_eq!(prepared.item.title, "Broken");
    }

    fn context(root: &Path, store: Arc<InMemoryStore>) -> IngestContext {
        IngestContext {
            store,
            taxonomy: Arc::new(TaxonomyAccumulator::new()),
            root: root.to_path_buf(),
            images_dir: root.join("images"),
            excerpt_length: 160,
            strict_headers: true,
            dry_run: false,
            skip_existing: false,
        }
    }

    #[tokio::test]
    async fn unreadable_file_is_read_failure() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let ctx = context(tmp.path(), store);
        let outcome = process_document(&ctx, &tmp.path().join("missing.md")).await;
        match outcome {
            DocumentOutcome::Failed(f) => assert_eq!(f.stage, FailureStage::Read),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn skip_existing_still_records_taxonomy() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.md");
        std::fs::write(&path, "---\ntitle: Post\ncategories: Rust\n---\nbody\n").unwrap();

        let store = Arc::new(InMemoryStore::new());
        let mut ctx = context(tmp.path(), store.clone());
        assert_eq!(
            process_document(&ctx, &path).await,
            DocumentOutcome::Processed { slug: "post".into() }
        );

        ctx.skip_existing = true;
        ctx.taxonomy = Arc::new(TaxonomyAccumulator::new());
        assert_eq!(
            process_document(&ctx, &path).await,
            DocumentOutcome::Skipped { slug: "post".into() }
        );
        assert_eq!(ctx.taxonomy.len(TaxonomyKind::Category), 1);
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.md");
        std::fs::write(&path, b"---\ntitle: Caf\xe9\n---\nbody\n").unwrap();

        let store = Arc::new(InMemoryStore::new());
        let ctx = context(tmp.path(), store.clone());
        assert_eq!(
            process_document(&ctx, &path).await,
            DocumentOutcome::Processed { slug: "latin1".into() }
        );
        assert_eq!(store.post("latin1").unwrap().item.title, "Caf\u{fffd}");
    }

    #[test]
    fn decode_keeps_valid_text_untouched() {
        let text = decode_text(Path::new("a.md"), "Café".as_bytes().to_vec());
        assert_eq!(text, "Café");
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.md");
        std::fs::write(&path, "# Heading\n\nbody\n").unwrap();

        let store = Arc::new(InMemoryStore::new());
        let mut ctx = context(tmp.path(), store.clone());
        ctx.dry_run = true;
        assert!(matches!(
            process_document(&ctx, &path).await,
            DocumentOutcome::Processed { .. }
        ));
        assert!(store.post("post").is_none());
    }
}
