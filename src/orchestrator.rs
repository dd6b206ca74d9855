//! Run sequencing.
//!
//! A full run moves strictly forward through
//! `Validating → LoadingContent → LoadingTaxonomy → Linking → Reporting → Done`.
//! Only validation can end a run early (`Aborted`); once it passes, every
//! later failure is recoverable and the run always reaches `Reporting`.
//!
//! Dry runs derive and accumulate exactly as a real run does but perform no
//! store writes. Store reads (skip-existing, link resolution) still happen.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::MigrateError;
use crate::ingest::IngestContext;
use crate::metadata::Metadata;
use crate::models::{Failure, FailureStage, TableCounts, TaxonomyKind};
use crate::normalize::slugify;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::report::RunReport;
use crate::scheduler::load_documents;
use crate::schema::verify_schema;
use crate::store::Store;
use crate::taxonomy::{DocumentTaxonomy, TaxonomyAccumulator};
use crate::walker::list_documents;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    LoadingContent,
    LoadingTaxonomy,
    Linking,
    Reporting,
    Done,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::LoadingContent => "loading-content",
            Stage::LoadingTaxonomy => "loading-taxonomy",
            Stage::Linking => "linking",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub verbose: bool,
    pub skip_existing: bool,
}

/// Checks that need neither the database nor a connection pool.
///
/// The binary calls this before building the pool so that a bad config or
/// a missing content directory fails fast.
pub fn preflight(config: &Config, require_source: bool) -> Result<()> {
    config.validate()?;
    config.database_url()?;

    if require_source {
        let root = &config.source.root;
        if !root.is_dir() {
            return Err(MigrateError::validation(format!(
                "content directory {} does not exist or is not a directory",
                root.display()
            ))
            .into());
        }
    }
    Ok(())
}

pub struct Orchestrator {
    config: Config,
    store: Arc<dyn Store>,
    options: RunOptions,
    progress: Box<dyn ProgressReporter>,
    stage: Stage,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        options: RunOptions,
        progress: Box<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            store,
            options,
            progress,
            stage: Stage::Validating,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }

    /// Fatal precondition checks. Any failure moves the run to `Aborted`.
    async fn validate(&mut self, require_source: bool) -> Result<()> {
        let result = self.check_preconditions(require_source).await;
        if let Err(e) = &result {
            error!(error = %e, "validation failed");
            self.enter(Stage::Aborted);
        }
        result
    }

    async fn check_preconditions(&self, require_source: bool) -> Result<()> {
        preflight(&self.config, require_source)?;
        self.store
            .ping()
            .await
            .context("database is not reachable")?;
        verify_schema(self.store.as_ref()).await?;
        Ok(())
    }

    /// Full migration: content, taxonomy, links.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.validate(true).await?;
        let mut report = RunReport::new(self.options.dry_run);

        self.enter(Stage::LoadingContent);
        let taxonomy = Arc::new(TaxonomyAccumulator::new());
        self.load_content(&mut report, taxonomy.clone()).await?;

        self.enter(Stage::LoadingTaxonomy);
        self.load_taxonomy(&mut report, &taxonomy).await;

        self.enter(Stage::Linking);
        if self.options.dry_run {
            info!("dry run: skipping link stage");
        } else {
            self.link(&mut report).await;
        }

        self.finish(&report);
        Ok(report)
    }

    /// Re-run the link stage alone over whatever the store already holds.
    pub async fn run_link_only(&mut self) -> Result<RunReport> {
        self.validate(false).await?;
        let mut report = RunReport::new(self.options.dry_run);

        self.enter(Stage::Linking);
        self.link(&mut report).await;

        self.finish(&report);
        Ok(report)
    }

    /// Validation only, then the current row counts.
    pub async fn check(&mut self) -> Result<TableCounts> {
        self.validate(true).await?;
        let counts = self
            .store
            .row_counts()
            .await
            .context("failed to count rows")?;
        self.enter(Stage::Done);
        Ok(counts)
    }

    fn finish(&mut self, report: &RunReport) {
        self.enter(Stage::Reporting);
        info!(
            processed = report.processed,
            skipped = report.skipped,
            errors = report.error_count(),
            categories = report.categories,
            tags = report.tags,
            links = report.links_written,
            "migration finished"
        );
        self.enter(Stage::Done);
    }

    async fn load_content(
        &self,
        report: &mut RunReport,
        taxonomy: Arc<TaxonomyAccumulator>,
    ) -> Result<()> {
        self.progress.report(ProgressEvent::Discovering {
            root: self.config.source.root.display().to_string(),
        });
        let paths = list_documents(&self.config.source).context("failed to list documents")?;
        report.discovered = paths.len();
        info!(
            documents = paths.len(),
            root = %self.config.source.root.display(),
            "found documents"
        );

        let ctx = Arc::new(IngestContext {
            store: self.store.clone(),
            taxonomy: taxonomy.clone(),
            root: self.config.source.root.clone(),
            images_dir: self.config.source.images_dir.clone(),
            excerpt_length: self.config.migration.excerpt_length,
            strict_headers: self.config.migration.strict_headers,
            dry_run: self.options.dry_run,
            skip_existing: self.options.skip_existing,
        });

        let outcomes = load_documents(
            ctx,
            &paths,
            self.config.migration.batch_size,
            self.progress.as_ref(),
        )
        .await;
        for outcome in outcomes {
            report.record_outcome(outcome);
        }

        report.categories = taxonomy.len(TaxonomyKind::Category);
        report.tags = taxonomy.len(TaxonomyKind::Tag);
        Ok(())
    }

    async fn load_taxonomy(&self, report: &mut RunReport, taxonomy: &TaxonomyAccumulator) {
        for kind in TaxonomyKind::ALL {
            let entities = taxonomy.entities(kind);
            if self.options.verbose {
                let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
                debug!(kind = %kind, names = ?names, "accumulated taxonomy");
            }
            if self.options.dry_run {
                continue;
            }
            for entity in &entities {
                if let Err(e) = self.store.ensure_taxonomy_entity(entity).await {
                    error!(
                        kind = %kind,
                        name = %entity.name,
                        error = %e,
                        "failed to create taxonomy entity"
                    );
                    report.record_failure(Failure {
                        subject: entity.name.clone(),
                        stage: FailureStage::Taxonomy,
                        cause: e.to_string(),
                    });
                }
            }
        }
        info!(
            categories = report.categories,
            tags = report.tags,
            dry_run = self.options.dry_run,
            "taxonomy loaded"
        );
    }

    /// Re-derive membership from stored metadata and write every link.
    ///
    /// Names that resolve to no entity are skipped. In a dry run the links
    /// are resolved and counted but not written.
    async fn link(&self, report: &mut RunReport) {
        let stored = match self.store.list_content_metadata().await {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "failed to read stored content");
                report.record_failure(Failure {
                    subject: "posts".to_string(),
                    stage: FailureStage::Link,
                    cause: e.to_string(),
                });
                return;
            }
        };

        let total = stored.len() as u64;
        let every = self.config.migration.batch_size.max(1);
        let mut resolved: HashMap<(TaxonomyKind, String), Option<i64>> = HashMap::new();

        for (index, content) in stored.iter().enumerate() {
            let metadata = Metadata::from_json(&content.metadata);
            let membership = DocumentTaxonomy::from_metadata(&metadata);

            for kind in TaxonomyKind::ALL {
                for name in membership.names(kind) {
                    let subject = format!("{} -> {}:{}", content.slug, kind, name);
                    let slug = slugify(name);
                    let entity_id = match resolved.get(&(kind, slug.clone())) {
                        Some(id) => *id,
                        None => match self.store.find_taxonomy_id(kind, &slug).await {
                            Ok(id) => {
                                resolved.insert((kind, slug.clone()), id);
                                id
                            }
                            Err(e) => {
                                report.record_failure(Failure {
                                    subject,
                                    stage: FailureStage::Link,
                                    cause: e.to_string(),
                                });
                                continue;
                            }
                        },
                    };

                    let Some(entity_id) = entity_id else {
                        warn!(
                            slug = %content.slug,
                            kind = %kind,
                            name = %name,
                            "no entity for name, skipping link"
                        );
                        continue;
                    };

                    if self.options.dry_run {
                        report.links_written += 1;
                        continue;
                    }
                    match self
                        .store
                        .link_content_to_taxonomy(kind, content.id, entity_id)
                        .await
                    {
                        Ok(()) => report.links_written += 1,
                        Err(e) => {
                            error!(link = %subject, error = %e, "failed to link");
                            report.record_failure(Failure {
                                subject,
                                stage: FailureStage::Link,
                                cause: e.to_string(),
                            });
                        }
                    }
                }
            }

            let done = index + 1;
            if done % every == 0 || done == stored.len() {
                self.progress.report(ProgressEvent::Linking {
                    n: done as u64,
                    total,
                });
            }
        }

        info!(
            items = total,
            links = report.links_written,
            errors = report.link_errors,
            "links written"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::store::memory::InMemoryStore;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.database.url = Some("postgres://unused".into());
        config.source.root = root.to_path_buf();
        config
    }

    fn orchestrator(config: Config, store: InMemoryStore) -> Orchestrator {
        Orchestrator::new(
            config,
            Arc::new(store),
            RunOptions::default(),
            Box::new(NoProgress),
        )
    }

    #[test]
    fn preflight_requires_database_url() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(tmp.path());
        cfg.database.url = None;
        let err = preflight(&cfg, true).unwrap_err();
        assert!(err.to_string().contains("database url is required"));
    }

    #[test]
    fn preflight_requires_source_dir() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp.path().join("missing"));
        assert!(preflight(&cfg, true).is_err());
        assert!(preflight(&cfg, false).is_ok());
    }

    #[tokio::test]
    async fn missing_table_aborts() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(
            config(tmp.path()),
            InMemoryStore::new().without_table("post_categories"),
        );
        let err = orch.run().await.unwrap_err();
        assert_eq!(orch.stage(), Stage::Aborted);
        assert!(err.to_string().contains("post_categories"));
    }

    #[tokio::test]
    async fn empty_tree_reaches_done() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(config(tmp.path()), InMemoryStore::new());
        let report = orch.run().await.unwrap();
        assert_eq!(orch.stage(), Stage::Done);
        assert_eq!(report.discovered, 0);
        assert_eq!(report.error_count(), 0);
    }

    #[tokio::test]
    async fn check_returns_counts() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(config(tmp.path()), InMemoryStore::new());
        assert_eq!(orch.check().await.unwrap(), TableCounts::default());
    }
}
