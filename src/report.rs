//! Run statistics and the end-of-run summary.
//!
//! Counts are collected into a [`RunReport`] as stages finish and rendered to
//! stdout once at the end, after every stage has had its say. `check` uses
//! [`render_counts`] to show what the target tables hold.

use std::fmt::Write as _;

use crate::models::{DocumentOutcome, Failure, FailureStage, TableCounts};

/// Aggregated statistics for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub dry_run: bool,
    /// Documents found by the walker.
    pub discovered: usize,
    pub processed: usize,
    pub skipped: usize,
    /// Documents that failed at any stage.
    pub errored: usize,
    /// Distinct categories accumulated across the corpus.
    pub categories: usize,
    /// Distinct tags accumulated across the corpus.
    pub tags: usize,
    /// Link inserts that succeeded, pairs that already existed included.
    pub links_written: usize,
    pub taxonomy_errors: usize,
    pub link_errors: usize,
    /// Every recoverable failure, in the order it was recorded.
    pub failures: Vec<Failure>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_outcome(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Processed { .. } => self.processed += 1,
            DocumentOutcome::Skipped { .. } => self.skipped += 1,
            DocumentOutcome::Failed(failure) => {
                self.errored += 1;
                self.failures.push(failure);
            }
        }
    }

    /// Record a taxonomy or link failure.
    pub fn record_failure(&mut self, failure: Failure) {
        match failure.stage {
            FailureStage::Taxonomy => self.taxonomy_errors += 1,
            FailureStage::Link => self.link_errors += 1,
            _ => self.errored += 1,
        }
        self.failures.push(failure);
    }

    /// Total recoverable errors across every stage.
    pub fn error_count(&self) -> usize {
        self.errored + self.taxonomy_errors + self.link_errors
    }

    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let title = if self.dry_run {
            "Migration summary (dry run)"
        } else {
            "Migration summary"
        };
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}", "=".repeat(title.len()));
        let _ = writeln!(out);
        let _ = writeln!(out, "  Documents:        {}", self.discovered);
        let _ = writeln!(out, "  Processed:        {}", self.processed);
        let _ = writeln!(out, "  Skipped:          {}", self.skipped);
        let _ = writeln!(out, "  Errors:           {}", self.errored);
        let _ = writeln!(out, "  Categories:       {}", self.categories);
        let _ = writeln!(out, "  Tags:             {}", self.tags);
        let _ = writeln!(out, "  Links written:    {}", self.links_written);
        let _ = writeln!(out, "  Taxonomy errors:  {}", self.taxonomy_errors);
        let _ = writeln!(out, "  Link errors:      {}", self.link_errors);

        if verbose && !self.failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  Error details:");
            for failure in &self.failures {
                let _ = writeln!(
                    out,
                    "  [{}] {}: {}",
                    failure.stage.as_str(),
                    failure.subject,
                    failure.cause
                );
            }
        }
        out
    }

    pub fn print(&self, verbose: bool) {
        println!("{}", self.render(verbose));
    }
}

/// Row counts table printed by `check`.
pub fn render_counts(counts: &TableCounts) -> String {
    let rows = [
        ("posts", counts.posts),
        ("categories", counts.categories),
        ("tags", counts.tags),
        ("post_categories", counts.post_categories),
        ("post_tags", counts.post_tags),
    ];
    let mut out = String::new();
    let _ = writeln!(out, "  {:<18} {:>8}", "TABLE", "ROWS");
    let _ = writeln!(out, "  {}", "-".repeat(27));
    for (table, count) in rows {
        let _ = writeln!(out, "  {:<18} {:>8}", table, count);
    }
    out
}
