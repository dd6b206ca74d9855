//! Batched concurrent document loading.
//!
//! The document list is split into chunks of `batch_size`. Every document in
//! a chunk gets its own spawned task, and all of a chunk's tasks (store
//! writes included) are awaited before the next chunk is spawned. Within a
//! chunk, completion order is unspecified.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::ingest::{process_document, IngestContext};
use crate::models::{DocumentOutcome, Failure, FailureStage};
use crate::progress::{ProgressEvent, ProgressReporter};

/// Run every document through the per-document pipeline.
///
/// Returns one outcome per input path, in input order. A task that panics
/// is recorded as a [`FailureStage::Task`] failure against its path.
pub async fn load_documents(
    ctx: Arc<IngestContext>,
    paths: &[PathBuf],
    batch_size: usize,
    progress: &dyn ProgressReporter,
) -> Vec<DocumentOutcome> {
    let total = paths.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, chunk) in paths.chunks(batch_size.max(1)).enumerate() {
        let mut handles = Vec::with_capacity(chunk.len());
        for path in chunk {
            let ctx = ctx.clone();
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                process_document(&ctx, &path).await
            }));
        }

        // Barrier: the whole chunk settles before the next one starts.
        for (path, handle) in chunk.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "document task aborted");
                    DocumentOutcome::Failed(Failure {
                        subject: path.display().to_string(),
                        stage: FailureStage::Task,
                        cause: e.to_string(),
                    })
                }
            };
            outcomes.push(outcome);
        }

        let done = outcomes.len();
        info!(batch = index + 1, "Processed {}/{} files", done, total);
        progress.report(ProgressEvent::Loading {
            n: done as u64,
            total: total as u64,
        });
    }

    outcomes
}
