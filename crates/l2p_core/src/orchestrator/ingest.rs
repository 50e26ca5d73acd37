//! Raw image ingestion into the image repository.

use std::path::Path;

use super::errors::{PipelineError, PipelineResult};
use crate::command::{ingest_invocation, RunMode, RunOutcome, StageRunner};

/// Link simulated raw images matching `pattern` under `phosim_dir` into
/// `image_repo`, creating its registry.
///
/// Runs through the same runner as the stages, so dry runs only report the
/// command. Unlike a stage failure, a failed ingestion is an error: there
/// is nothing for the pipeline to process without it.
pub fn ingest_images(
    phosim_dir: &Path,
    pattern: &str,
    image_repo: &Path,
    options: &str,
    runner: &StageRunner,
    mode: RunMode,
) -> PipelineResult<()> {
    let invocation = ingest_invocation(phosim_dir, pattern, image_repo, options);
    tracing::info!(dry_run = mode.is_dry_run(), "ingesting images:\n  {}", invocation);

    match runner.run(&invocation, mode) {
        RunOutcome::Planned => Ok(()),
        RunOutcome::Succeeded(output) => {
            tracing::debug!(stdout = %output.stdout.trim_end(), "ingestion finished");
            Ok(())
        }
        RunOutcome::Failed { detail, .. } => {
            tracing::error!("ingestion failed: {}", detail);
            Err(PipelineError::ingest_failed(detail))
        }
    }
}
