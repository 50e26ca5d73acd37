//! Level 2 pipeline command-line runner.
//!
//! Usage:
//!   level2-pipeline --image-repo image_repo --output-repo output_repo
//!   level2-pipeline --ingest phosim_output --dry-run
//!   level2-pipeline --stage assembleCoadd
//!
//! Exits 0 once the run completes, even when invocations failed; the failure
//! report is printed at the end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use l2p_core::command::{RunMode, StageRunner};
use l2p_core::config::ConfigManager;
use l2p_core::logging::{
    init_tracing_with_file, EventSink, FanOutSink, LogConfig, RunLogger, TracingSink,
};
use l2p_core::orchestrator::{ingest_images, Level2Pipeline, PipelineConfig};

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config_manager = ConfigManager::new(&cli.config);
    config_manager
        .load_or_create()
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let mut settings = config_manager.into_settings();
    cli.apply(&mut settings);

    let logs_dir = PathBuf::from(&settings.paths.logs_folder);
    let _log_guard = init_tracing_with_file(settings.logging.level, &logs_dir);

    tracing::info!("Level 2 pipeline starting");
    tracing::info!("Config: {}", cli.config.display());
    tracing::info!("Core version: {}", l2p_core::version());

    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Live
    };
    let runner = StageRunner::shell().with_diagnostic_lines(settings.logging.error_tail as usize);

    if let Some(phosim_dir) = &cli.ingest {
        ingest_images(
            phosim_dir,
            &settings.pipeline.ingest_pattern,
            Path::new(&settings.paths.image_repo),
            &settings.pipeline.options,
            &runner,
            mode,
        )
        .with_context(|| format!("ingesting images from {}", phosim_dir.display()))?;
    }

    let run_logger = Arc::new(
        RunLogger::new(run_name(), &logs_dir, LogConfig::from(&settings.logging), None)
            .with_context(|| format!("creating run log in {}", logs_dir.display()))?,
    );
    tracing::info!("Run log: {}", run_logger.log_path().display());

    let sinks: Vec<Arc<dyn EventSink>> = vec![run_logger.clone(), Arc::new(TracingSink)];
    let sink = Arc::new(FanOutSink::new(sinks));

    let mut pipeline = match Level2Pipeline::from_repository(
        PipelineConfig::from_settings(&settings),
        runner,
        sink,
    ) {
        Ok(pipeline) => pipeline,
        Err(e) if mode.is_dry_run() && cli.ingest.is_some() => {
            // A dry-run ingest creates no registry to read visits from.
            tracing::warn!("Cannot plan stages before images are ingested: {}", e);
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("reading visits from {}", settings.paths.image_repo)
            })
        }
    };

    if cli.plan {
        print_plan(&pipeline);
        return Ok(());
    }

    match cli.stage {
        Some(stage) => {
            pipeline.run_stage(stage, mode);
        }
        None => {
            pipeline.run(mode);
        }
    }

    let failures = pipeline.failures();
    if failures.is_empty() {
        println!("No failed executions.");
    } else {
        print!("{}", failures.report());
    }

    run_logger.close();
    Ok(())
}

/// Log file name for this run.
fn run_name() -> String {
    format!("level2_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

fn print_plan(pipeline: &Level2Pipeline) {
    for planned in pipeline.plan() {
        println!("[{}] {}", planned.stage, planned.command);
    }
}
