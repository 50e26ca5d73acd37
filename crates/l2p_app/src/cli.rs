//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use l2p_core::config::Settings;
use l2p_core::logging::LogLevel;
use l2p_core::models::Stage;

#[derive(Parser, Debug)]
#[command(name = "level2-pipeline")]
#[command(about = "Run the Level 2 processing stages over an image repository")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Settings file (created with defaults when missing)
    #[arg(short, long, default_value = "level2.toml")]
    pub config: PathBuf,

    /// Repository holding the ingested images and their registry
    #[arg(long)]
    pub image_repo: Option<PathBuf>,

    /// Repository the stages write into
    #[arg(long)]
    pub output_repo: Option<PathBuf>,

    /// Flags appended to every stage command
    #[arg(long, allow_hyphen_values = true)]
    pub options: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    /// Report commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Ingest simulated images from this directory before running
    #[arg(long, value_name = "PHOSIM_DIR")]
    pub ingest: Option<PathBuf>,

    /// Run only this stage
    #[arg(long, value_name = "STAGE")]
    pub stage: Option<Stage>,

    /// Print the planned commands and exit
    #[arg(long)]
    pub plan: bool,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(repo) = &self.image_repo {
            settings.paths.image_repo = repo.to_string_lossy().into_owned();
        }
        if let Some(repo) = &self.output_repo {
            settings.paths.output_repo = repo.to_string_lossy().into_owned();
        }
        if let Some(options) = &self.options {
            settings.pipeline.options = options.clone();
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
    }
}
