//! Core types for the pipeline orchestrator.

use std::path::PathBuf;

use serde::Serialize;

use crate::command::Invocation;
use crate::config::{Settings, StageSettings};
use crate::models::{FanOutKey, Stage};
use crate::repository::RepositoryLayout;

/// Everything that stays fixed for the orchestrator's lifetime.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Repository holding the ingested images.
    pub image_repo: PathBuf,
    /// Repository the stages write into.
    pub output_repo: PathBuf,
    /// Flags appended to every invocation.
    pub options: String,
    /// Registry, parent link and sky-map naming.
    pub layout: RepositoryLayout,
    /// Tract used by stages that do not read the sky-map.
    pub default_tract: String,
    /// Per-stage `--config` overrides.
    pub stage_overrides: StageSettings,
}

impl PipelineConfig {
    /// Config with default options, layout and overrides.
    pub fn new(image_repo: impl Into<PathBuf>, output_repo: impl Into<PathBuf>) -> Self {
        Self::from_settings(&Settings::default())
            .with_repos(image_repo.into(), output_repo.into())
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            image_repo: PathBuf::from(&settings.paths.image_repo),
            output_repo: PathBuf::from(&settings.paths.output_repo),
            options: settings.pipeline.options.clone(),
            layout: settings.pipeline.layout(),
            default_tract: settings.pipeline.default_tract.clone(),
            stage_overrides: settings.stages.clone(),
        }
    }

    /// Replace the options string.
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    fn with_repos(mut self, image_repo: PathBuf, output_repo: PathBuf) -> Self {
        self.image_repo = image_repo;
        self.output_repo = output_repo;
        self
    }
}

/// One invocation a run would perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedInvocation {
    pub stage: Stage,
    pub key: FanOutKey,
    pub command: String,
}

/// A fan-out unit ready to hand to the runner.
#[derive(Debug, Clone)]
pub(crate) struct WorkUnit {
    pub stage: Stage,
    pub key: FanOutKey,
    pub invocation: Invocation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_default_pipeline_settings() {
        let config = PipelineConfig::new("images", "out");
        assert_eq!(config.image_repo, PathBuf::from("images"));
        assert_eq!(config.output_repo, PathBuf::from("out"));
        assert_eq!(config.options, "--doraise --clobber-config --clobber-versions");
        assert_eq!(config.default_tract, "0");
        assert_eq!(config.layout, RepositoryLayout::default());
    }

    #[test]
    fn from_settings_copies_paths() {
        let mut settings = Settings::default();
        settings.paths.output_repo = "/data/out".to_string();
        settings.pipeline.default_tract = "7".to_string();

        let config = PipelineConfig::from_settings(&settings).with_options("--doraise");
        assert_eq!(config.output_repo, PathBuf::from("/data/out"));
        assert_eq!(config.default_tract, "7");
        assert_eq!(config.options, "--doraise");
    }
}
