//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::Stage;
use crate::repository::{
    RepositoryLayout, DEFAULT_PARENT_LINK, DEFAULT_REGISTRY_NAME, DEFAULT_SKYMAP_FILE,
};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Repository and log locations.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Options shared by every invocation.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Per-stage config overrides.
    #[serde(default)]
    pub stages: StageSettings,
}

/// Repository and log locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Repository holding the ingested images and their registry.
    #[serde(default = "default_image_repo")]
    pub image_repo: String,

    /// Repository the stages write into.
    #[serde(default = "default_output_repo")]
    pub output_repo: String,

    /// Folder for run log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_image_repo() -> String {
    "image_repo".to_string()
}

fn default_output_repo() -> String {
    "output_repo".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            image_repo: default_image_repo(),
            output_repo: default_output_repo(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level written to the run log.
    #[serde(default)]
    pub level: LogLevel,

    /// Keep stage output in the tail buffer only.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of output lines kept for failure diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Prefix run log lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

/// Options shared by every invocation, plus repository naming conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Flags appended to every stage command.
    #[serde(default = "default_options")]
    pub options: String,

    /// Registry database file name.
    #[serde(default = "default_registry_name")]
    pub registry_name: String,

    /// Subdirectory linking a repository to its parent.
    #[serde(default = "default_parent_link")]
    pub parent_link: String,

    /// Sky-map artifact file name under `deepCoadd/`.
    #[serde(default = "default_skymap_file")]
    pub skymap_file: String,

    /// Tract used by stages that do not read the sky-map.
    #[serde(default = "default_tract")]
    pub default_tract: String,

    /// Glob of raw images picked up by ingestion.
    #[serde(default = "default_ingest_pattern")]
    pub ingest_pattern: String,
}

fn default_options() -> String {
    "--doraise --clobber-config --clobber-versions".to_string()
}

fn default_registry_name() -> String {
    DEFAULT_REGISTRY_NAME.to_string()
}

fn default_parent_link() -> String {
    DEFAULT_PARENT_LINK.to_string()
}

fn default_skymap_file() -> String {
    DEFAULT_SKYMAP_FILE.to_string()
}

fn default_tract() -> String {
    "0".to_string()
}

fn default_ingest_pattern() -> String {
    "lsst_*.fits.gz".to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            options: default_options(),
            registry_name: default_registry_name(),
            parent_link: default_parent_link(),
            skymap_file: default_skymap_file(),
            default_tract: default_tract(),
            ingest_pattern: default_ingest_pattern(),
        }
    }
}

impl PipelineSettings {
    /// Repository naming conventions from these settings.
    pub fn layout(&self) -> RepositoryLayout {
        RepositoryLayout {
            registry_name: self.registry_name.clone(),
            parent_link: self.parent_link.clone(),
            skymap_file: self.skymap_file.clone(),
        }
    }
}

/// Config overrides passed to individual stages via `--config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSettings {
    #[serde(default)]
    pub process_eimage: Vec<String>,

    #[serde(default = "default_temp_exp_overrides")]
    pub make_coadd_temp_exp: Vec<String>,

    #[serde(default = "default_assemble_overrides")]
    pub assemble_coadd: Vec<String>,

    #[serde(default)]
    pub forced_phot_ccd: Vec<String>,
}

fn default_temp_exp_overrides() -> Vec<String> {
    vec!["bgSubtracted=True".to_string()]
}

fn default_assemble_overrides() -> Vec<String> {
    vec!["doInterp=True".to_string()]
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            process_eimage: Vec::new(),
            make_coadd_temp_exp: default_temp_exp_overrides(),
            assemble_coadd: default_assemble_overrides(),
            forced_phot_ccd: Vec::new(),
        }
    }
}

impl StageSettings {
    /// Overrides for one stage (empty for stages without any).
    pub fn overrides_for(&self, stage: Stage) -> &[String] {
        match stage {
            Stage::ProcessEimage => &self.process_eimage,
            Stage::MakeCoaddTempExp => &self.make_coadd_temp_exp,
            Stage::AssembleCoadd => &self.assemble_coadd,
            Stage::ForcedPhotCcd => &self.forced_phot_ccd,
            _ => &[],
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Pipeline,
    Stages,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Pipeline,
        ConfigSection::Stages,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Pipeline => "pipeline",
            ConfigSection::Stages => "stages",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "# Repository and log locations",
            ConfigSection::Logging => "# Logging configuration",
            ConfigSection::Pipeline => "# Options appended to every stage invocation",
            ConfigSection::Stages => "# Per-stage --config overrides",
        }
    }
}
