//! Configuration management for the Level 2 pipeline.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//!
//! # Example
//!
//! ```no_run
//! use l2p_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("level2.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Output repo: {}", config.settings().paths.output_repo);
//!
//! config.settings_mut().pipeline.options = "--doraise".to_string();
//! config.update_section(ConfigSection::Pipeline).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, PathSettings, PipelineSettings, Settings, StageSettings,
};
