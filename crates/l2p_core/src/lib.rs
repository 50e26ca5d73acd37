//! L2P Core - Level 2 pipeline orchestration
//!
//! Sequences the external image-processing stages over a data repository,
//! fanning each stage out over visits, bands, patches and sensors, and
//! collecting failures without stopping the run. Contains no CLI code; the
//! `level2-pipeline` binary is a thin layer over this crate.

pub mod command;
pub mod config;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod repository;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
