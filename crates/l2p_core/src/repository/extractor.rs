//! Run parameters derived from repository state.

use std::path::Path;

use super::errors::RepositoryResult;
use super::locator::RepositoryLayout;
use super::registry::Registry;
use super::skymap::load_patches;
use crate::models::{Sensor, TractPatches, VisitSet};

/// Derives visits, sensors and tract/patch pairs from a repository.
///
/// Every call goes back to disk; nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct ParameterExtractor {
    layout: RepositoryLayout,
}

impl ParameterExtractor {
    pub fn new(layout: RepositoryLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RepositoryLayout {
        &self.layout
    }

    /// Visits per band recorded in the registry serving `repo`.
    pub fn visits(&self, repo: &Path) -> RepositoryResult<VisitSet> {
        let visits = Registry::open(repo, &self.layout)?.visits()?;
        tracing::debug!(
            repo = %repo.display(),
            bands = %visits.combined_bands(),
            visits = visits.visit_count(),
            "extracted visits"
        );
        Ok(visits)
    }

    /// Distinct sensors recorded in the registry serving `repo`.
    pub fn sensors(&self, repo: &Path) -> RepositoryResult<Vec<Sensor>> {
        Registry::open(repo, &self.layout)?.sensors()
    }

    /// Tract/patch pairs from the sky-map artifact in `repo`.
    pub fn patches(&self, repo: &Path) -> RepositoryResult<Vec<TractPatches>> {
        load_patches(repo, &self.layout.skymap_file)
    }
}
