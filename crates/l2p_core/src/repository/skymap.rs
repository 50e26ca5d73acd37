//! Sky-map artifact reader.
//!
//! The sky-map is written by the sky-map construction stage under
//! `<repo>/deepCoadd/`. It lists each tract with the dimensions of its
//! patch grid:
//!
//! ```json
//! { "tracts": [ { "id": 0, "num_patches": [2, 3] } ] }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{RepositoryError, RepositoryResult};
use crate::models::TractPatches;

/// Sky-map file name inside the coadd directory.
pub const DEFAULT_SKYMAP_FILE: &str = "skyMap.json";

/// Directory holding coadd products, relative to the repository root.
const COADD_DIR: &str = "deepCoadd";

/// Largest patch grid accepted for a single tract.
const MAX_PATCHES_PER_TRACT: u64 = 10_000;

/// On-disk sky-map document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkyMapFile {
    #[serde(default)]
    pub tracts: Vec<TractGrid>,
}

/// One tract and the size of its patch grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TractGrid {
    pub id: i64,
    /// Number of patches along x and y.
    pub num_patches: [u32; 2],
}

impl TractGrid {
    /// Total number of patches in the grid.
    pub fn patch_count(&self) -> u64 {
        u64::from(self.num_patches[0]) * u64::from(self.num_patches[1])
    }
}

/// Path of the sky-map artifact for `repo`.
pub fn skymap_path(repo: &Path, skymap_file: &str) -> PathBuf {
    repo.join(COADD_DIR).join(skymap_file)
}

/// Read tract/patch pairs from the sky-map in `repo`.
///
/// Tracts are returned sorted by id. Fails with `ArtifactNotFound` when the
/// sky-map stage has not produced the file yet.
pub fn load_patches(repo: &Path, skymap_file: &str) -> RepositoryResult<Vec<TractPatches>> {
    let path = skymap_path(repo, skymap_file);

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RepositoryError::artifact_not_found(path));
        }
        Err(e) => return Err(RepositoryError::io("reading sky-map", e)),
    };

    let skymap: SkyMapFile = serde_json::from_str(&content)
        .map_err(|e| RepositoryError::artifact_invalid(&path, e.to_string()))?;

    if let Some(tract) = skymap.tracts.iter().find(|t| t.patch_count() > MAX_PATCHES_PER_TRACT) {
        return Err(RepositoryError::artifact_invalid(
            &path,
            format!(
                "tract {} has {}x{} patches, more than {}",
                tract.id, tract.num_patches[0], tract.num_patches[1], MAX_PATCHES_PER_TRACT
            ),
        ));
    }

    let mut tracts: Vec<TractPatches> = skymap
        .tracts
        .iter()
        .map(|t| TractPatches::from_grid(t.id, t.num_patches[0], t.num_patches[1]))
        .collect();
    tracts.sort_by_key(|t| t.tract);

    Ok(tracts)
}
