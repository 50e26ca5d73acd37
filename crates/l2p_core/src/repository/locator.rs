//! Registry lookup along the parent-repository chain.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{RepositoryError, RepositoryResult};
use super::skymap::DEFAULT_SKYMAP_FILE;

/// Registry database file name.
pub const DEFAULT_REGISTRY_NAME: &str = "registry.sqlite3";

/// Subdirectory linking a derived repository to its parent.
pub const DEFAULT_PARENT_LINK: &str = "_parent";

/// Upper bound on parent hops; a cyclic chain of links ends here.
const MAX_PARENT_HOPS: usize = 64;

/// Conventional file names inside a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLayout {
    pub registry_name: String,
    pub parent_link: String,
    pub skymap_file: String,
}

impl Default for RepositoryLayout {
    fn default() -> Self {
        Self {
            registry_name: DEFAULT_REGISTRY_NAME.to_string(),
            parent_link: DEFAULT_PARENT_LINK.to_string(),
            skymap_file: DEFAULT_SKYMAP_FILE.to_string(),
        }
    }
}

impl RepositoryLayout {
    /// Find the nearest registry for `repo` using this layout's names.
    pub fn find_registry(&self, repo: &Path) -> RepositoryResult<PathBuf> {
        locate(repo, &self.registry_name, &self.parent_link)
    }
}

/// Find the registry file for `repo`, following `_parent` links.
///
/// Returns the absolute path of the first `registry_name` found in `repo`
/// or one of its ancestors. Fails with `RegistryNotFound` when the chain
/// ends without one, or when `repo` itself does not exist.
pub fn find_registry(repo: impl AsRef<Path>, registry_name: &str) -> RepositoryResult<PathBuf> {
    locate(repo.as_ref(), registry_name, DEFAULT_PARENT_LINK)
}

fn locate(repo: &Path, registry_name: &str, parent_link: &str) -> RepositoryResult<PathBuf> {
    let not_found = || RepositoryError::registry_not_found(repo, registry_name);

    if !repo.exists() {
        return Err(not_found());
    }

    let mut base = repo.to_path_buf();
    for _ in 0..=MAX_PARENT_HOPS {
        let candidate = base.join(registry_name);
        if candidate.is_file() {
            return fs::canonicalize(&candidate)
                .map_err(|e| RepositoryError::io("resolving registry path", e));
        }

        let parent = base.join(parent_link);
        if !parent.exists() {
            return Err(not_found());
        }
        tracing::trace!(from = %base.display(), "following parent link");
        base = parent;
    }

    Err(not_found())
}
