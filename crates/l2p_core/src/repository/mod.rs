//! Read-only access to data repositories.
//!
//! A repository is a directory holding a registry database
//! (`registry.sqlite3`) and the data products written by pipeline stages.
//! Output repositories usually carry no registry of their own; instead a
//! `_parent` link points back at the repository they were derived from.
//!
//! - [`find_registry`] walks the parent chain to the nearest registry
//! - [`Registry`] queries visits and sensors from that database
//! - [`load_patches`] reads tract/patch grids from the sky-map artifact
//! - [`ParameterExtractor`] bundles the three behind one layout

mod errors;
mod extractor;
mod locator;
mod registry;
mod skymap;

pub use errors::{RepositoryError, RepositoryResult};
pub use extractor::ParameterExtractor;
pub use locator::{find_registry, RepositoryLayout, DEFAULT_PARENT_LINK, DEFAULT_REGISTRY_NAME};
pub use registry::Registry;
pub use skymap::{load_patches, skymap_path, SkyMapFile, TractGrid, DEFAULT_SKYMAP_FILE};
