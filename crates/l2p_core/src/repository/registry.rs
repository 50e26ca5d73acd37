//! Registry database queries.
//!
//! The registry is opened read-only. Rows come back in whatever order
//! SQLite chooses, so every query result is sorted before it is returned
//! to keep command lines reproducible.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};

use super::errors::RepositoryResult;
use super::locator::RepositoryLayout;
use crate::models::{Band, Sensor, VisitSet};

/// An open, read-only registry database.
pub struct Registry {
    path: PathBuf,
    conn: Connection,
}

impl Registry {
    /// Locate and open the registry serving `repo`.
    pub fn open(repo: &Path, layout: &RepositoryLayout) -> RepositoryResult<Self> {
        let path = layout.find_registry(repo)?;
        Self::open_file(path)
    }

    /// Open a registry file directly.
    pub fn open_file(path: impl Into<PathBuf>) -> RepositoryResult<Self> {
        let path = path.into();
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        tracing::debug!(registry = %path.display(), "opened registry");
        Ok(Self { path, conn })
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Visits per band from the `raw_visit` table.
    ///
    /// Visits are sorted and de-duplicated within each band; bands with no
    /// visits are left out.
    pub fn visits(&self) -> RepositoryResult<VisitSet> {
        let mut stmt = self
            .conn
            .prepare("SELECT visit FROM raw_visit WHERE filter = ?1")?;

        let mut pairs = Vec::with_capacity(Band::ALL.len());
        for band in Band::ALL {
            let mut visits = stmt
                .query_map(params![band.as_str()], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            visits.sort_unstable();
            visits.dedup();
            pairs.push((band, visits));
        }

        Ok(VisitSet::from_pairs(pairs))
    }

    /// Distinct (raft, ccd) pairs from the `raw` table, sorted.
    pub fn sensors(&self) -> RepositoryResult<Vec<Sensor>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT raft, ccd FROM raw")?;
        let mut sensors = stmt
            .query_map([], |row| {
                Ok(Sensor::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        sensors.sort();
        Ok(sensors)
    }
}
