//! Run parameter sets derived from repository state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::band::Band;

/// Separator used to join identifiers into a single multi-valued argument.
pub const JOIN_SEPARATOR: &str = "^";

/// Visits grouped by band.
///
/// Bands are kept in `ugrizy` order. A band is present only if it has at
/// least one visit; the visit order within a band is kept as given.
/// There is no way to mutate a set after it is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawVisitSet")]
pub struct VisitSet {
    bands: BTreeMap<Band, Vec<i64>>,
}

/// Serialized form of a [`VisitSet`]; deserializing goes through
/// [`VisitSet::from_pairs`] so empty bands are dropped.
#[derive(Deserialize)]
struct RawVisitSet {
    #[serde(default)]
    bands: BTreeMap<Band, Vec<i64>>,
}

impl From<RawVisitSet> for VisitSet {
    fn from(raw: RawVisitSet) -> Self {
        Self::from_pairs(raw.bands)
    }
}

impl VisitSet {
    /// Build a visit set from (band, visits) pairs, dropping empty bands.
    ///
    /// A band listed twice keeps its last non-empty list.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Band, Vec<i64>)>,
    {
        let bands = pairs
            .into_iter()
            .filter(|(_, visits)| !visits.is_empty())
            .collect();
        Self { bands }
    }

    /// True when no band has any visit.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Number of bands with visits.
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Total number of visits across all bands.
    pub fn visit_count(&self) -> usize {
        self.bands.values().map(Vec::len).sum()
    }

    /// Bands with visits, in iteration order.
    pub fn bands(&self) -> impl Iterator<Item = Band> + '_ {
        self.bands.keys().copied()
    }

    /// Visits recorded for one band.
    pub fn visits(&self, band: Band) -> Option<&[i64]> {
        self.bands.get(&band).map(Vec::as_slice)
    }

    /// (band, visits) pairs in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (Band, &[i64])> + '_ {
        self.bands.iter().map(|(band, visits)| (*band, visits.as_slice()))
    }

    /// Every visit, band by band.
    pub fn all_visits(&self) -> impl Iterator<Item = i64> + '_ {
        self.bands.values().flatten().copied()
    }

    /// The visits of one band joined into a selector token, e.g. `10^11`.
    pub fn band_token(&self, band: Band) -> Option<String> {
        self.visits(band).map(join_ids)
    }

    /// Every visit joined into one token, e.g. `10^11^20`.
    pub fn combined_token(&self) -> String {
        let all: Vec<i64> = self.all_visits().collect();
        join_ids(&all)
    }

    /// The bands present joined into one filter token, e.g. `u^g^r`.
    pub fn combined_bands(&self) -> String {
        self.bands
            .keys()
            .map(Band::as_str)
            .collect::<Vec<_>>()
            .join(JOIN_SEPARATOR)
    }
}

impl FromIterator<(Band, Vec<i64>)> for VisitSet {
    fn from_iter<T: IntoIterator<Item = (Band, Vec<i64>)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR)
}

/// A sensor identified by its raft and ccd, e.g. raft `2,2` sensor `1,1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sensor {
    pub raft: String,
    pub sensor: String,
}

impl Sensor {
    pub fn new(raft: impl Into<String>, sensor: impl Into<String>) -> Self {
        Self {
            raft: raft.into(),
            sensor: sensor.into(),
        }
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "raft={} sensor={}", self.raft, self.sensor)
    }
}

/// The patches of one sky-map tract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TractPatches {
    pub tract: i64,
    /// Patch coordinates formatted `x,y`, x-major.
    pub patches: Vec<String>,
}

impl TractPatches {
    /// Expand an `nx` by `ny` patch grid.
    pub fn from_grid(tract: i64, nx: u32, ny: u32) -> Self {
        let patches = (0..nx)
            .flat_map(|x| (0..ny).map(move |y| format!("{},{}", x, y)))
            .collect();
        Self { tract, patches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VisitSet {
        VisitSet::from_pairs([(Band::G, vec![20]), (Band::U, vec![10, 11])])
    }

    #[test]
    fn combined_token_follows_band_order() {
        assert_eq!(sample().combined_token(), "10^11^20");
    }

    #[test]
    fn band_subsets_preserved_verbatim() {
        let visits = sample();
        assert_eq!(visits.visits(Band::U), Some(&[10, 11][..]));
        assert_eq!(visits.visits(Band::G), Some(&[20][..]));
        assert_eq!(visits.band_token(Band::U).as_deref(), Some("10^11"));
    }

    #[test]
    fn empty_bands_are_omitted() {
        let visits = VisitSet::from_pairs([(Band::R, vec![]), (Band::I, vec![7])]);
        assert_eq!(visits.band_count(), 1);
        assert!(visits.visits(Band::R).is_none());
        assert_eq!(visits.combined_bands(), "i");
    }

    #[test]
    fn deserializing_drops_empty_bands() {
        let visits: VisitSet =
            serde_json::from_str(r#"{"bands":{"u":[],"g":[20]}}"#).unwrap();
        assert_eq!(visits.band_count(), 1);
        assert_eq!(visits.combined_bands(), "g");
        assert!(visits.band_token(Band::U).is_none());

        let json = serde_json::to_string(&visits).unwrap();
        assert_eq!(serde_json::from_str::<VisitSet>(&json).unwrap(), visits);
    }

    #[test]
    fn combined_bands_in_iteration_order() {
        let visits: VisitSet = [(Band::Y, vec![3]), (Band::U, vec![1]), (Band::R, vec![2])]
            .into_iter()
            .collect();
        assert_eq!(visits.combined_bands(), "u^r^y");
        assert_eq!(visits.visit_count(), 3);
    }

    #[test]
    fn grid_expands_x_major() {
        let tract = TractPatches::from_grid(0, 2, 3);
        assert_eq!(
            tract.patches,
            vec!["0,0", "0,1", "0,2", "1,0", "1,1", "1,2"]
        );
    }
}
