//! Pipeline stages and the keys their invocations are tracked under.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::band::Band;
use super::params::Sensor;

/// The external processing stages, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    ProcessEimage,
    MakeDiscreteSkyMap,
    MakeCoaddTempExp,
    AssembleCoadd,
    DetectCoaddSources,
    MergeCoaddDetections,
    MeasureCoaddSources,
    MergeCoaddMeasurements,
    ForcedPhotCcd,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 9] = [
        Stage::ProcessEimage,
        Stage::MakeDiscreteSkyMap,
        Stage::MakeCoaddTempExp,
        Stage::AssembleCoadd,
        Stage::DetectCoaddSources,
        Stage::MergeCoaddDetections,
        Stage::MeasureCoaddSources,
        Stage::MergeCoaddMeasurements,
        Stage::ForcedPhotCcd,
    ];

    /// Task name, as used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ProcessEimage => "processEimage",
            Stage::MakeDiscreteSkyMap => "makeDiscreteSkyMap",
            Stage::MakeCoaddTempExp => "makeCoaddTempExp",
            Stage::AssembleCoadd => "assembleCoadd",
            Stage::DetectCoaddSources => "detectCoaddSources",
            Stage::MergeCoaddDetections => "mergeCoaddDetections",
            Stage::MeasureCoaddSources => "measureCoaddSources",
            Stage::MergeCoaddMeasurements => "mergeCoaddMeasurements",
            Stage::ForcedPhotCcd => "forcedPhotCcd",
        }
    }

    /// Executable invoked for this stage.
    pub fn executable(&self) -> String {
        format!("{}.py", self.name())
    }

    /// Whether the stage reads from the image repository rather than the
    /// output repository.
    pub fn reads_image_repo(&self) -> bool {
        matches!(self, Stage::ProcessEimage)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_suffix(".py").unwrap_or(s);
        Stage::ALL
            .iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

/// Identifies one invocation within a stage's fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutKey {
    /// A single visit.
    Visit(i64),
    /// Every visit, as the combined token.
    AllVisits(String),
    /// A single band.
    Band(Band),
    /// One patch of one tract, for one band.
    Patch {
        band: Band,
        tract: i64,
        patch: String,
    },
    /// Every band, as the combined filter token.
    AllBands(String),
    /// A single sensor.
    Sensor(Sensor),
    /// The stage as a whole (it could not be fanned out).
    Stage,
}

impl std::fmt::Display for FanOutKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FanOutKey::Visit(visit) => write!(f, "visit={}", visit),
            FanOutKey::AllVisits(token) => write!(f, "visit={}", token),
            FanOutKey::Band(band) => write!(f, "filter={}", band),
            FanOutKey::Patch { band, tract, patch } => {
                write!(f, "filter={} tract={} patch={}", band, tract, patch)
            }
            FanOutKey::AllBands(token) => write!(f, "filter={}", token),
            FanOutKey::Sensor(sensor) => write!(f, "{}", sensor),
            FanOutKey::Stage => write!(f, "(whole stage)"),
        }
    }
}
