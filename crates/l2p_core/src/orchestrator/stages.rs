//! The declarative stage table.
//!
//! Execution order and fan-out rules live here as data; the pipeline runs
//! every entry through the same routine.

use crate::models::Stage;

/// How a stage is split into invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// One invocation per visit, across all bands.
    PerVisit,
    /// One invocation over the combined-visit token.
    AllVisits,
    /// One invocation per band, selecting that band's visits.
    PerBand,
    /// One invocation per band and sky-map patch.
    PerBandPatch,
    /// One invocation over the combined-band identifier.
    AllBands,
    /// One invocation per (raft, sensor) from the registry.
    PerSensor,
}

/// One row of the stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub stage: Stage,
    pub fan_out: FanOut,
}

impl StageSpec {
    const fn new(stage: Stage, fan_out: FanOut) -> Self {
        Self { stage, fan_out }
    }
}

/// All stages, in execution order.
pub static STAGES: [StageSpec; 9] = [
    StageSpec::new(Stage::ProcessEimage, FanOut::PerVisit),
    StageSpec::new(Stage::MakeDiscreteSkyMap, FanOut::AllVisits),
    StageSpec::new(Stage::MakeCoaddTempExp, FanOut::PerBand),
    StageSpec::new(Stage::AssembleCoadd, FanOut::PerBandPatch),
    StageSpec::new(Stage::DetectCoaddSources, FanOut::AllBands),
    StageSpec::new(Stage::MergeCoaddDetections, FanOut::AllBands),
    StageSpec::new(Stage::MeasureCoaddSources, FanOut::AllBands),
    StageSpec::new(Stage::MergeCoaddMeasurements, FanOut::AllBands),
    StageSpec::new(Stage::ForcedPhotCcd, FanOut::PerSensor),
];

/// Position and table entry for `stage`.
///
/// The table is declared in the same order as [`Stage`].
pub fn spec_for(stage: Stage) -> (usize, &'static StageSpec) {
    let index = stage as usize;
    (index, &STAGES[index])
}
