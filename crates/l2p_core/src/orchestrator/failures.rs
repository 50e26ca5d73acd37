//! Failure accumulation and reporting.
//!
//! The log is a flat list of records in the order they happened. Grouping
//! by stage is done on demand.

use std::fmt::Write as _;

use serde::Serialize;

use crate::command::FailureDetail;
use crate::models::{FanOutKey, Stage};

/// One failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub key: FanOutKey,
    pub detail: FailureDetail,
}

/// Failures of one stage, in the order they were recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailures<'a> {
    pub stage: Stage,
    pub records: Vec<&'a FailureRecord>,
}

/// Failures recorded during the most recent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureLog {
    records: Vec<FailureRecord>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, stage: Stage, key: FanOutKey, detail: FailureDetail) {
        self.records.push(FailureRecord { stage, key, detail });
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of failed invocations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    /// Records belonging to `stage`.
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &FailureRecord> + '_ {
        self.records.iter().filter(move |record| record.stage == stage)
    }

    pub fn count_for(&self, stage: Stage) -> usize {
        self.for_stage(stage).count()
    }

    /// Stages with at least one failure, in execution order.
    pub fn failed_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .iter()
            .copied()
            .filter(|stage| self.count_for(*stage) > 0)
            .collect()
    }

    /// Records grouped by stage, in execution order.
    pub fn by_stage(&self) -> Vec<StageFailures<'_>> {
        self.failed_stages()
            .into_iter()
            .map(|stage| StageFailures {
                stage,
                records: self.for_stage(stage).collect(),
            })
            .collect()
    }

    /// Human-readable report. Empty when nothing failed.
    ///
    /// ```text
    /// makeCoaddTempExp had 1 failed execution(s):
    ///   filter=r: exit code 1: RuntimeError
    /// ```
    pub fn report(&self) -> String {
        let mut out = String::new();
        for group in self.by_stage() {
            let _ = writeln!(
                out,
                "{} had {} failed execution(s):",
                group.stage,
                group.records.len()
            );
            for record in group.records {
                let _ = writeln!(out, "  {}: {}", record.key, record.detail);
            }
        }
        out
    }
}

impl std::fmt::Display for FailureLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Band;

    fn exit(code: i32, diagnostic: &str) -> FailureDetail {
        FailureDetail::Exit {
            code: Some(code),
            diagnostic: diagnostic.to_string(),
        }
    }

    fn sample() -> FailureLog {
        let mut log = FailureLog::new();
        log.record(Stage::ForcedPhotCcd, FanOutKey::Stage, FailureDetail::prerequisite("no registry"));
        log.record(Stage::MakeCoaddTempExp, FanOutKey::Band(Band::R), exit(1, "boom"));
        log.record(Stage::MakeCoaddTempExp, FanOutKey::Band(Band::I), exit(2, ""));
        log
    }

    #[test]
    fn groups_in_stage_order() {
        let log = sample();
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.failed_stages(),
            vec![Stage::MakeCoaddTempExp, Stage::ForcedPhotCcd]
        );

        let groups = log.by_stage();
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[0].records[0].key, FanOutKey::Band(Band::R));
    }

    #[test]
    fn report_lists_each_key() {
        let report = sample().report();
        assert_eq!(
            report,
            "makeCoaddTempExp had 2 failed execution(s):\n\
             \x20 filter=r: exit code 1: boom\n\
             \x20 filter=i: exit code 2\n\
             forcedPhotCcd had 1 failed execution(s):\n\
             \x20 (whole stage): prerequisite missing: no registry\n"
        );
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = sample();
        log.clear();
        assert!(log.is_empty());
        assert!(log.report().is_empty());
        assert_eq!(log.count_for(Stage::MakeCoaddTempExp), 0);
    }
}
