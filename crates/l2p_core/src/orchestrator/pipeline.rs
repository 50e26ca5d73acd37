//! The Level 2 pipeline: runs the stage table in order.

use std::sync::Arc;

use super::errors::PipelineResult;
use super::failures::FailureLog;
use super::stages::{spec_for, FanOut, StageSpec, STAGES};
use super::types::{PipelineConfig, PlannedInvocation, WorkUnit};
use crate::command::{CommandBuilder, DataIds, FailureDetail, ProcessOutput, RunMode, RunOutcome, StageRunner};
use crate::logging::{EventSink, PipelineEvent};
use crate::models::{FanOutKey, Stage, VisitSet};
use crate::repository::{ParameterExtractor, RepositoryResult};

/// Sequences the nine processing stages over one pair of repositories.
///
/// The visit set is read once at construction. Patches and sensors are
/// read from the output repository when their stage runs, since earlier
/// stages create them. A failed invocation is recorded and the run moves
/// on; nothing short of a missing image registry stops it.
pub struct Level2Pipeline {
    config: PipelineConfig,
    visits: VisitSet,
    extractor: ParameterExtractor,
    runner: StageRunner,
    sink: Arc<dyn EventSink>,
    failures: FailureLog,
}

impl Level2Pipeline {
    /// Create a pipeline over an already known visit set.
    pub fn new(
        config: PipelineConfig,
        visits: VisitSet,
        runner: StageRunner,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let extractor = ParameterExtractor::new(config.layout.clone());
        Self {
            config,
            visits,
            extractor,
            runner,
            sink,
            failures: FailureLog::new(),
        }
    }

    /// Create a pipeline, reading the visit set from the image repository.
    ///
    /// Fails when no registry can be reached from the image repository.
    pub fn from_repository(
        config: PipelineConfig,
        runner: StageRunner,
        sink: Arc<dyn EventSink>,
    ) -> PipelineResult<Self> {
        let extractor = ParameterExtractor::new(config.layout.clone());
        let visits = extractor.visits(&config.image_repo)?;
        tracing::info!(
            image_repo = %config.image_repo.display(),
            bands = %visits.combined_bands(),
            visits = visits.visit_count(),
            "pipeline configured"
        );
        Ok(Self::new(config, visits, runner, sink))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn visits(&self) -> &VisitSet {
        &self.visits
    }

    /// Failures of the most recent run.
    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Run every stage in order.
    ///
    /// The failure log is cleared first, so afterwards it describes this run
    /// only. In dry-run mode nothing is executed and nothing is recorded.
    pub fn run(&mut self, mode: RunMode) -> &FailureLog {
        self.failures.clear();
        self.sink.emit(&PipelineEvent::RunStarted {
            dry_run: mode.is_dry_run(),
            bands: self.visits.combined_bands(),
            visits: self.visits.visit_count(),
        });

        for (index, spec) in STAGES.iter().enumerate() {
            self.execute_stage(index, spec, mode);
        }

        self.sink.emit(&PipelineEvent::RunFinished {
            failures: self.failures.len(),
        });
        &self.failures
    }

    /// Run one stage, appending its failures to the log.
    ///
    /// Returns the number of failures this call recorded.
    pub fn run_stage(&mut self, stage: Stage, mode: RunMode) -> usize {
        let (index, spec) = spec_for(stage);
        self.execute_stage(index, spec, mode)
    }

    /// Every invocation a full dry run would report, in order.
    ///
    /// Stages that cannot be planned yet contribute nothing.
    pub fn plan(&self) -> Vec<PlannedInvocation> {
        STAGES
            .iter()
            .filter_map(|spec| self.expand(spec).ok())
            .flatten()
            .map(|unit| PlannedInvocation {
                stage: unit.stage,
                key: unit.key,
                command: unit.invocation.command_line(),
            })
            .collect()
    }

    fn execute_stage(&mut self, index: usize, spec: &StageSpec, mode: RunMode) -> usize {
        let stage = spec.stage;
        self.sink.emit(&PipelineEvent::StageStarted {
            stage,
            index,
            total: STAGES.len(),
        });

        let units = match self.expand(spec) {
            Ok(units) => units,
            Err(e) => return self.prerequisite_missing(stage, e.to_string(), mode),
        };

        if units.is_empty() {
            self.sink.emit(&PipelineEvent::StageSkipped {
                stage,
                reason: "no fan-out parameters".to_string(),
            });
            self.finish_stage(stage, 0, 0);
            return 0;
        }

        let mut failed = 0;
        for unit in &units {
            self.sink.emit(&PipelineEvent::CommandPlanned {
                stage,
                key: unit.key.clone(),
                command: unit.invocation.command_line(),
                dry_run: mode.is_dry_run(),
            });

            match self.runner.run(&unit.invocation, mode) {
                RunOutcome::Planned => {}
                RunOutcome::Succeeded(output) => {
                    self.emit_output(stage, &output);
                    self.sink.emit(&PipelineEvent::InvocationSucceeded {
                        stage,
                        key: unit.key.clone(),
                    });
                }
                RunOutcome::Failed { detail, output } => {
                    self.emit_output(stage, &output);
                    self.sink.emit(&PipelineEvent::InvocationFailed {
                        stage,
                        key: unit.key.clone(),
                        detail: detail.clone(),
                    });
                    self.failures.record(stage, unit.key.clone(), detail);
                    failed += 1;
                }
            }
        }

        self.finish_stage(stage, units.len(), failed);
        failed
    }

    /// A stage whose parameters could not be read. Recorded against the
    /// whole stage in live mode, only reported in a dry run.
    fn prerequisite_missing(&mut self, stage: Stage, reason: String, mode: RunMode) -> usize {
        if mode.is_dry_run() {
            self.sink.emit(&PipelineEvent::StageSkipped { stage, reason });
            self.finish_stage(stage, 0, 0);
            return 0;
        }

        let detail = FailureDetail::prerequisite(reason);
        self.sink.emit(&PipelineEvent::InvocationFailed {
            stage,
            key: FanOutKey::Stage,
            detail: detail.clone(),
        });
        self.failures.record(stage, FanOutKey::Stage, detail);
        self.finish_stage(stage, 0, 1);
        1
    }

    fn finish_stage(&self, stage: Stage, attempted: usize, failed: usize) {
        self.sink.emit(&PipelineEvent::StageFinished {
            stage,
            attempted,
            failed,
        });
    }

    fn emit_output(&self, stage: Stage, output: &ProcessOutput) {
        let stdout = output.stdout.lines().map(|line| (line, false));
        let stderr = output.stderr.lines().map(|line| (line, true));
        for (line, is_stderr) in stdout.chain(stderr) {
            self.sink.emit(&PipelineEvent::OutputLine {
                stage,
                line: line.to_string(),
                is_stderr,
            });
        }
    }

    /// Fan a stage out into work units.
    fn expand(&self, spec: &StageSpec) -> RepositoryResult<Vec<WorkUnit>> {
        if self.visits.is_empty() {
            return Ok(Vec::new());
        }

        let stage = spec.stage;
        let builder = CommandBuilder::new(
            &self.config.image_repo,
            &self.config.output_repo,
            &self.config.options,
            &self.config.stage_overrides,
        );
        let tract = self.config.default_tract.as_str();
        let unit = |key: FanOutKey, ids: DataIds| WorkUnit {
            stage,
            key,
            invocation: builder.build(stage, &ids),
        };

        let units = match spec.fan_out {
            FanOut::PerVisit => self
                .visits
                .all_visits()
                .map(|visit| unit(FanOutKey::Visit(visit), DataIds::new().id("visit", visit)))
                .collect(),
            FanOut::AllVisits => {
                let token = self.visits.combined_token();
                let ids = DataIds::new().id("visit", &token);
                vec![unit(FanOutKey::AllVisits(token), ids)]
            }
            FanOut::PerBand => self
                .visits
                .bands()
                .filter_map(|band| {
                    let selected = self.visits.band_token(band)?;
                    let ids = DataIds::new()
                        .select("visit", selected)
                        .id("filter", band)
                        .id("tract", tract);
                    Some(unit(FanOutKey::Band(band), ids))
                })
                .collect(),
            FanOut::PerBandPatch => {
                let tracts = self.extractor.patches(&self.config.output_repo)?;
                let mut units = Vec::new();
                for band in self.visits.bands() {
                    let Some(selected) = self.visits.band_token(band) else {
                        continue;
                    };
                    for tract in &tracts {
                        for patch in &tract.patches {
                            let ids = DataIds::new()
                                .select("visit", &selected)
                                .id("filter", band)
                                .id("patch", patch)
                                .id("tract", tract.tract);
                            let key = FanOutKey::Patch {
                                band,
                                tract: tract.tract,
                                patch: patch.clone(),
                            };
                            units.push(unit(key, ids));
                        }
                    }
                }
                units
            }
            FanOut::AllBands => {
                let bands = self.visits.combined_bands();
                let ids = DataIds::new().id("filter", &bands).id("tract", tract);
                vec![unit(FanOutKey::AllBands(bands), ids)]
            }
            FanOut::PerSensor => {
                let sensors = self.extractor.sensors(&self.config.output_repo)?;
                let visits = self.visits.combined_token();
                sensors
                    .into_iter()
                    .map(|sensor| {
                        let ids = DataIds::new()
                            .id("tract", tract)
                            .id("visit", &visits)
                            .id("sensor", &sensor.sensor)
                            .id("raft", &sensor.raft);
                        unit(FanOutKey::Sensor(sensor), ids)
                    })
                    .collect()
            }
        };

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Executor;
    use crate::logging::MemorySink;
    use crate::models::Band;
    use parking_lot::Mutex;
    use std::io;

    /// Succeeds for every command except those containing `fail_on`.
    #[derive(Default)]
    struct ScriptedExecutor {
        fail_on: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn failing_on(pattern: &str) -> Self {
            Self {
                fail_on: Some(pattern.to_string()),
                ..Default::default()
            }
        }
    }

    impl Executor for ScriptedExecutor {
        fn execute(&self, command_line: &str) -> io::Result<ProcessOutput> {
            self.calls.lock().push(command_line.to_string());
            let fails = self
                .fail_on
                .as_deref()
                .is_some_and(|pattern| command_line.contains(pattern));
            Ok(ProcessOutput {
                code: Some(if fails { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if fails { "boom".to_string() } else { String::new() },
            })
        }
    }

    fn visits() -> VisitSet {
        VisitSet::from_pairs([(Band::U, vec![10, 11]), (Band::G, vec![20])])
    }

    fn pipeline(
        visits: VisitSet,
        executor: Arc<ScriptedExecutor>,
    ) -> (Level2Pipeline, Arc<MemorySink>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path().join("images"), dir.path().join("out"));
        let sink = Arc::new(MemorySink::new());
        let pipeline = Level2Pipeline::new(config, visits, StageRunner::new(executor), sink.clone());
        (pipeline, sink, dir)
    }

    #[test]
    fn dry_run_reports_without_launching() {
        let executor = Arc::new(ScriptedExecutor::default());
        let (mut pipeline, sink, _dir) = pipeline(visits(), executor.clone());

        let failures = pipeline.run(RunMode::DryRun);
        assert!(failures.is_empty());
        assert!(executor.calls.lock().is_empty());

        // 3 visits + 1 sky-map + 2 bands + 4 all-band stages; the patch and
        // sensor stages have nothing to read yet.
        assert_eq!(sink.commands().len(), 10);
        let skipped = sink
            .events()
            .into_iter()
            .filter(|event| matches!(event, PipelineEvent::StageSkipped { .. }))
            .count();
        assert_eq!(skipped, 2);
    }

    #[test]
    fn missing_prerequisites_are_stage_failures() {
        let executor = Arc::new(ScriptedExecutor::default());
        let (mut pipeline, _sink, _dir) = pipeline(visits(), executor.clone());

        let failures = pipeline.run(RunMode::Live);
        assert_eq!(failures.failed_stages(), vec![Stage::AssembleCoadd, Stage::ForcedPhotCcd]);
        assert!(failures.records().iter().all(|record| record.key == FanOutKey::Stage));
        assert_eq!(executor.calls.lock().len(), 10);
    }

    #[test]
    fn failure_does_not_halt_later_stages() {
        let executor = Arc::new(ScriptedExecutor::failing_on("makeDiscreteSkyMap.py"));
        let (mut pipeline, sink, _dir) = pipeline(visits(), executor.clone());

        let failures = pipeline.run(RunMode::Live);
        assert_eq!(failures.count_for(Stage::MakeDiscreteSkyMap), 1);

        let calls = executor.calls.lock();
        assert!(calls.last().is_some_and(|line| line.starts_with("mergeCoaddMeasurements.py")));
        assert_eq!(
            *calls,
            sink.commands(),
            "live commands match reported commands"
        );
    }

    #[test]
    fn each_run_starts_with_an_empty_log() {
        let executor = Arc::new(ScriptedExecutor::failing_on("processEimage.py"));
        let (mut pipeline, _sink, _dir) = pipeline(visits(), executor);

        let first = pipeline.run(RunMode::Live).len();
        let second = pipeline.run(RunMode::Live).len();
        assert_eq!(first, second);
        assert_eq!(pipeline.failures().count_for(Stage::ProcessEimage), 3);

        assert!(pipeline.run(RunMode::DryRun).is_empty());
    }

    #[test]
    fn run_stage_appends_to_the_log() {
        let executor = Arc::new(ScriptedExecutor::failing_on("filter=u"));
        let (mut pipeline, _sink, _dir) = pipeline(visits(), executor);

        assert_eq!(pipeline.run_stage(Stage::MakeCoaddTempExp, RunMode::Live), 1);
        assert_eq!(pipeline.run_stage(Stage::MakeCoaddTempExp, RunMode::Live), 1);
        assert_eq!(pipeline.failures().len(), 2);
        assert_eq!(
            pipeline.failures().records()[0].key,
            FanOutKey::Band(Band::U)
        );
    }

    #[test]
    fn empty_visit_set_launches_nothing() {
        let executor = Arc::new(ScriptedExecutor::default());
        let (mut pipeline, sink, _dir) = pipeline(VisitSet::default(), executor.clone());

        assert!(pipeline.run(RunMode::Live).is_empty());
        assert!(executor.calls.lock().is_empty());
        assert!(sink.commands().is_empty());
        assert!(pipeline.plan().is_empty());
    }

    #[test]
    fn plan_matches_dry_run() {
        let executor = Arc::new(ScriptedExecutor::default());
        let (mut pipeline, sink, _dir) = pipeline(visits(), executor);

        let planned: Vec<String> = pipeline.plan().into_iter().map(|p| p.command).collect();
        pipeline.run(RunMode::DryRun);
        assert_eq!(planned, sink.commands());
        assert!(planned[0].starts_with("processEimage.py "));
        assert!(planned[0].contains("--id visit=10 "));
    }
}
