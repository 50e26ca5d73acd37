//! End-to-end runs over an on-disk repository pair with a scripted executor.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use l2p_core::command::{Executor, ProcessOutput, RunMode, StageRunner};
use l2p_core::logging::{MemorySink, PipelineEvent};
use l2p_core::models::{Band, FanOutKey, Stage};
use l2p_core::orchestrator::{Level2Pipeline, PipelineConfig, PipelineError};
use l2p_core::repository::{find_registry, RepositoryError};
use parking_lot::Mutex;
use rusqlite::Connection;
use tempfile::TempDir;

/// Image repository with a registry, plus an output repository linked to it
/// and holding a 2x3 patch sky-map for tract 0.
struct Fixture {
    _dir: TempDir,
    image_repo: PathBuf,
    output_repo: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let image_repo = dir.path().join("image_repo");
        let output_repo = dir.path().join("output_repo");
        fs::create_dir_all(&image_repo).unwrap();
        fs::create_dir_all(output_repo.join("deepCoadd")).unwrap();

        let conn = Connection::open(image_repo.join("registry.sqlite3")).unwrap();
        conn.execute_batch(
            "CREATE TABLE raw_visit (visit INTEGER, filter TEXT);
             CREATE TABLE raw (visit INTEGER, raft TEXT, ccd TEXT);
             INSERT INTO raw_visit VALUES (2, 'g'), (1, 'g'), (3, 'r');
             INSERT INTO raw VALUES (1, '2,2', '1,1'), (2, '2,2', '1,1'), (3, '1,2', '0,0');",
        )
        .unwrap();

        link_parent(&output_repo, &image_repo);
        fs::write(
            output_repo.join("deepCoadd").join("skyMap.json"),
            r#"{"tracts": [{"id": 0, "num_patches": [2, 3]}]}"#,
        )
        .unwrap();

        Self {
            _dir: dir,
            image_repo,
            output_repo,
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new(&self.image_repo, &self.output_repo)
    }

    fn pipeline(&self, executor: Arc<ScriptedExecutor>) -> (Level2Pipeline, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let pipeline =
            Level2Pipeline::from_repository(self.config(), StageRunner::new(executor), sink.clone())
                .unwrap();
        (pipeline, sink)
    }
}

#[cfg(unix)]
fn link_parent(child: &Path, parent: &Path) {
    std::os::unix::fs::symlink(parent, child.join("_parent")).unwrap();
}

#[cfg(not(unix))]
fn link_parent(child: &Path, parent: &Path) {
    let link = child.join("_parent");
    fs::create_dir_all(&link).unwrap();
    fs::copy(parent.join("registry.sqlite3"), link.join("registry.sqlite3")).unwrap();
}

/// Records every command; fails those for which `fails` returns true.
struct ScriptedExecutor {
    fails: Box<dyn Fn(&str) -> bool + Send + Sync>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    fn succeeding() -> Arc<Self> {
        Self::failing_when(|_| false)
    }

    fn failing_when(fails: impl Fn(&str) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            fails: Box::new(fails),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, command_line: &str) -> io::Result<ProcessOutput> {
        self.calls.lock().push(command_line.to_string());
        if (self.fails)(command_line) {
            Ok(ProcessOutput {
                code: Some(1),
                stdout: "working\n".to_string(),
                stderr: "RuntimeError: no data\n".to_string(),
            })
        } else {
            Ok(ProcessOutput {
                code: Some(0),
                ..Default::default()
            })
        }
    }
}

fn count_stage(commands: &[String], stage: Stage) -> usize {
    let prefix = format!("{} ", stage.executable());
    commands.iter().filter(|line| line.starts_with(&prefix)).count()
}

#[test]
fn reads_visits_from_image_registry() {
    let fixture = Fixture::new();
    let (pipeline, _) = fixture.pipeline(ScriptedExecutor::succeeding());

    assert_eq!(pipeline.visits().combined_bands(), "g^r");
    assert_eq!(pipeline.visits().combined_token(), "1^2^3");
}

#[test]
fn dry_run_launches_and_records_nothing() {
    let fixture = Fixture::new();
    let executor = ScriptedExecutor::succeeding();
    let (mut pipeline, sink) = fixture.pipeline(executor.clone());

    assert!(pipeline.run(RunMode::DryRun).is_empty());
    assert!(executor.calls().is_empty());

    let commands = sink.commands();
    assert_eq!(count_stage(&commands, Stage::ProcessEimage), 3);
    assert_eq!(count_stage(&commands, Stage::MakeDiscreteSkyMap), 1);
    assert_eq!(count_stage(&commands, Stage::MakeCoaddTempExp), 2);
    assert_eq!(count_stage(&commands, Stage::AssembleCoadd), 12);
    assert_eq!(count_stage(&commands, Stage::MergeCoaddMeasurements), 1);
    assert_eq!(count_stage(&commands, Stage::ForcedPhotCcd), 2);
    assert_eq!(commands.len(), 24);
}

#[test]
fn assemble_coadd_covers_every_patch_per_band() {
    let fixture = Fixture::new();
    let (pipeline, _) = fixture.pipeline(ScriptedExecutor::succeeding());

    let patches: Vec<(Band, String)> = pipeline
        .plan()
        .into_iter()
        .filter_map(|planned| match planned.key {
            FanOutKey::Patch { band, tract: 0, patch } => Some((band, patch)),
            _ => None,
        })
        .collect();

    let expected: Vec<(Band, String)> = [Band::G, Band::R]
        .into_iter()
        .flat_map(|band| {
            ["0,0", "0,1", "0,2", "1,0", "1,1", "1,2"]
                .into_iter()
                .map(move |patch| (band, patch.to_string()))
        })
        .collect();
    assert_eq!(patches, expected);
}

#[test]
fn single_band_failure_is_one_record() {
    let fixture = Fixture::new();
    let executor = ScriptedExecutor::failing_when(|line| {
        line.starts_with("makeCoaddTempExp.py ") && line.contains(" filter=r ")
    });
    let (mut pipeline, _) = fixture.pipeline(executor);

    let failures = pipeline.run(RunMode::Live);
    assert_eq!(failures.len(), 1);

    let record = &failures.records()[0];
    assert_eq!(record.stage, Stage::MakeCoaddTempExp);
    assert_eq!(record.key, FanOutKey::Band(Band::R));
    assert!(failures
        .report()
        .starts_with("makeCoaddTempExp had 1 failed execution(s):\n  filter=r: exit code 1"));
}

#[test]
fn failing_stage_does_not_halt_the_run() {
    let fixture = Fixture::new();
    let executor =
        ScriptedExecutor::failing_when(|line| line.starts_with("processEimage.py "));
    let (mut pipeline, sink) = fixture.pipeline(executor.clone());

    let failures = pipeline.run(RunMode::Live);
    assert_eq!(failures.count_for(Stage::ProcessEimage), 3);
    assert_eq!(failures.failed_stages(), vec![Stage::ProcessEimage]);

    let calls = executor.calls();
    assert_eq!(count_stage(&calls, Stage::ForcedPhotCcd), 2);

    let finished = sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, PipelineEvent::StageFinished { .. }))
        .count();
    assert_eq!(finished, 9);
}

#[test]
fn dry_run_strings_match_executed_strings() {
    let fixture = Fixture::new();

    let (mut dry, dry_sink) = fixture.pipeline(ScriptedExecutor::succeeding());
    dry.run(RunMode::DryRun);

    let executor = ScriptedExecutor::succeeding();
    let (mut live, _) = fixture.pipeline(executor.clone());
    assert!(live.run(RunMode::Live).is_empty());

    assert_eq!(dry_sink.commands(), executor.calls());
}

#[test]
fn forced_photometry_enumerates_registry_sensors() {
    let fixture = Fixture::new();
    let (pipeline, _) = fixture.pipeline(ScriptedExecutor::succeeding());
    let output = fixture.output_repo.display().to_string();

    let forced: Vec<String> = pipeline
        .plan()
        .into_iter()
        .filter(|planned| planned.stage == Stage::ForcedPhotCcd)
        .map(|planned| planned.command)
        .collect();
    assert_eq!(
        forced,
        vec![
            format!(
                "forcedPhotCcd.py {0}/ --id tract=0 visit=1^2^3 sensor=0,0 raft=1,2 \
                 --output {0} --doraise --clobber-config --clobber-versions",
                output
            ),
            format!(
                "forcedPhotCcd.py {0}/ --id tract=0 visit=1^2^3 sensor=1,1 raft=2,2 \
                 --output {0} --doraise --clobber-config --clobber-versions",
                output
            ),
        ]
    );
}

#[test]
fn missing_skymap_fails_only_its_stage() {
    let fixture = Fixture::new();
    fs::remove_file(fixture.output_repo.join("deepCoadd").join("skyMap.json")).unwrap();
    let executor = ScriptedExecutor::succeeding();
    let (mut pipeline, _) = fixture.pipeline(executor.clone());

    let failures = pipeline.run(RunMode::Live);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures.records()[0].stage, Stage::AssembleCoadd);
    assert_eq!(failures.records()[0].key, FanOutKey::Stage);
    assert_eq!(count_stage(&executor.calls(), Stage::DetectCoaddSources), 1);
}

#[test]
fn missing_image_registry_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path().join("nowhere"), dir.path().join("out"));

    let result = Level2Pipeline::from_repository(
        config,
        StageRunner::new(ScriptedExecutor::succeeding()),
        Arc::new(MemorySink::new()),
    );
    assert!(matches!(
        result,
        Err(PipelineError::Repository(RepositoryError::RegistryNotFound { .. }))
    ));
}

#[test]
fn locator_follows_parent_chain() {
    let fixture = Fixture::new();
    let grandchild = fixture.output_repo.join("rerun");
    fs::create_dir_all(&grandchild).unwrap();
    link_parent(&grandchild, &fixture.output_repo);

    let found = find_registry(&grandchild, "registry.sqlite3").unwrap();
    assert!(found.is_absolute());
    assert!(found.ends_with("registry.sqlite3"));

    let orphan = fixture.output_repo.join("orphan");
    fs::create_dir_all(&orphan).unwrap();
    assert!(matches!(
        find_registry(&orphan, "registry.sqlite3"),
        Err(RepositoryError::RegistryNotFound { .. })
    ));
}
