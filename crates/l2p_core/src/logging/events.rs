//! Structured pipeline events and the sinks that receive them.
//!
//! The orchestrator never prints or configures logging itself. It emits
//! [`PipelineEvent`]s to an injected [`EventSink`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::command::FailureDetail;
use crate::models::{FanOutKey, Stage};

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    RunStarted {
        dry_run: bool,
        bands: String,
        visits: usize,
    },
    StageStarted {
        stage: Stage,
        /// Zero-based position of the stage in the run.
        index: usize,
        total: usize,
    },
    /// A command is about to run, or would run in a dry run.
    CommandPlanned {
        stage: Stage,
        key: FanOutKey,
        command: String,
        dry_run: bool,
    },
    /// One line of process output.
    OutputLine {
        stage: Stage,
        line: String,
        is_stderr: bool,
    },
    InvocationSucceeded {
        stage: Stage,
        key: FanOutKey,
    },
    InvocationFailed {
        stage: Stage,
        key: FanOutKey,
        detail: FailureDetail,
    },
    /// The stage could not be planned and was not attempted.
    StageSkipped {
        stage: Stage,
        reason: String,
    },
    StageFinished {
        stage: Stage,
        attempted: usize,
        failed: usize,
    },
    RunFinished {
        failures: usize,
    },
}

/// Receives pipeline events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted {
                dry_run,
                bands,
                visits,
            } => {
                tracing::info!(dry_run, bands = %bands, visits, "pipeline run started");
            }
            PipelineEvent::StageStarted {
                stage,
                index,
                total,
            } => {
                tracing::info!(stage = %stage, step = index + 1, total, "stage started");
            }
            PipelineEvent::CommandPlanned {
                stage,
                key,
                command,
                dry_run,
            } => {
                tracing::info!(stage = %stage, key = %key, dry_run, "running:\n  {}", command);
            }
            PipelineEvent::OutputLine {
                stage,
                line,
                is_stderr,
            } => {
                tracing::trace!(stage = %stage, is_stderr, "{}", line);
            }
            PipelineEvent::InvocationSucceeded { stage, key } => {
                tracing::debug!(stage = %stage, key = %key, "invocation succeeded");
            }
            PipelineEvent::InvocationFailed { stage, key, detail } => {
                tracing::error!(stage = %stage, key = %key, "invocation failed: {}", detail);
            }
            PipelineEvent::StageSkipped { stage, reason } => {
                tracing::warn!(stage = %stage, "stage skipped: {}", reason);
            }
            PipelineEvent::StageFinished {
                stage,
                attempted,
                failed,
            } => {
                tracing::info!(stage = %stage, attempted, failed, "stage finished");
            }
            PipelineEvent::RunFinished { failures } => {
                tracing::info!(failures, "pipeline run finished");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events received so far.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Command lines reported so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::CommandPlanned { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &PipelineEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Sends each event to several sinks.
pub struct FanOutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanOutSink {
    fn emit(&self, event: &PipelineEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_collects_commands() {
        let sink = MemorySink::new();
        sink.emit(&PipelineEvent::CommandPlanned {
            stage: Stage::MakeDiscreteSkyMap,
            key: FanOutKey::AllVisits("1^2".to_string()),
            command: "makeDiscreteSkyMap.py out/".to_string(),
            dry_run: true,
        });
        sink.emit(&PipelineEvent::RunFinished { failures: 0 });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.commands(), vec!["makeDiscreteSkyMap.py out/"]);
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn EventSink>> = vec![first.clone(), second.clone(), Arc::new(NullSink)];
        let sink = FanOutSink::new(sinks);

        sink.emit(&PipelineEvent::RunFinished { failures: 2 });

        assert_eq!(first.events(), vec![PipelineEvent::RunFinished { failures: 2 }]);
        assert_eq!(second.events().len(), 1);
    }
}
