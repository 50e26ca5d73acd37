//! Per-run logger with file and callback output.
//!
//! Each pipeline run gets its own logger that:
//! - Writes to a dedicated log file
//! - Sends messages to a callback (if provided)
//! - In compact mode keeps process output only in a tail buffer
//! - Replays the tail buffer when an invocation fails

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::events::{EventSink, PipelineEvent};
use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

/// Per-run logger with dual output (file + callback).
pub struct RunLogger {
    /// Run name for identification.
    run_name: String,
    /// Path to log file.
    log_path: PathBuf,
    /// File writer (buffered).
    file_writer: Mutex<Option<BufWriter<File>>>,
    /// Callback for forwarding formatted lines.
    callback: Option<LogCallback>,
    /// Logging configuration.
    config: LogConfig,
    /// Tail buffer for recent process output.
    tail_buffer: Mutex<VecDeque<String>>,
}

impl RunLogger {
    /// Create a new run logger.
    ///
    /// # Arguments
    /// * `run_name` - Name of the run (used in log filename)
    /// * `log_dir` - Directory to write log file to
    /// * `config` - Logging configuration
    /// * `callback` - Optional callback receiving every formatted line
    pub fn new(
        run_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let run_name = run_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&run_name)));
        let file_writer = BufWriter::new(File::create(&log_path)?);
        let tail_capacity = config.error_tail;

        Ok(Self {
            run_name,
            log_path,
            file_writer: Mutex::new(Some(file_writer)),
            callback,
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(tail_capacity)),
        })
    }

    /// Get the run name.
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log a stage marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    /// Log a command being executed (or only planned).
    pub fn command(&self, command: &str, dry_run: bool) {
        let prefix = if dry_run {
            MessagePrefix::Planned
        } else {
            MessagePrefix::Command
        };
        self.log(LogLevel::Info, &prefix.format(command));
    }

    /// Log one line of process output.
    ///
    /// In compact mode, lines only go to the tail buffer.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut buffer = self.tail_buffer.lock();
            if buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            if self.config.error_tail > 0 {
                buffer.push_back(line.to_string());
            }
        }

        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        self.log(LogLevel::Debug, &format!("{}{}", prefix, line));
    }

    /// Write out the tail buffer (typically after a failure).
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    /// Clear the tail buffer.
    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    /// Format a message with timestamp (if enabled).
    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    /// Output a formatted message to file and callback.
    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = self.callback {
            callback(formatted);
        }
    }
}

impl EventSink for RunLogger {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted {
                dry_run,
                bands,
                visits,
            } => {
                let mode = if *dry_run { "dry run" } else { "live run" };
                self.info(&format!(
                    "Starting {} over {} visit(s) in bands {}",
                    mode, visits, bands
                ));
            }
            PipelineEvent::StageStarted {
                stage,
                index,
                total,
            } => {
                self.phase(&format!("{} ({}/{})", stage, index + 1, total));
            }
            PipelineEvent::CommandPlanned {
                command, dry_run, ..
            } => {
                self.clear_tail();
                self.command(command, *dry_run);
            }
            PipelineEvent::OutputLine {
                line, is_stderr, ..
            } => {
                self.output_line(line, *is_stderr);
            }
            PipelineEvent::InvocationSucceeded { key, .. } => {
                self.debug(&format!("{} succeeded", key));
            }
            PipelineEvent::InvocationFailed { stage, key, detail } => {
                self.error(&format!("{} failed for {}: {}", stage, key, detail));
                self.show_tail(stage.name());
            }
            PipelineEvent::StageSkipped { stage, reason } => {
                self.warn(&format!("{} skipped: {}", stage, reason));
            }
            PipelineEvent::StageFinished {
                stage,
                attempted,
                failed,
            } => {
                if *failed == 0 {
                    self.success(&format!("{} completed ({} invocation(s))", stage, attempted));
                } else {
                    self.warn(&format!(
                        "{} finished with {} of {} invocation(s) failed",
                        stage, failed, attempted
                    ));
                }
            }
            PipelineEvent::RunFinished { failures } => {
                if *failures == 0 {
                    self.success("Pipeline finished without failures");
                } else {
                    self.warn(&format!("Pipeline finished with {} failure(s)", failures));
                }
                self.flush();
            }
        }
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FailureDetail;
    use crate::models::{Band, FanOutKey, Stage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn quiet_config() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("level2_run", dir.path(), LogConfig::default(), None).unwrap();

        assert!(logger.log_path().exists());
        assert!(logger.log_path().to_string_lossy().contains("level2_run.log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("run", dir.path(), LogConfig::default(), None).unwrap();

        logger.info("Test message");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("Test message"));
    }

    #[test]
    fn respects_level() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("run", dir.path(), quiet_config(), None).unwrap();

        logger.debug("hidden");
        logger.info("shown");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(!content.contains("hidden"));
        assert!(content.contains("shown"));
    }

    #[test]
    fn calls_callback() {
        let dir = tempdir().unwrap();
        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();

        let callback: LogCallback = Box::new(move |_msg| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let logger =
            RunLogger::new("run", dir.path(), LogConfig::default(), Some(callback)).unwrap();

        logger.info("Message 1");
        logger.info("Message 2");

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tail_buffer_maintains_limit() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 5,
            ..LogConfig::default()
        };

        let logger = RunLogger::new("run", dir.path(), config, None).unwrap();

        for i in 0..10 {
            logger.output_line(&format!("Line {}", i), false);
        }

        let tail = logger.get_tail();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "Line 5");
        assert_eq!(tail[4], "Line 9");
    }

    #[test]
    fn failure_event_replays_tail() {
        let dir = tempdir().unwrap();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let callback: LogCallback = Box::new(move |msg| sink.lock().push(msg.to_string()));
        let logger = RunLogger::new("run", dir.path(), quiet_config(), Some(callback)).unwrap();

        logger.emit(&PipelineEvent::CommandPlanned {
            stage: Stage::MakeCoaddTempExp,
            key: FanOutKey::Band(Band::R),
            command: "makeCoaddTempExp.py out/".to_string(),
            dry_run: false,
        });
        logger.emit(&PipelineEvent::OutputLine {
            stage: Stage::MakeCoaddTempExp,
            line: "Traceback: no inputs".to_string(),
            is_stderr: true,
        });
        logger.emit(&PipelineEvent::InvocationFailed {
            stage: Stage::MakeCoaddTempExp,
            key: FanOutKey::Band(Band::R),
            detail: FailureDetail::Exit {
                code: Some(1),
                diagnostic: "Traceback: no inputs".to_string(),
            },
        });

        let lines = lines.lock();
        assert_eq!(lines[0], "$ makeCoaddTempExp.py out/");
        assert!(lines[1].starts_with("[ERROR] makeCoaddTempExp failed for filter=r"));
        assert_eq!(lines[2], "[makeCoaddTempExp/tail]");
        assert_eq!(lines[3], "Traceback: no inputs");
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("has:colon"), "has_colon");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
