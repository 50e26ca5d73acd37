//! Stage command-line builder.
//!
//! Renders a stage plus its data ids into one invocation. Every stage uses
//! the same template:
//!
//! ```text
//! <stage>.py <input_repo>/ [--selectId <k=v>...] --id <k=v>...
//!     [--config <override>...] --output <output_repo> <options>
//! ```
//!
//! The input repository is the image repository for single-frame
//! processing and the output repository for everything after it.
//! Repository paths are shell-quoted when they contain anything outside a
//! conservative set of characters; the line is run through `sh -c`.

use std::borrow::Cow;
use std::path::Path;

use crate::config::StageSettings;
use crate::models::Stage;

/// One `key=value` data id argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataId {
    pub key: &'static str,
    pub value: String,
}

impl std::fmt::Display for DataId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Selector and identifier arguments for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataIds {
    select: Vec<DataId>,
    id: Vec<DataId>,
}

impl DataIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `--selectId` argument.
    pub fn select(mut self, key: &'static str, value: impl ToString) -> Self {
        self.select.push(DataId {
            key,
            value: value.to_string(),
        });
        self
    }

    /// Add an `--id` argument.
    pub fn id(mut self, key: &'static str, value: impl ToString) -> Self {
        self.id.push(DataId {
            key,
            value: value.to_string(),
        });
        self
    }
}

/// A fully rendered external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// The command as one shell line.
    ///
    /// This is both what dry runs report and what live runs execute.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Builder for stage invocations.
///
/// Holds everything that is fixed for a run; `build` adds the per-invocation
/// data ids.
pub struct CommandBuilder<'a> {
    image_repo: &'a Path,
    output_repo: &'a Path,
    options: &'a str,
    overrides: &'a StageSettings,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder.
    pub fn new(
        image_repo: &'a Path,
        output_repo: &'a Path,
        options: &'a str,
        overrides: &'a StageSettings,
    ) -> Self {
        Self {
            image_repo,
            output_repo,
            options,
            overrides,
        }
    }

    /// Build the invocation for `stage` with the given data ids.
    pub fn build(&self, stage: Stage, ids: &DataIds) -> Invocation {
        let mut args = Vec::new();

        let input = if stage.reads_image_repo() {
            self.image_repo
        } else {
            self.output_repo
        };
        args.push(shell_quote(&format!("{}/", repo_arg(input))).into_owned());

        if !ids.select.is_empty() {
            args.push("--selectId".to_string());
            args.extend(ids.select.iter().map(DataId::to_string));
        }

        args.push("--id".to_string());
        args.extend(ids.id.iter().map(DataId::to_string));

        let overrides = self.overrides.overrides_for(stage);
        if !overrides.is_empty() {
            args.push("--config".to_string());
            args.extend(overrides.iter().cloned());
        }

        args.push("--output".to_string());
        args.push(shell_quote(&repo_arg(self.output_repo)).into_owned());

        args.extend(self.options.split_whitespace().map(str::to_string));

        Invocation {
            program: stage.executable(),
            args,
        }
    }
}

/// Build the raw-image ingestion command.
///
/// Links every file matching `pattern` under `phosim_dir` into
/// `image_repo`, creating its registry.
pub fn ingest_invocation(
    phosim_dir: &Path,
    pattern: &str,
    image_repo: &Path,
    options: &str,
) -> Invocation {
    // The pattern stays unquoted so the shell expands it.
    let source = shell_quote(&repo_arg(phosim_dir)).into_owned();
    let mut args = vec![
        source.clone(),
        format!("{}/{}", source, pattern),
        "--mode".to_string(),
        "link".to_string(),
        "--output".to_string(),
        shell_quote(&repo_arg(image_repo)).into_owned(),
    ];
    args.extend(options.split_whitespace().map(str::to_string));

    Invocation {
        program: "ingestSimImages.py".to_string(),
        args,
    }
}

/// Repository path without trailing separators.
fn repo_arg(path: &Path) -> String {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() {
        text.into_owned()
    } else {
        trimmed.to_string()
    }
}

/// Quote `text` for a POSIX shell unless every character is plainly safe.
fn shell_quote(text: &str) -> Cow<'_, str> {
    let safe = |c: char| c.is_ascii_alphanumeric() || "_-./,=^:@%+".contains(c);
    if !text.is_empty() && text.chars().all(safe) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("'{}'", text.replace('\'', "'\\''")))
    }
}
