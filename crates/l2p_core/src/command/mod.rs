//! External command construction and execution.
//!
//! - [`CommandBuilder`] renders a stage and its data ids into an [`Invocation`]
//! - [`StageRunner`] executes invocations (or only reports them in a dry run)
//!   through an [`Executor`], turning failures into [`FailureDetail`] values

mod builder;
mod runner;

pub use builder::{ingest_invocation, CommandBuilder, DataId, DataIds, Invocation};
pub use runner::{
    Executor, FailureDetail, ProcessOutput, RunMode, RunOutcome, ShellExecutor, StageRunner,
};
