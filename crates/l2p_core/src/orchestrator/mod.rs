//! Pipeline orchestrator for the Level 2 stages.
//!
//! The stage order and fan-out rules are a declarative table; one routine
//! runs every entry. Failed invocations are collected in a [`FailureLog`]
//! rather than stopping the run.
//!
//! # Architecture
//!
//! ```text
//! Level2Pipeline
//!     ├── processEimage           per visit
//!     ├── makeDiscreteSkyMap      all visits
//!     ├── makeCoaddTempExp        per band
//!     ├── assembleCoadd           per band x tract x patch
//!     ├── detectCoaddSources      all bands
//!     ├── mergeCoaddDetections    all bands
//!     ├── measureCoaddSources     all bands
//!     ├── mergeCoaddMeasurements  all bands
//!     └── forcedPhotCcd           per sensor
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use l2p_core::command::{RunMode, StageRunner};
//! use l2p_core::logging::TracingSink;
//! use l2p_core::orchestrator::{Level2Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("image_repo", "output_repo");
//! let mut pipeline =
//!     Level2Pipeline::from_repository(config, StageRunner::shell(), Arc::new(TracingSink))?;
//! let failures = pipeline.run(RunMode::Live);
//! print!("{}", failures.report());
//! # Ok::<(), l2p_core::orchestrator::PipelineError>(())
//! ```

mod errors;
mod failures;
mod ingest;
mod pipeline;
mod stages;
mod types;

pub use errors::{PipelineError, PipelineResult};
pub use failures::{FailureLog, FailureRecord, StageFailures};
pub use ingest::ingest_images;
pub use pipeline::Level2Pipeline;
pub use stages::{spec_for, FanOut, StageSpec, STAGES};
pub use types::{PipelineConfig, PlannedInvocation};
