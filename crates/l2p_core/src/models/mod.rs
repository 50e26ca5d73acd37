//! Data models for the Level 2 pipeline.
//!
//! This module contains the parameter sets the orchestrator fans stages out over:
//! - Bands (the six filters, in their fixed order)
//! - Visit sets keyed by band, and the combined tokens derived from them
//! - Sensor (raft, ccd) pairs and tract/patch grids
//! - Stages and the fan-out keys their invocations are recorded under

mod band;
mod params;
mod stage;

// Re-export all public types
pub use band::Band;
pub use params::{Sensor, TractPatches, VisitSet, JOIN_SEPARATOR};
pub use stage::{FanOutKey, Stage};
