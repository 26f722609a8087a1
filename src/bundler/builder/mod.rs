//! Run orchestration and artifact verification.
//!
//! # Module Organization
//!
//! - [`checksum`] - SHA256 checksum calculation for artifacts
//! - [`orchestrator`] - Main [`Orchestrator`] struct and run sequencing

mod checksum;
mod orchestrator;

pub use checksum::calculate_sha256;
pub use orchestrator::{BUILD_RUN_FILE, Orchestrator, RunContext, RunOutcome, RunState};
