//! Package building core.
//!
//! - [`format`] - Package formats and their build profiles
//! - [`settings`] - Validated run configuration
//! - [`template`] - Build-definition rendering
//! - [`scratch`] - Per-run scratch directory
//! - [`builder`] - Run orchestration and checksums

pub mod builder;
pub mod format;
pub mod scratch;
pub mod settings;
pub mod template;

pub use builder::{Orchestrator, RunContext, RunOutcome, RunState};
pub use format::{FormatProfile, MountPoint, OutputDecl, PackageFormat};
pub use settings::{ContainerRuntime, Settings, SettingsBuilder};
