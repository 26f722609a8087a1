//! Containerized distribution package builder.
//!
//! This library renders format-specific build definitions from repository
//! metadata, archives the source tree, and runs the format's build tool
//! inside an ephemeral container:
//! - Alpine packages (.apk) via `abuild`
//! - RPM packages (.rpm, .src.rpm) via `rpmbuild`
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;
pub mod metadata;
pub mod source;

// Re-export commonly used types
pub use error::{CliError, PackagingError, Result};
