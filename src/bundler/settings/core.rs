//! Core Settings struct and implementations.

use super::ContainerRuntime;
use crate::bundler::PackageFormat;
use std::path::{Path, PathBuf};

/// Validated configuration for one packaging run.
///
/// Central configuration for the orchestrator, constructed via
/// [`SettingsBuilder`](super::SettingsBuilder). All paths are absolute.
///
/// # Examples
///
/// ```no_run
/// use distpack::bundler::{ContainerRuntime, PackageFormat, SettingsBuilder};
///
/// # fn example() -> distpack::Result<()> {
/// let settings = SettingsBuilder::new()
///     .project_dir("/src/widget")
///     .runtime(ContainerRuntime::Podman)
///     .package_format(PackageFormat::Apk)
///     .build()?;
/// assert_eq!(settings.release_dir(), std::path::Path::new("/src/widget/release"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Settings {
    /// Container runtime used for image build and run.
    pub(super) runtime: ContainerRuntime,

    /// Explicit runtime executable, overriding the `PATH` lookup.
    pub(super) runtime_program: Option<PathBuf>,

    /// Target package format.
    pub(super) package_format: PackageFormat,

    /// Software name override. `None` means the project directory name.
    pub(super) software_name: Option<String>,

    /// Keep the scratch root after the run instead of deleting it.
    pub(super) keep_scratch: bool,

    /// Diagnostic verbosity (number of `-v` flags).
    pub(super) verbosity: u8,

    /// Checkout being packaged.
    pub(super) project_dir: PathBuf,

    /// Root of the per-format template directories.
    pub(super) packaging_dir: PathBuf,

    /// Persistent output directory, wiped each run.
    pub(super) release_dir: PathBuf,
}

impl Settings {
    /// Returns the container runtime.
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    /// Returns the runtime executable to invoke.
    pub fn runtime_program(&self) -> PathBuf {
        self.runtime_program
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.runtime.program()))
    }

    /// Returns the package format.
    pub fn package_format(&self) -> PackageFormat {
        self.package_format
    }

    /// Returns the software name override, if any.
    pub fn software_name(&self) -> Option<&str> {
        self.software_name.as_deref()
    }

    /// Whether the scratch root should survive the run.
    pub fn keep_scratch(&self) -> bool {
        self.keep_scratch
    }

    /// Returns the diagnostic verbosity.
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Whether scratch contents should be listed at the end of the run.
    pub fn list_scratch(&self) -> bool {
        self.verbosity > 0
    }

    /// Returns the project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Returns the packaging template root.
    pub fn packaging_dir(&self) -> &Path {
        &self.packaging_dir
    }

    /// Returns the template directory for the configured format.
    pub fn format_template_dir(&self) -> PathBuf {
        self.packaging_dir.join(self.package_format.as_str())
    }

    /// Returns the release directory.
    pub fn release_dir(&self) -> &Path {
        &self.release_dir
    }
}
