//! Builder for constructing Settings.

use super::{ContainerRuntime, Settings};
use crate::bundler::PackageFormat;
use crate::error::{PackagingError, Result};
use path_absolutize::Absolutize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Builder for constructing [`Settings`].
///
/// Relative paths are resolved against the current directory, `..` is
/// collapsed and symlinks are followed; packaging and release directories
/// default to `packaging/` and `release/` under the project directory.
#[derive(Default)]
pub struct SettingsBuilder {
    runtime: Option<ContainerRuntime>,
    runtime_program: Option<PathBuf>,
    package_format: Option<PackageFormat>,
    software_name: Option<String>,
    keep_scratch: bool,
    verbosity: u8,
    project_dir: Option<PathBuf>,
    packaging_dir: Option<PathBuf>,
    release_dir: Option<PathBuf>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the container runtime.
    ///
    /// # Required
    pub fn runtime(mut self, runtime: ContainerRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Overrides the runtime executable path.
    ///
    /// Default: the runtime's program name looked up on `PATH`
    pub fn runtime_program<P: AsRef<Path>>(mut self, program: Option<P>) -> Self {
        self.runtime_program = program.map(|p| p.as_ref().to_path_buf());
        self
    }

    /// Sets the package format.
    ///
    /// # Required
    pub fn package_format(mut self, format: PackageFormat) -> Self {
        self.package_format = Some(format);
        self
    }

    /// Overrides the software name.
    ///
    /// Default: base name of the project directory
    pub fn software_name(mut self, name: Option<String>) -> Self {
        self.software_name = name;
        self
    }

    /// Keeps the scratch root after the run.
    pub fn keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    /// Sets diagnostic verbosity.
    pub fn verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Sets the project directory.
    ///
    /// Default: current directory
    pub fn project_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.project_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the packaging template root.
    pub fn packaging_dir<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.packaging_dir = path.map(|p| p.as_ref().to_path_buf());
        self
    }

    /// Sets the release directory.
    pub fn release_dir<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.release_dir = path.map(|p| p.as_ref().to_path_buf());
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns [`PackagingError::Config`] if runtime or format is missing, the
    /// project directory does not exist, the software name is empty, or the
    /// release directory would overlap the project or packaging directory.
    pub fn build(self) -> Result<Settings> {
        let runtime = self
            .runtime
            .ok_or_else(|| PackagingError::config("a container runtime is required"))?;
        let package_format = self
            .package_format
            .ok_or_else(|| PackagingError::config("a package system is required"))?;

        let cwd = std::env::current_dir()?;
        let project_dir = resolve_path(&cwd, &self.project_dir.unwrap_or_else(|| cwd.clone()))?;
        if !project_dir.is_dir() {
            return Err(PackagingError::config(format!(
                "project directory does not exist: {}",
                project_dir.display()
            )));
        }

        if let Some(name) = &self.software_name
            && name.trim().is_empty()
        {
            return Err(PackagingError::config("software name must not be empty"));
        }

        let packaging_dir = match self.packaging_dir {
            Some(p) => resolve_path(&cwd, &p)?,
            None => project_dir.join("packaging"),
        };
        let release_dir = match self.release_dir {
            Some(p) => resolve_path(&cwd, &p)?,
            None => project_dir.join("release"),
        };

        // The release dir is wiped on every run.
        if project_dir.starts_with(&release_dir) || packaging_dir.starts_with(&release_dir) {
            return Err(PackagingError::config(format!(
                "release directory {} must not contain the project or packaging directory",
                release_dir.display()
            )));
        }

        Ok(Settings {
            runtime,
            runtime_program: self.runtime_program,
            package_format,
            software_name: self.software_name,
            keep_scratch: self.keep_scratch,
            verbosity: self.verbosity,
            project_dir,
            packaging_dir,
            release_dir,
        })
    }
}

/// Makes `path` absolute against `base` and resolves symlinks in its deepest
/// existing ancestor, so paths that do not exist yet compare correctly.
fn resolve_path(base: &Path, path: &Path) -> Result<PathBuf> {
    let normalized = path.absolutize_from(base)?.into_owned();

    let mut existing = normalized.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        if let Ok(real) = existing.canonicalize() {
            let mut resolved = real;
            resolved.extend(missing.iter().rev());
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::new()
            .project_dir(dir.path())
            .runtime(ContainerRuntime::Docker)
            .package_format(PackageFormat::Rpm)
            .build()
            .unwrap();

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(settings.packaging_dir(), root.join("packaging"));
        assert_eq!(settings.release_dir(), root.join("release"));
        assert_eq!(settings.format_template_dir(), root.join("packaging/rpm"));
        assert_eq!(settings.runtime_program(), PathBuf::from("docker"));
        assert!(!settings.keep_scratch());
        assert!(!settings.list_scratch());
    }

    #[test]
    fn missing_runtime_is_config_error() {
        let err = SettingsBuilder::new()
            .package_format(PackageFormat::Apk)
            .build()
            .unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
    }

    #[test]
    fn missing_project_dir_is_config_error() {
        let err = SettingsBuilder::new()
            .project_dir("/definitely/not/here")
            .runtime(ContainerRuntime::Podman)
            .package_format(PackageFormat::Apk)
            .build()
            .unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
    }

    #[test]
    fn empty_software_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = SettingsBuilder::new()
            .project_dir(dir.path())
            .runtime(ContainerRuntime::Podman)
            .package_format(PackageFormat::Apk)
            .software_name(Some("  ".to_string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
    }

    #[test]
    fn release_dir_may_not_wrap_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("widget");
        std::fs::create_dir(&project).unwrap();
        let err = SettingsBuilder::new()
            .project_dir(&project)
            .runtime(ContainerRuntime::Podman)
            .package_format(PackageFormat::Apk)
            .release_dir(Some(dir.path().canonicalize().unwrap()))
            .build()
            .unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
    }

    #[test]
    fn release_dir_with_parent_components_may_not_wrap_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("widget");
        std::fs::create_dir(&project).unwrap();
        let err = SettingsBuilder::new()
            .project_dir(&project)
            .runtime(ContainerRuntime::Podman)
            .package_format(PackageFormat::Apk)
            .release_dir(Some(project.join("..")))
            .build()
            .unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));

        let err = SettingsBuilder::new()
            .project_dir(&project)
            .runtime(ContainerRuntime::Podman)
            .package_format(PackageFormat::Apk)
            .release_dir(Some(project.join("release/../.")))
            .build()
            .unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn release_dir_symlink_may_not_wrap_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("widget");
        std::fs::create_dir(&project).unwrap();
        let link = dir.path().join("out");
        std::os::unix::fs::symlink(dir.path(), &link).unwrap();
        let err = SettingsBuilder::new()
            .project_dir(&project)
            .runtime(ContainerRuntime::Podman)
            .package_format(PackageFormat::Apk)
            .release_dir(Some(&link))
            .build()
            .unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
    }

    #[test]
    fn missing_release_dir_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("widget");
        std::fs::create_dir(&project).unwrap();
        let settings = SettingsBuilder::new()
            .project_dir(&project)
            .runtime(ContainerRuntime::Podman)
            .package_format(PackageFormat::Apk)
            .release_dir(Some(project.join("build/../dist/apk")))
            .build()
            .unwrap();
        let root = project.canonicalize().unwrap();
        assert_eq!(settings.release_dir(), root.join("dist/apk"));
    }
}
