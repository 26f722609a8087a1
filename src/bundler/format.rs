//! Package formats and their per-format build profiles.
//!
//! Everything that differs between formats (template names, override syntax,
//! container mount layout, build command, artifact locations) lives in one
//! [`FormatProfile`] selected once per run.

use serde::Serialize;
use std::fmt;

/// Target distribution packaging convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// Alpine Linux `.apk` via `abuild`
    Apk,
    /// Debian `.deb` (not yet supported)
    Deb,
    /// RPM `.rpm` / `.src.rpm` via `rpmbuild`
    Rpm,
    /// Plain source tarball (not yet supported)
    Tarball,
}

impl PackageFormat {
    /// Lowercase name used in paths, image tags and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apk => "apk",
            Self::Deb => "deb",
            Self::Rpm => "rpm",
            Self::Tarball => "tarball",
        }
    }

    /// Returns the build profile, or `None` for formats that are accepted
    /// but not yet implemented.
    pub fn profile(self) -> Option<FormatProfile> {
        match self {
            Self::Apk => Some(apk_profile()),
            Self::Rpm => Some(rpm_profile()),
            Self::Deb | Self::Tarball => None,
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How build-definition templates are located in the format's template directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSet {
    /// Fixed file names, all of which must exist.
    Named(&'static [&'static str]),
    /// Every file matching a glob; at least one must exist.
    Glob(&'static str),
}

impl fmt::Display for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(names) => f.write_str(&names.join(", ")),
            Self::Glob(pattern) => f.write_str(pattern),
        }
    }
}

/// Syntax of the override lines written ahead of the template content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSyntax {
    /// POSIX shell assignment: `key="value"`
    Shell,
    /// RPM macro definition: `%global key value`
    RpmMacro,
}

/// Which timestamp key a format's override block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKey {
    /// `repo_date` with the full ISO-8601 timestamp
    RepoDate,
    /// `pkg_timestamp` with a compact `%Y%m%d%H%M%S` rendering
    PkgTimestamp,
}

/// One bind mount, relative to the scratch root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountPoint {
    /// Directory under the scratch root (created before the run)
    pub scratch_subdir: &'static str,
    /// Absolute path inside the container
    pub container_path: &'static str,
}

/// One expected kind of build output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDecl {
    /// Glob relative to the scratch root
    pub pattern: &'static str,
    /// Subdirectory of the release directory ("" for the root)
    pub release_subdir: &'static str,
    /// Whether an empty match fails the run
    pub required: bool,
}

/// Per-format configuration consumed uniformly by the templater, archiver,
/// container builder and artifact collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatProfile {
    /// Format this profile describes
    pub format: PackageFormat,
    /// Build-definition templates to render
    pub templates: TemplateSet,
    /// Override line syntax
    pub syntax: OverrideSyntax,
    /// Timestamp key in the override block
    pub timestamp_key: TimestampKey,
    /// Container build recipe file name within the template directory
    pub recipe: &'static str,
    /// Scratch subdirectory receiving rendered build definitions
    pub definition_subdir: &'static str,
    /// Scratch subdirectory receiving the source archive
    pub source_subdir: &'static str,
    /// Bind mounts, in command-line order
    pub mounts: &'static [MountPoint],
    /// Shell pipeline run inside the container
    pub run_command: &'static str,
    /// Expected outputs
    pub outputs: &'static [OutputDecl],
}

impl FormatProfile {
    /// Image tag for a given software name; stable so reruns overwrite.
    pub fn image_tag(&self, software_name: &str) -> String {
        format!("{}-{}-builder", software_name, self.format)
    }
}

const APK_TEMPLATES: &[&str] = &["APKBUILD", "AKMBUILD"];

const APK_MOUNTS: &[MountPoint] = &[
    MountPoint {
        scratch_subdir: "apk/src",
        container_path: "/home/builder/package",
    },
    MountPoint {
        scratch_subdir: "apk/packages",
        container_path: "/home/builder/packages",
    },
];

const APK_OUTPUTS: &[OutputDecl] = &[OutputDecl {
    pattern: "apk/packages/**/*.apk",
    release_subdir: "",
    required: true,
}];

const RPM_MOUNTS: &[MountPoint] = &[
    MountPoint {
        scratch_subdir: "rpm/SOURCES",
        container_path: "/root/rpmbuild/SOURCES",
    },
    MountPoint {
        scratch_subdir: "rpm/SPECS",
        container_path: "/root/rpmbuild/SPECS",
    },
    MountPoint {
        scratch_subdir: "rpm/RPMS",
        container_path: "/root/rpmbuild/RPMS",
    },
    MountPoint {
        scratch_subdir: "rpm/SRPMS",
        container_path: "/root/rpmbuild/SRPMS",
    },
];

const RPM_OUTPUTS: &[OutputDecl] = &[
    OutputDecl {
        pattern: "rpm/RPMS/*/*.rpm",
        release_subdir: "RPMS",
        required: true,
    },
    OutputDecl {
        pattern: "rpm/SRPMS/*.src.rpm",
        release_subdir: "SRPMS",
        required: true,
    },
];

fn apk_profile() -> FormatProfile {
    FormatProfile {
        format: PackageFormat::Apk,
        templates: TemplateSet::Named(APK_TEMPLATES),
        syntax: OverrideSyntax::Shell,
        timestamp_key: TimestampKey::RepoDate,
        recipe: "Containerfile",
        definition_subdir: "apk/src",
        source_subdir: "apk/src",
        mounts: APK_MOUNTS,
        run_command: "abuild-keygen -a -n && abuild checksum && abuild srcpkg && abuild -r",
        outputs: APK_OUTPUTS,
    }
}

fn rpm_profile() -> FormatProfile {
    FormatProfile {
        format: PackageFormat::Rpm,
        templates: TemplateSet::Glob("*.spec"),
        syntax: OverrideSyntax::RpmMacro,
        timestamp_key: TimestampKey::PkgTimestamp,
        recipe: "Containerfile",
        definition_subdir: "rpm/SPECS",
        source_subdir: "rpm/SOURCES",
        mounts: RPM_MOUNTS,
        run_command: "rpmbuild -ba /root/rpmbuild/SPECS/*.spec",
        outputs: RPM_OUTPUTS,
    }
}
