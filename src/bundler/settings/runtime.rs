//! Container runtime selection.

use serde::Serialize;
use std::fmt;

/// OCI-compatible container runtime used to sandbox the build.
///
/// Both runtimes accept the same `build` / `run` command lines; the only
/// divergence handled here is SELinux relabelling of bind mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    /// Podman (rootless by default)
    Podman,
    /// Docker
    Docker,
}

impl ContainerRuntime {
    /// Executable name looked up on `PATH`.
    pub fn program(self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }

    /// Suffix appended to `-v host:container` mount specs.
    ///
    /// Podman is commonly run on SELinux-enforcing hosts where an unlabelled
    /// bind mount is unreadable inside the container.
    pub fn mount_suffix(self) -> &'static str {
        match self {
            Self::Podman => ":Z",
            Self::Docker => "",
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}
