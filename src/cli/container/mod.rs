//! Container runtime integration for package builds.
//!
//! Each run builds one ephemeral builder image from the format's recipe and
//! runs the format's build command in a fresh container with the scratch
//! subdirectories bind-mounted in.
//!
//! # Module Structure
//!
//! - `availability` - Runtime binary lookup and daemon probe
//! - `image` - Builder image build from a piped recipe
//! - `container_runner` - Container execution and output streaming
//! - `artifact_manager` - Release directory reset and artifact harvesting

mod artifact_manager;
mod availability;
mod config;
mod container_runner;
mod image;

pub use artifact_manager::{ArtifactManager, ReleaseArtifact, ReleaseArtifactSet};
pub use container_runner::ContainerRunResult;

use crate::bundler::{ContainerRuntime, PackageFormat};
use crate::cli::RuntimeConfig;
use crate::error::Result;
use serde::Serialize;
use std::path::PathBuf;

/// One bind mount of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    /// Directory on the host (inside the scratch root)
    pub host_path: PathBuf,
    /// Absolute path inside the container
    pub container_path: String,
}

impl Mount {
    /// `-v` argument value for a runtime.
    pub fn volume_arg(&self, runtime: ContainerRuntime) -> String {
        format!(
            "{}:{}{}",
            self.host_path.display(),
            self.container_path,
            runtime.mount_suffix()
        )
    }
}

/// Everything needed to run one containerized package build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRun {
    /// Format being built
    pub package_format: PackageFormat,
    /// Runtime executing the build
    pub runtime: ContainerRuntime,
    /// Scratch root owned by the run
    pub scratch_root: PathBuf,
    /// Bind mounts, in command-line order
    pub mounts: Vec<Mount>,
    /// Builder image tag
    pub image_tag: String,
    /// Shell pipeline executed with `sh -c`
    pub run_command: String,
}

/// Seam between the orchestrator and a container runtime.
///
/// [`RuntimeCli`] drives a real `podman` / `docker` binary; tests substitute
/// an in-process implementation.
#[allow(async_fn_in_trait)]
pub trait ContainerEngine {
    /// Human-readable engine name for messages.
    fn name(&self) -> &str;

    /// Fails with a configuration error if the runtime cannot be used.
    async fn ensure_available(&self, runtime_config: &RuntimeConfig) -> Result<()>;

    /// Builds `image_tag` from recipe text. A non-zero exit is an error.
    async fn build_image(
        &self,
        image_tag: &str,
        recipe: &str,
        runtime_config: &RuntimeConfig,
    ) -> Result<()>;

    /// Runs the build command and reports how it exited.
    async fn run(&self, run: &BuildRun, runtime_config: &RuntimeConfig)
    -> Result<ContainerRunResult>;
}

/// Engine backed by a container runtime CLI.
#[derive(Debug, Clone)]
pub struct RuntimeCli {
    runtime: ContainerRuntime,
    program: PathBuf,
}

impl RuntimeCli {
    /// Creates an engine invoking `program` with `runtime` conventions.
    pub fn new(runtime: ContainerRuntime, program: PathBuf) -> Self {
        Self { runtime, program }
    }
}

impl ContainerEngine for RuntimeCli {
    fn name(&self) -> &str {
        self.runtime.program()
    }

    async fn ensure_available(&self, runtime_config: &RuntimeConfig) -> Result<()> {
        let program = availability::locate_program(&self.program)?;
        availability::check_runtime_available(&program, runtime_config).await
    }

    async fn build_image(
        &self,
        image_tag: &str,
        recipe: &str,
        runtime_config: &RuntimeConfig,
    ) -> Result<()> {
        image::build_image(&self.program, image_tag, recipe, runtime_config).await
    }

    async fn run(
        &self,
        run: &BuildRun,
        runtime_config: &RuntimeConfig,
    ) -> Result<ContainerRunResult> {
        let args = container_runner::build_run_args(run);
        container_runner::run_container(&self.program, args, runtime_config).await
    }
}
