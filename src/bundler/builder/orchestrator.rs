//! Run orchestration.
//!
//! This module provides the [`Orchestrator`] that sequences one packaging run:
//! metadata resolution, release directory reset, build-definition rendering,
//! source archiving, image build, containerized build and artifact collection.

use crate::bundler::scratch::ScratchRoot;
use crate::bundler::template::write_definitions;
use crate::bundler::{FormatProfile, PackageFormat, Settings};
use crate::cli::RuntimeConfig;
use crate::cli::container::{
    ArtifactManager, BuildRun, ContainerEngine, Mount, ReleaseArtifactSet,
};
use crate::error::{ErrorExt, PackagingError, Result};
use crate::metadata::RepoMetadata;
use crate::source::{archive_file_name, archive_tree};
use std::fmt;
use std::path::PathBuf;

/// Diagnostics file written into the scratch root.
pub const BUILD_RUN_FILE: &str = "build-run.json";

/// Immutable per-run inputs shared by every step.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Validated configuration
    pub settings: Settings,
    /// Repository metadata, resolved once
    pub metadata: RepoMetadata,
}

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Resolving,
    Building(PackageFormat),
    Collecting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Resolving => f.write_str("resolving"),
            Self::Building(format) => write!(f, "building({})", format),
            Self::Collecting => f.write_str("collecting"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Terminal result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Packages are in the release directory.
    Completed(ReleaseArtifactSet),
    /// The format is accepted but has no build profile yet. The release
    /// directory has been emptied.
    NotImplemented(PackageFormat),
}

/// Sequences a packaging run over a [`ContainerEngine`].
pub struct Orchestrator<E> {
    settings: Settings,
    engine: E,
    runtime_config: RuntimeConfig,
    scratch_parent: PathBuf,
    state: RunState,
}

impl<E: ContainerEngine> Orchestrator<E> {
    /// Creates an orchestrator whose scratch root lives under the system temp dir.
    pub fn new(settings: Settings, engine: E, runtime_config: RuntimeConfig) -> Self {
        Self {
            settings,
            engine,
            runtime_config,
            scratch_parent: std::env::temp_dir(),
            state: RunState::Idle,
        }
    }

    /// Places the scratch root under `parent` instead of the system temp dir.
    pub fn with_scratch_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.scratch_parent = parent.into();
        self
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Engine driving the container steps.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Executes the run.
    ///
    /// The scratch root is removed before this returns unless retention was
    /// requested. With verbosity enabled its contents are listed first,
    /// whether or not the run succeeded.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        let mut scratch = None;
        let result = self.execute(&mut scratch).await;

        if let Some(scratch) = scratch {
            self.report_scratch(&scratch);
        }

        match &result {
            Ok(_) => self.transition(RunState::Done),
            Err(e) => {
                log::debug!("Run failed: {}", e);
                self.transition(RunState::Failed);
            }
        }
        result
    }

    async fn execute(&mut self, scratch_slot: &mut Option<ScratchRoot>) -> Result<RunOutcome> {
        self.transition(RunState::Resolving);
        let metadata = RepoMetadata::resolve(
            self.settings.project_dir(),
            self.settings.software_name(),
        )
        .await;
        let context = RunContext {
            settings: self.settings.clone(),
            metadata,
        };

        let artifacts = ArtifactManager::new(context.settings.release_dir().to_path_buf());
        artifacts.reset_release_dir(&self.runtime_config).await?;

        let format = context.settings.package_format();
        let Some(profile) = format.profile() else {
            log::info!("No build profile for {}", format);
            return Ok(RunOutcome::NotImplemented(format));
        };

        self.transition(RunState::Building(format));
        self.runtime_config.section(&format!(
            "Building {} packages for {}",
            format, context.metadata.software_name
        ));

        let scratch = scratch_slot.insert(ScratchRoot::create_in(
            &self.scratch_parent,
            context.settings.keep_scratch(),
        )?);
        for mount in profile.mounts {
            let dir = scratch.join(mount.scratch_subdir);
            tokio::fs::create_dir_all(&dir)
                .await
                .fs_context("creating mount directory", &dir)?;
        }

        let template_dir = context.settings.format_template_dir();
        let definitions = write_definitions(
            &context.metadata,
            &profile,
            &template_dir,
            &scratch.join(profile.definition_subdir),
        )
        .await?;
        if definitions.is_empty() {
            return Err(PackagingError::TemplateMissing {
                format: format.to_string(),
                pattern: template_dir.join(profile.templates.to_string()).display().to_string(),
            });
        }
        for definition in &definitions {
            self.runtime_config
                .verbose_println(&format!("Rendered {}", definition.path.display()));
        }

        let recipe_path = template_dir.join(profile.recipe);
        let recipe = match tokio::fs::read_to_string(&recipe_path).await {
            Ok(recipe) => recipe,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PackagingError::TemplateMissing {
                    format: format.to_string(),
                    pattern: recipe_path.display().to_string(),
                });
            }
            Err(e) => return Err(e).fs_context("reading build recipe", &recipe_path),
        };

        self.engine.ensure_available(&self.runtime_config).await?;

        let archive = scratch
            .join(profile.source_subdir)
            .join(archive_file_name(&context.metadata));
        self.runtime_config.progress("Archiving source tree");
        archive_tree(context.settings.project_dir(), &archive).await?;
        self.runtime_config
            .verbose_println(&format!("Wrote {}", archive.display()));

        let run = build_run(&context, &profile, scratch);
        let run_file = scratch.join(BUILD_RUN_FILE);
        tokio::fs::write(&run_file, serde_json::to_vec_pretty(&run)?)
            .await
            .fs_context("writing run description", &run_file)?;

        self.engine
            .build_image(&run.image_tag, &recipe, &self.runtime_config)
            .await?;

        self.runtime_config.progress(&format!(
            "Running {} in {} via {}",
            profile.run_command,
            run.image_tag,
            self.engine.name()
        ));
        let result = self.engine.run(&run, &self.runtime_config).await?;
        if !result.success() {
            return Err(PackagingError::ContainerFailure {
                stage: "run".to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr_lines,
            });
        }

        self.transition(RunState::Collecting);
        let collected = artifacts
            .collect(scratch.path(), profile.outputs, &self.runtime_config)
            .await?;
        self.runtime_config.success(&format!(
            "{} package(s) in {}",
            collected.artifacts.len(),
            collected.release_dir.display()
        ));

        Ok(RunOutcome::Completed(collected))
    }

    fn transition(&mut self, next: RunState) {
        log::debug!("Run state {} -> {}", self.state, next);
        self.state = next;
    }

    fn report_scratch(&self, scratch: &ScratchRoot) {
        if self.settings.list_scratch() {
            self.runtime_config
                .section(&format!("Scratch contents of {}", scratch.path().display()));
            for entry in scratch.listing() {
                self.runtime_config.indent(&entry.display().to_string());
            }
        }
        if scratch.is_retained() {
            self.runtime_config.info(&format!(
                "Scratch directory kept at {}",
                scratch.path().display()
            ));
        }
    }
}

fn build_run(context: &RunContext, profile: &FormatProfile, scratch: &ScratchRoot) -> BuildRun {
    BuildRun {
        package_format: profile.format,
        runtime: context.settings.runtime(),
        scratch_root: scratch.path().to_path_buf(),
        mounts: profile
            .mounts
            .iter()
            .map(|m| Mount {
                host_path: scratch.join(m.scratch_subdir),
                container_path: m.container_path.to_string(),
            })
            .collect(),
        image_tag: profile.image_tag(&context.metadata.software_name),
        run_command: profile.run_command.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{ContainerRuntime, SettingsBuilder};
    use crate::cli::container::ContainerRunResult;
    use crate::metadata::tests::{make_git_repo, run_git};
    use std::path::Path;
    use std::sync::Mutex;

    /// In-process engine that fakes the build tool's outputs.
    #[derive(Default)]
    struct MockEngine {
        exit_code: i32,
        unavailable: bool,
        images: Mutex<Vec<(String, String)>>,
        runs: Mutex<Vec<BuildRun>>,
    }

    impl MockEngine {
        fn failing(exit_code: i32) -> Self {
            Self {
                exit_code,
                ..Default::default()
            }
        }

        fn host_dir(run: &BuildRun, container_path: &str) -> PathBuf {
            run.mounts
                .iter()
                .find(|m| m.container_path == container_path)
                .map(|m| m.host_path.clone())
                .unwrap()
        }

        fn last_run(&self) -> BuildRun {
            self.runs.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl ContainerEngine for MockEngine {
        fn name(&self) -> &str {
            "mock"
        }

        async fn ensure_available(&self, _: &RuntimeConfig) -> Result<()> {
            if self.unavailable {
                return Err(PackagingError::config("mock runtime unavailable"));
            }
            Ok(())
        }

        async fn build_image(&self, tag: &str, recipe: &str, _: &RuntimeConfig) -> Result<()> {
            self.images
                .lock()
                .unwrap()
                .push((tag.to_string(), recipe.to_string()));
            Ok(())
        }

        async fn run(&self, run: &BuildRun, _: &RuntimeConfig) -> Result<ContainerRunResult> {
            self.runs.lock().unwrap().push(run.clone());
            if self.exit_code != 0 {
                return Ok(ContainerRunResult {
                    exit_code: self.exit_code,
                    stderr_lines: vec!["build exploded".to_string()],
                });
            }

            match run.package_format {
                PackageFormat::Apk => {
                    let src = Self::host_dir(run, "/home/builder/package");
                    assert!(src.join("APKBUILD").is_file());
                    assert!(src.join("AKMBUILD").is_file());
                    assert!(src.join("widget.tar.gz").is_file());
                    let out = Self::host_dir(run, "/home/builder/packages").join("builder/x86_64");
                    std::fs::create_dir_all(&out)?;
                    std::fs::write(out.join("widget-1.0-r0.apk"), "apk")?;
                    std::fs::write(out.join("APKINDEX.tar.gz"), "index")?;
                }
                PackageFormat::Rpm => {
                    let specs = Self::host_dir(run, "/root/rpmbuild/SPECS");
                    assert!(specs.join("widget.spec").is_file());
                    let rpms = Self::host_dir(run, "/root/rpmbuild/RPMS").join("x86_64");
                    std::fs::create_dir_all(&rpms)?;
                    std::fs::write(rpms.join("widget-1.0-1.x86_64.rpm"), "rpm")?;
                    let srpms = Self::host_dir(run, "/root/rpmbuild/SRPMS");
                    std::fs::write(srpms.join("widget-1.0-1.src.rpm"), "srpm")?;
                }
                PackageFormat::Deb | PackageFormat::Tarball => unreachable!(),
            }
            Ok(ContainerRunResult {
                exit_code: 0,
                stderr_lines: Vec::new(),
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        project: PathBuf,
        scratch_parent: PathBuf,
    }

    /// `widget` checkout with apk and rpm templates and one commit.
    fn fixture(origin: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("widget");
        let scratch_parent = dir.path().join("scratch");
        std::fs::create_dir_all(project.join("packaging/apk")).unwrap();
        std::fs::create_dir_all(project.join("packaging/rpm")).unwrap();
        std::fs::create_dir_all(&scratch_parent).unwrap();

        std::fs::write(project.join("packaging/apk/Containerfile"), "FROM alpine:3.20\n").unwrap();
        std::fs::write(project.join("packaging/apk/APKBUILD"), "pkgname=$source_modname\n").unwrap();
        std::fs::write(project.join("packaging/apk/AKMBUILD"), "modname=$source_modname\n").unwrap();
        std::fs::write(project.join("packaging/rpm/Containerfile"), "FROM fedora:40\n").unwrap();
        std::fs::write(
            project.join("packaging/rpm/widget.spec"),
            "Name: %{source_modname}\nRelease: %{pkg_timestamp}\n",
        )
        .unwrap();

        make_git_repo(&project, origin);
        run_git(&project, &["add", "packaging"], &[]);
        run_git(&project, &["commit", "-q", "-m", "packaging"], &[
            ("GIT_COMMITTER_DATE", "2024-01-02T03:04:05+01:00"),
            ("GIT_AUTHOR_DATE", "2024-01-02T03:04:05+01:00"),
        ]);

        Fixture {
            _dir: dir,
            project,
            scratch_parent,
        }
    }

    fn settings(project: &Path, format: PackageFormat) -> Settings {
        SettingsBuilder::new()
            .runtime(ContainerRuntime::Podman)
            .package_format(format)
            .project_dir(project)
            .build()
            .unwrap()
    }

    fn keep_scratch(project: &Path, format: PackageFormat) -> Settings {
        SettingsBuilder::new()
            .runtime(ContainerRuntime::Podman)
            .package_format(format)
            .project_dir(project)
            .keep_scratch(true)
            .build()
            .unwrap()
    }

    fn orchestrator(fx: &Fixture, format: PackageFormat, engine: MockEngine) -> Orchestrator<MockEngine> {
        Orchestrator::new(settings(&fx.project, format), engine, RuntimeConfig::new(false, true))
            .with_scratch_parent(&fx.scratch_parent)
    }

    fn release_files(release: &Path) -> Vec<String> {
        let mut files: Vec<String> = walkdir::WalkDir::new(release)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(release).unwrap().display().to_string())
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn apk_run_collects_only_packages() {
        let fx = fixture(Some("https://example.com/acme/widget"));
        let mut orch = orchestrator(&fx, PackageFormat::Apk, MockEngine::default());

        let outcome = orch.run().await.unwrap();
        assert_eq!(orch.state(), RunState::Done);
        let RunOutcome::Completed(set) = outcome else {
            panic!("expected completed run");
        };
        assert_eq!(set.artifacts.len(), 1);

        let release = fx.project.canonicalize().unwrap().join("release");
        assert_eq!(release_files(&release), vec!["widget-1.0-r0.apk"]);

        let images = orch.engine().images.lock().unwrap().clone();
        assert_eq!(
            images,
            vec![("widget-apk-builder".to_string(), "FROM alpine:3.20\n".to_string())]
        );
        let run = orch.engine().last_run();
        assert_eq!(
            run.run_command,
            "abuild-keygen -a -n && abuild checksum && abuild srcpkg && abuild -r"
        );
        assert!(!run.scratch_root.exists(), "scratch root should be removed");
    }

    #[tokio::test]
    async fn apk_definitions_carry_repository_overrides() {
        let fx = fixture(Some("https://example.com/acme/widget"));
        let mut orch = orchestrator(&fx, PackageFormat::Apk, MockEngine::default());
        orch.settings = keep_scratch(&fx.project, PackageFormat::Apk);

        orch.run().await.unwrap();
        let run = orch.engine().last_run();
        let apkbuild =
            std::fs::read_to_string(MockEngine::host_dir(&run, "/home/builder/package").join("APKBUILD"))
                .unwrap();
        assert!(apkbuild.contains("source_modname=\"widget\"\n"));
        assert!(apkbuild.contains("repo_owner=\"acme\"\n"));
        assert!(apkbuild.contains("repo_date=\"2024-01-02T03:04:05+01:00\"\n"));
        assert!(apkbuild.ends_with("pkgname=$source_modname\n"));

        let recorded: serde_json::Value =
            serde_json::from_slice(&std::fs::read(run.scratch_root.join(BUILD_RUN_FILE)).unwrap())
                .unwrap();
        assert_eq!(recorded["image_tag"], "widget-apk-builder");
        assert_eq!(recorded["package_format"], "apk");
        assert_eq!(recorded["mounts"].as_array().unwrap().len(), 2);

        std::fs::remove_dir_all(&run.scratch_root).unwrap();
    }

    #[tokio::test]
    async fn dirty_rpm_run_partitions_release() {
        let fx = fixture(None);
        std::fs::write(fx.project.join("README"), "changed\n").unwrap();
        let mut orch = orchestrator(&fx, PackageFormat::Rpm, MockEngine::default());
        orch.settings = keep_scratch(&fx.project, PackageFormat::Rpm);

        let before = chrono::Local::now().fixed_offset();
        orch.run().await.unwrap();

        let release = fx.project.canonicalize().unwrap().join("release");
        assert_eq!(
            release_files(&release),
            vec!["RPMS/widget-1.0-1.x86_64.rpm", "SRPMS/widget-1.0-1.src.rpm"]
        );

        let run = orch.engine().last_run();
        let spec =
            std::fs::read_to_string(MockEngine::host_dir(&run, "/root/rpmbuild/SPECS").join("widget.spec"))
                .unwrap();
        let stamp_line = spec
            .lines()
            .find(|l| l.starts_with("%global pkg_timestamp "))
            .unwrap();
        let stamp = stamp_line.trim_start_matches("%global pkg_timestamp ");
        assert_eq!(stamp.len(), 14);
        assert!(stamp >= before.format("%Y%m%d%H%M%S").to_string().as_str());
        assert!(spec.contains("%global repo_owner %{nil}\n"));
        assert!(MockEngine::host_dir(&run, "/root/rpmbuild/SOURCES")
            .join("widget.tar.gz")
            .is_file());

        std::fs::remove_dir_all(&run.scratch_root).unwrap();
    }

    #[tokio::test]
    async fn unimplemented_formats_leave_release_empty() {
        for format in [PackageFormat::Deb, PackageFormat::Tarball] {
            let fx = fixture(None);
            let release = fx.project.join("release");
            std::fs::create_dir_all(release.join("RPMS")).unwrap();
            std::fs::write(release.join("RPMS/stale.rpm"), "old").unwrap();

            let mut orch = orchestrator(&fx, format, MockEngine::default());
            let outcome = orch.run().await.unwrap();

            assert_eq!(outcome, RunOutcome::NotImplemented(format));
            assert!(release.is_dir());
            assert!(release_files(&release).is_empty());
            assert!(orch.engine().images.lock().unwrap().is_empty());
            assert_eq!(std::fs::read_dir(&fx.scratch_parent).unwrap().count(), 0);
        }
    }

    #[tokio::test]
    async fn failed_build_skips_collection() {
        let fx = fixture(None);
        let mut orch = orchestrator(&fx, PackageFormat::Rpm, MockEngine::failing(137));

        let err = orch.run().await.unwrap_err();
        assert_eq!(orch.state(), RunState::Failed);
        match &err {
            PackagingError::ContainerFailure {
                stage, exit_code, ..
            } => {
                assert_eq!(stage, "run");
                assert_eq!(*exit_code, 137);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(
            err.recovery_suggestions()
                .iter()
                .any(|s| s.contains("memory"))
        );

        let release = fx.project.canonicalize().unwrap().join("release");
        assert!(release_files(&release).is_empty());
        assert_eq!(std::fs::read_dir(&fx.scratch_parent).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rerun_replaces_release_contents() {
        let fx = fixture(None);
        let release = fx.project.canonicalize().unwrap().join("release");

        orchestrator(&fx, PackageFormat::Rpm, MockEngine::default())
            .run()
            .await
            .unwrap();
        std::fs::write(release.join("RPMS/leftover.rpm"), "x").unwrap();

        orchestrator(&fx, PackageFormat::Apk, MockEngine::default())
            .run()
            .await
            .unwrap();
        assert_eq!(release_files(&release), vec!["widget-1.0-r0.apk"]);
    }

    #[tokio::test]
    async fn missing_templates_fail_before_container_work() {
        let fx = fixture(None);
        std::fs::remove_file(fx.project.join("packaging/rpm/widget.spec")).unwrap();
        // Template problems are reported even without a usable runtime.
        let engine = MockEngine {
            unavailable: true,
            ..Default::default()
        };
        let mut orch = orchestrator(&fx, PackageFormat::Rpm, engine);

        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, PackagingError::TemplateMissing { .. }));
        assert!(err.to_string().contains("*.spec"));
        assert!(orch.engine().images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_recipe_is_template_error() {
        let fx = fixture(None);
        std::fs::remove_file(fx.project.join("packaging/apk/Containerfile")).unwrap();
        let engine = MockEngine {
            unavailable: true,
            ..Default::default()
        };
        let mut orch = orchestrator(&fx, PackageFormat::Apk, engine);

        let err = orch.run().await.unwrap_err();
        match err {
            PackagingError::TemplateMissing { pattern, .. } => {
                assert!(pattern.ends_with("Containerfile"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unavailable_runtime_is_config_error() {
        let fx = fixture(None);
        let engine = MockEngine {
            unavailable: true,
            ..Default::default()
        };
        let mut orch = orchestrator(&fx, PackageFormat::Apk, engine);

        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
        assert!(orch.engine().runs.lock().unwrap().is_empty());
    }
}
