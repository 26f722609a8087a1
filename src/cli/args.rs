//! Command line argument parsing and validation.
//!
//! Every option can also be supplied through a `DISTPACK_*` environment
//! variable; explicit flags win.

use crate::bundler::{ContainerRuntime, PackageFormat, Settings, SettingsBuilder};
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

/// Containerized distribution package builder
#[derive(Parser, Debug)]
#[command(
    name = "distpack",
    version,
    about = "Builds distribution packages for a checkout inside an ephemeral container",
    long_about = "Builds distribution packages (apk, rpm) for a source checkout.

Build definitions are rendered from templates under <packaging>/<format>/ with
repository metadata prepended, the tree is archived, and the format's build tool
runs inside a freshly built builder image. Finished packages are copied to the
release directory, which is wiped at the start of every run.

Usage:
  distpack --runtime podman --package-system apk
  distpack --runtime docker --package-system rpm --project-dir ~/src/widget -v
  DISTPACK_RUNTIME=podman distpack --package-system rpm --keep-tmp

Exit code 0 = every required package is in the release directory."
)]
pub struct Args {
    /// Container runtime used to build and run the builder image
    #[arg(short = 'r', long, value_enum, env = "DISTPACK_RUNTIME")]
    pub runtime: ContainerRuntime,

    /// Package system to build for
    #[arg(short = 'p', long, value_enum, env = "DISTPACK_PACKAGE_SYSTEM")]
    pub package_system: PackageFormat,

    /// Software name (default: project directory name)
    #[arg(short = 'n', long, value_name = "NAME", env = "DISTPACK_SOFTWARE_NAME")]
    pub software_name: Option<String>,

    /// Keep the scratch directory and print its path
    #[arg(short = 'k', long, env = "DISTPACK_KEEP_TMP")]
    pub keep_tmp: bool,

    /// Increase verbosity; lists scratch contents at the end of the run
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Checkout to package
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Template root containing one directory per format
    /// (default: <project-dir>/packaging)
    #[arg(long, value_name = "DIR", env = "DISTPACK_PACKAGING_DIR")]
    pub packaging_dir: Option<PathBuf>,

    /// Output directory for finished packages (default: <project-dir>/release)
    #[arg(long, value_name = "DIR", env = "DISTPACK_RELEASE_DIR")]
    pub release_dir: Option<PathBuf>,

    /// Runtime executable to invoke instead of looking up podman/docker on PATH
    #[arg(long, value_name = "PATH", env = "DISTPACK_RUNTIME_BIN")]
    pub runtime_bin: Option<PathBuf>,
}

impl Args {
    /// Validates arguments and resolves them into [`Settings`].
    pub fn to_settings(&self) -> Result<Settings> {
        SettingsBuilder::new()
            .runtime(self.runtime)
            .runtime_program(self.runtime_bin.as_ref())
            .package_format(self.package_system)
            .software_name(self.software_name.clone())
            .keep_scratch(self.keep_tmp)
            .verbosity(self.verbose)
            .project_dir(&self.project_dir)
            .packaging_dir(self.packaging_dir.as_ref())
            .release_dir(self.release_dir.as_ref())
            .build()
    }

    /// Default `env_logger` filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for styled terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose > 0, args.quiet)
    }
}

impl RuntimeConfig {
    /// Creates a runtime configuration.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(verbose, quiet),
        }
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) {
        self.output.verbose(message)
    }

    /// Print informational message if not in quiet mode
    pub fn info(&self, message: &str) {
        self.output.info(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) {
        self.output.success(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) {
        self.output.warn(message)
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        self.output.error(message)
    }

    /// Print recovery hint
    pub fn hint(&self, message: &str) {
        self.output.hint(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        self.output.indent(message)
    }
}
