//! Container invocation limits.

use std::time::Duration;

/// Timeout for the runtime `info` probe (10 seconds)
/// Podman may need to start its user service on first use
pub const RUNTIME_INFO_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for builder image builds (30 minutes)
/// Image builds can take a long time due to base image downloads and package installs
pub const IMAGE_BUILD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Timeout for the package build container (60 minutes)
/// Kernel module packages compile against full kernel headers
pub const CONTAINER_RUN_TIMEOUT: Duration = Duration::from_secs(3600);

/// Grace period for reaping a killed child process
pub const KILL_GRACE: Duration = Duration::from_secs(10);

/// Number of trailing stderr lines kept for failure diagnostics
pub const STDERR_TAIL_LINES: usize = 40;
