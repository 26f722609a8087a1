//! Container runtime availability checking.

use crate::cli::RuntimeConfig;
use crate::error::{PackagingError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;

use super::config::RUNTIME_INFO_TIMEOUT;

/// Resolves the runtime executable on `PATH` (or checks an explicit path).
pub fn locate_program(program: &Path) -> Result<PathBuf> {
    match which::which(program) {
        Ok(path) => {
            log::debug!("Found container runtime at: {}", path.display());
            Ok(path)
        }
        Err(e) => Err(PackagingError::config(format!(
            "container runtime '{}' not found: {}",
            program.display(),
            e
        ))),
    }
}

/// Checks that the runtime responds to `info`.
///
/// # Returns
///
/// * `Ok(())` - Runtime is usable
/// * `Err` - Probe timed out, failed to spawn, or exited unsuccessfully
pub async fn check_runtime_available(program: &Path, runtime_config: &RuntimeConfig) -> Result<()> {
    runtime_config.verbose_println(&format!("Probing {} info", program.display()));

    let status_result = timeout(
        RUNTIME_INFO_TIMEOUT,
        Command::new(program)
            .arg("info")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status(),
    )
    .await;

    match status_result {
        Err(_) => Err(PackagingError::config(format!(
            "{} info timed out after {} seconds; is the runtime service responding?",
            program.display(),
            RUNTIME_INFO_TIMEOUT.as_secs()
        ))),
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(PackagingError::config(format!(
            "{} info exited with code {}; ensure the runtime is installed and its daemon or socket is running",
            program.display(),
            status.code().unwrap_or(-1)
        ))),
        Ok(Err(e)) => Err(PackagingError::config(format!(
            "failed to execute {}: {}",
            program.display(),
            e
        ))),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-runtime");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn missing_program_is_config_error() {
        let err = locate_program(Path::new("distpack-no-such-runtime")).unwrap_err();
        assert!(matches!(err, PackagingError::Config { .. }));
    }

    #[tokio::test]
    async fn healthy_runtime_passes() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exit 0");
        let located = locate_program(&program).unwrap();
        check_runtime_available(&located, &RuntimeConfig::new(false, true))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failing_probe_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exit 125");
        let err = check_runtime_available(&program, &RuntimeConfig::new(false, true))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("125"));
    }
}
