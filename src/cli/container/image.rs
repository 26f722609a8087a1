//! Builder image construction.

use super::config::IMAGE_BUILD_TIMEOUT;
use super::container_runner::drive_child;
use crate::cli::RuntimeConfig;
use crate::error::{CliError, PackagingError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Builds `image_tag` from recipe text piped on stdin.
///
/// `<runtime> build -t <tag> -` treats stdin as a standalone recipe with an
/// empty context, which podman and docker handle identically. Recipes must
/// therefore not `COPY` from a build context.
///
/// # Returns
///
/// * `Ok(())` - Image built successfully
/// * `Err` - Build could not start, timed out, or exited non-zero
pub async fn build_image(
    program: &Path,
    image_tag: &str,
    recipe: &str,
    runtime_config: &RuntimeConfig,
) -> Result<()> {
    runtime_config.progress(&format!("Building builder image: {}", image_tag));

    let args = ["build", "-t", image_tag, "-"];
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            PackagingError::Cli(CliError::ExecutionFailed {
                command: format!("{} {}", program.display(), args.join(" ")),
                reason: e.to_string(),
            })
        })?;

    let result = drive_child(
        &mut child,
        Some(recipe.as_bytes()),
        IMAGE_BUILD_TIMEOUT,
        "image build",
        runtime_config,
    )
    .await?;

    if !result.success() {
        return Err(PackagingError::ContainerFailure {
            stage: "image build".to_string(),
            exit_code: result.exit_code,
            stderr: result.stderr_lines,
        });
    }

    runtime_config.success(&format!("Builder image {} ready", image_tag));
    Ok(())
}
