//! Release directory management and artifact harvesting.

use crate::bundler::OutputDecl;
use crate::bundler::builder::calculate_sha256;
use crate::cli::RuntimeConfig;
use crate::error::{ErrorExt, PackagingError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One package copied into the release directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseArtifact {
    /// Location in the release directory
    pub path: PathBuf,
    /// Location it was harvested from
    pub source: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Hex-encoded SHA-256
    pub sha256: String,
}

/// Everything a successful run placed in the release directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseArtifactSet {
    /// Release directory root
    pub release_dir: PathBuf,
    /// Collected packages, in collection order
    pub artifacts: Vec<ReleaseArtifact>,
}

/// Artifact manager for the persistent release directory.
pub struct ArtifactManager {
    release_dir: PathBuf,
}

impl ArtifactManager {
    /// Creates a new artifact manager.
    pub fn new(release_dir: PathBuf) -> Self {
        Self { release_dir }
    }

    /// Wipes and recreates the release directory.
    ///
    /// Called at the start of every run so no artifact of a previous run
    /// survives, whatever the outcome of this one.
    pub async fn reset_release_dir(&self, runtime_config: &RuntimeConfig) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.release_dir).await {
            Ok(()) => runtime_config.verbose_println(&format!(
                "Cleared release directory: {}",
                self.release_dir.display()
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).fs_context("clearing release directory", &self.release_dir),
        }
        tokio::fs::create_dir_all(&self.release_dir)
            .await
            .fs_context("creating release directory", &self.release_dir)
    }

    /// Copies every declared output from `scratch_root` into the release directory.
    ///
    /// # Errors
    ///
    /// [`PackagingError::ArtifactCollection`] when a required declaration
    /// matches no regular file, two artifacts share a release path, or a
    /// copy fails.
    pub async fn collect(
        &self,
        scratch_root: &Path,
        outputs: &[OutputDecl],
        runtime_config: &RuntimeConfig,
    ) -> Result<ReleaseArtifactSet> {
        let mut artifacts = Vec::new();
        let mut seen = HashSet::new();

        for decl in outputs {
            let matches = discover(scratch_root, decl.pattern)?;
            runtime_config.verbose_println(&format!(
                "{} file(s) match {}",
                matches.len(),
                decl.pattern
            ));

            if matches.is_empty() {
                if decl.required {
                    return Err(self.no_artifacts_error(scratch_root, decl).await);
                }
                log::info!("No optional artifacts matched {}", decl.pattern);
                continue;
            }

            let dest_dir = self.release_dir.join(decl.release_subdir);
            tokio::fs::create_dir_all(&dest_dir)
                .await
                .fs_context("creating release subdirectory", &dest_dir)?;

            for source in matches {
                let Some(file_name) = source.file_name() else {
                    continue;
                };
                let dest = dest_dir.join(file_name);
                if !seen.insert(dest.clone()) {
                    return Err(PackagingError::ArtifactCollection {
                        reason: format!(
                            "two artifacts would be copied to {}; second source: {}",
                            dest.display(),
                            source.display()
                        ),
                    });
                }

                let size = tokio::fs::copy(&source, &dest).await.map_err(|e| {
                    PackagingError::ArtifactCollection {
                        reason: format!(
                            "failed to copy {} to {}: {}",
                            source.display(),
                            dest.display(),
                            e
                        ),
                    }
                })?;
                let sha256 = calculate_sha256(&dest).await?;

                runtime_config.indent(&format!("✓ {} ({} bytes)", dest.display(), size));
                log::info!("{}  {}", sha256, dest.display());
                artifacts.push(ReleaseArtifact {
                    path: dest,
                    source,
                    size,
                    sha256,
                });
            }
        }

        Ok(ReleaseArtifactSet {
            release_dir: self.release_dir.clone(),
            artifacts,
        })
    }

    /// Formats error when a required declaration matched nothing.
    async fn no_artifacts_error(&self, scratch_root: &Path, decl: &OutputDecl) -> PackagingError {
        let scratch_root = scratch_root.to_path_buf();
        let listing = tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(&scratch_root)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| {
                    let size = e.metadata().ok().map(|m| m.len()).unwrap_or(0);
                    e.path()
                        .strip_prefix(&scratch_root)
                        .ok()
                        .map(|rel| format!("  [FILE] {} ({} bytes)", rel.display(), size))
                })
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_else(|_| vec!["  [Task panicked while reading directory]".to_string()]);

        let contents = if listing.is_empty() {
            "  (no files)".to_string()
        } else {
            listing.join("\n")
        };

        PackagingError::ArtifactCollection {
            reason: format!(
                "build reported success but nothing matched {}\n\nScratch contents:\n{}",
                decl.pattern, contents
            ),
        }
    }
}

/// Regular files (not symlinks) under `root` matching a relative glob, sorted.
fn discover(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let root_str = root.to_str().ok_or_else(|| PackagingError::ArtifactCollection {
        reason: format!("scratch root is not valid UTF-8: {}", root.display()),
    })?;
    let full = format!("{}/{}", glob::Pattern::escape(root_str), pattern);
    let paths = glob::glob(&full).map_err(|e| PackagingError::ArtifactCollection {
        reason: format!("invalid artifact pattern {}: {}", full, e),
    })?;

    let mut found = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| PackagingError::ArtifactCollection {
            reason: format!("failed to scan for artifacts: {}", e),
        })?;
        let metadata = std::fs::symlink_metadata(&path).fs_context("reading file metadata", &path)?;
        if metadata.is_file() {
            found.push(path);
        } else {
            log::debug!("Skipping non-regular file: {}", path.display());
        }
    }
    found.sort();
    Ok(found)
}
