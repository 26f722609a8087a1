//! Scratch root ownership.

use crate::error::{ErrorExt, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Uniquely named working directory for one run.
///
/// Normally created under the system temp directory. Removed recursively on
/// drop unless retention was requested, so every exit path (including `?`
/// early returns) cleans up.
#[derive(Debug)]
pub struct ScratchRoot {
    path: PathBuf,
    retain: bool,
}

impl ScratchRoot {
    /// Creates `distpack-<uuid>` under `parent`.
    pub fn create_in(parent: &Path, retain: bool) -> Result<Self> {
        let path = parent.join(format!("distpack-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).fs_context("creating scratch root", &path)?;
        log::debug!("Created scratch root {}", path.display());
        Ok(Self { path, retain })
    }

    /// Absolute path of the scratch root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a subdirectory, without creating it.
    pub fn join(&self, subdir: &str) -> PathBuf {
        self.path.join(subdir)
    }

    /// Whether the directory survives the guard.
    pub fn is_retained(&self) -> bool {
        self.retain
    }

    /// Lists every path below the root, relative to it, sorted.
    pub fn listing(&self) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(&self.path)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.path().strip_prefix(&self.path).ok().map(Path::to_path_buf))
            .collect();
        entries.sort();
        entries
    }
}

impl Drop for ScratchRoot {
    fn drop(&mut self) {
        if self.retain {
            log::info!("Keeping scratch root {}", self.path.display());
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("Removed scratch root {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove scratch root {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
