//! Source archive creation.
//!
//! Packs the project tree into `<name>.tar.gz` with a single top-level
//! directory named after the project directory, the same shape as a hosted
//! forge tarball. `abuild` and `rpmbuild` both unpack into a directory
//! derived from that name, so the archive has to be built that way.

use crate::error::{PackagingError, Result};
use crate::metadata::RepoMetadata;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File name of the source archive for a run.
///
/// Uses [`RepoMetadata::repo_name`], which build definitions see as `repo_name`.
pub fn archive_file_name(metadata: &RepoMetadata) -> String {
    format!("{}.tar.gz", metadata.repo_name())
}

/// Archives `project_dir` into `dest`.
///
/// `dest` must not be inside `project_dir`. Symlinks are stored as links.
pub async fn archive_tree(project_dir: &Path, dest: &Path) -> Result<PathBuf> {
    let root_name = project_dir
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| PackagingError::Archive {
            source_dir: project_dir.to_path_buf(),
            reason: "project directory has no base name".to_string(),
        })?;

    if dest.starts_with(project_dir) {
        return Err(PackagingError::Archive {
            source_dir: project_dir.to_path_buf(),
            reason: format!("archive {} would be inside the tree", dest.display()),
        });
    }

    let project_dir = project_dir.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let archive_error = |reason: String| PackagingError::Archive {
            source_dir: project_dir.clone(),
            reason,
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| archive_error(format!("creating {}: {}", parent.display(), e)))?;
        }
        let file = File::create(&dest)
            .map_err(|e| archive_error(format!("creating {}: {}", dest.display(), e)))?;

        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.follow_symlinks(false);
        builder
            .append_dir_all(&root_name, &project_dir)
            .map_err(|e| archive_error(e.to_string()))?;
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| archive_error(format!("finishing archive: {}", e)))?;

        log::info!("Archived {} -> {}", project_dir.display(), dest.display());
        Ok(dest)
    })
    .await
    .map_err(|e| PackagingError::Archive {
        source_dir: PathBuf::new(),
        reason: format!("archive task panicked: {}", e),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Origin;
    use chrono::Local;
    use flate2::read::GzDecoder;

    fn metadata(origin: Option<&str>) -> RepoMetadata {
        RepoMetadata {
            software_name: "widget".to_string(),
            commit: None,
            working_tree_dirty: true,
            timestamp: Local::now().fixed_offset(),
            origin: origin.map(Origin::from_url),
        }
    }

    #[test]
    fn archive_named_after_origin_or_software() {
        assert_eq!(
            archive_file_name(&metadata(Some("https://example.com/acme/gizmo.git"))),
            "gizmo.tar.gz"
        );
        assert_eq!(archive_file_name(&metadata(None)), "widget.tar.gz");
    }

    #[tokio::test]
    async fn archive_has_project_dir_as_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("widget");
        std::fs::create_dir_all(project.join("src")).unwrap();
        std::fs::write(project.join("Makefile"), "all:\n").unwrap();
        std::fs::write(project.join("src/widget.c"), "int main(void){return 0;}\n").unwrap();

        let dest = dir.path().join("scratch/SOURCES/widget.tar.gz");
        let out = archive_tree(&project, &dest).await.unwrap();
        assert_eq!(out, dest);

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let paths: Vec<PathBuf> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().into_owned())
            .collect();

        assert!(paths.iter().all(|p| p.starts_with("widget")));
        assert!(paths.contains(&PathBuf::from("widget/Makefile")));
        assert!(paths.contains(&PathBuf::from("widget/src/widget.c")));
    }

    #[tokio::test]
    async fn refuses_archive_inside_tree() {
        let dir = tempfile::tempdir().unwrap();
        let err = archive_tree(dir.path(), &dir.path().join("self.tar.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, PackagingError::Archive { .. }));
    }

    #[tokio::test]
    async fn missing_tree_is_archive_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = archive_tree(&dir.path().join("gone"), &dir.path().join("out/x.tar.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, PackagingError::Archive { .. }));
    }
}
