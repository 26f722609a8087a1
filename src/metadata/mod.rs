//! Repository metadata for the checkout being packaged.
//!
//! Everything here is read-only: a handful of `git` queries run in the project
//! directory. None of them can fail the run. A missing repository, a missing
//! remote or a missing `git` binary all degrade to the unresolved variants.

use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Rendering used for absent commit and origin URL.
pub const UNKNOWN: &str = "unknown";

/// Remote `origin` of the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    /// Fetch URL as configured
    pub url: String,
    /// Last path segment, without `.git`
    pub name: String,
    /// Path segment before the name (empty if the URL has only one segment)
    pub owner: String,
}

impl Origin {
    /// Derives name and owner by splitting the URL on path separators.
    ///
    /// Both `https://host/owner/name(.git)` and scp-style
    /// `git@host:owner/name(.git)` remotes are understood.
    pub fn from_url(url: &str) -> Self {
        let trimmed = url.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let mut segments = trimmed.rsplit(['/', ':']).filter(|s| !s.is_empty());
        let name = segments.next().unwrap_or_default().to_string();
        let owner = segments.next().unwrap_or_default().to_string();

        Self {
            url: url.trim().to_string(),
            name,
            owner,
        }
    }
}

/// Identifying facts about the checkout, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoMetadata {
    /// Name used for image tags and override blocks
    pub software_name: String,
    /// Full HEAD commit id, `None` outside a repository
    pub commit: Option<String>,
    /// Tracked changes relative to HEAD (always true outside a repository)
    pub working_tree_dirty: bool,
    /// Commit date for clean trees, wall-clock time otherwise
    pub timestamp: DateTime<FixedOffset>,
    /// Remote `origin`, `None` if absent
    pub origin: Option<Origin>,
}

impl RepoMetadata {
    /// Resolves metadata for `project_dir`.
    ///
    /// `software_name` overrides the directory base name.
    pub async fn resolve(project_dir: &Path, software_name: Option<&str>) -> Self {
        let software_name = software_name
            .map(str::to_string)
            .or_else(|| {
                project_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| UNKNOWN.to_string());

        let commit = git(project_dir, &["rev-parse", "--verify", "HEAD"])
            .await
            .filter(|c| !c.is_empty());

        let working_tree_dirty = match &commit {
            Some(_) => git(
                project_dir,
                &["status", "--porcelain", "--untracked-files=no"],
            )
            .await
            .is_none_or(|status| !status.is_empty()),
            None => true,
        };

        let commit_date = if working_tree_dirty {
            None
        } else {
            git(project_dir, &["show", "-s", "--format=%cI", "HEAD"])
                .await
                .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                    Ok(date) => Some(date),
                    Err(e) => {
                        log::debug!("Unparseable commit date '{}': {}", raw, e);
                        None
                    }
                })
        };
        let timestamp = commit_date.unwrap_or_else(|| Local::now().fixed_offset());

        let origin = git(project_dir, &["remote", "get-url", "origin"])
            .await
            .filter(|url| !url.is_empty())
            .map(|url| Origin::from_url(&url));

        let metadata = Self {
            software_name,
            commit,
            working_tree_dirty,
            timestamp,
            origin,
        };
        log::info!(
            "Resolved {} at {} (dirty: {}, origin: {})",
            metadata.software_name,
            metadata.commit_or_unknown(),
            metadata.working_tree_dirty,
            metadata.origin_url_or_unknown()
        );
        metadata
    }

    /// HEAD commit or `"unknown"`.
    pub fn commit_or_unknown(&self) -> &str {
        self.commit.as_deref().unwrap_or(UNKNOWN)
    }

    /// Origin URL or `"unknown"`.
    pub fn origin_url_or_unknown(&self) -> &str {
        match &self.origin {
            Some(origin) => &origin.url,
            None => UNKNOWN,
        }
    }

    /// Origin repository name, empty when unresolved.
    pub fn origin_name(&self) -> &str {
        match &self.origin {
            Some(origin) => &origin.name,
            None => "",
        }
    }

    /// Repository name used for the source archive and the `repo_name`
    /// override: the origin name, or the software name without an origin.
    pub fn repo_name(&self) -> &str {
        match self.origin_name() {
            "" => &self.software_name,
            name => name,
        }
    }

    /// Origin repository owner, empty when unresolved.
    pub fn origin_owner(&self) -> &str {
        match &self.origin {
            Some(origin) => &origin.owner,
            None => "",
        }
    }

    /// Strict ISO-8601 timestamp with explicit offset.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
    }

    /// Compact timestamp safe for RPM `Release:` tags.
    pub fn timestamp_compact(&self) -> String {
        self.timestamp.format("%Y%m%d%H%M%S").to_string()
    }
}

/// Runs a git query, returning trimmed stdout on success.
async fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(output) => {
            log::debug!(
                "git {} exited with {:?}: {}",
                args.join(" "),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            None
        }
        Err(e) => {
            log::debug!("Failed to run git {}: {}", args.join(" "), e);
            None
        }
    }
}
