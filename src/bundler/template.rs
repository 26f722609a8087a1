//! Build-definition templating.
//!
//! A build definition is a format-native descriptor (`APKBUILD`, `*.spec`)
//! rendered by writing a block of metadata overrides and then the template
//! bytes unchanged. Templates are never edited in place; the combination only
//! exists in the scratch copy.

use super::format::{FormatProfile, OverrideSyntax, TemplateSet, TimestampKey};
use crate::error::{ErrorExt, PackagingError, Result};
use crate::metadata::RepoMetadata;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A rendered build definition in the scratch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDefinition {
    /// Template the definition was rendered from
    pub template: PathBuf,
    /// Rendered file
    pub path: PathBuf,
    /// Override lines, in write order
    pub overrides: Vec<String>,
}

/// Ordered key/value overrides for a format.
pub fn override_pairs(metadata: &RepoMetadata, profile: &FormatProfile) -> Vec<(&'static str, String)> {
    let timestamp = match profile.timestamp_key {
        TimestampKey::RepoDate => ("repo_date", metadata.timestamp_iso()),
        TimestampKey::PkgTimestamp => ("pkg_timestamp", metadata.timestamp_compact()),
    };

    vec![
        ("source_modname", metadata.software_name.clone()),
        ("repo_name", metadata.repo_name().to_string()),
        ("repo_owner", metadata.origin_owner().to_string()),
        ("repo_commit", metadata.commit_or_unknown().to_string()),
        timestamp,
    ]
}

/// Renders one override line in the format's native syntax.
pub fn override_line(syntax: OverrideSyntax, key: &str, value: &str) -> String {
    match syntax {
        OverrideSyntax::Shell => format!("{}=\"{}\"", key, shell_escape(value)),
        // %global with an empty body is an rpmbuild error
        OverrideSyntax::RpmMacro if value.is_empty() => format!("%global {} %{{nil}}", key),
        OverrideSyntax::RpmMacro => format!("%global {} {}", key, value),
    }
}

fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Finds the templates a profile asks for in `template_dir`.
///
/// Returns an empty list when nothing matches. A named set that is only
/// partially present is reported as [`PackagingError::TemplateMissing`].
pub fn find_templates(profile: &FormatProfile, template_dir: &Path) -> Result<Vec<PathBuf>> {
    match &profile.templates {
        TemplateSet::Named(names) => {
            let (present, missing): (Vec<PathBuf>, Vec<PathBuf>) = names
                .iter()
                .map(|name| template_dir.join(name))
                .partition(|path| path.is_file());

            if !present.is_empty()
                && let Some(first_missing) = missing.first()
            {
                return Err(PackagingError::TemplateMissing {
                    format: profile.format.to_string(),
                    pattern: first_missing.display().to_string(),
                });
            }
            Ok(present)
        }
        TemplateSet::Glob(pattern) => {
            let dir = template_dir.to_str().ok_or_else(|| {
                PackagingError::config(format!(
                    "template directory is not valid UTF-8: {}",
                    template_dir.display()
                ))
            })?;
            let full = format!("{}/{}", glob::Pattern::escape(dir), pattern);
            let paths = glob::glob(&full).map_err(|e| {
                PackagingError::config(format!("invalid template pattern {}: {}", full, e))
            })?;

            let mut templates = Vec::new();
            for entry in paths {
                match entry {
                    Ok(path) if path.is_file() => templates.push(path),
                    Ok(_) => {}
                    Err(e) => log::warn!("Skipping unreadable template candidate: {}", e),
                }
            }
            templates.sort();
            Ok(templates)
        }
    }
}

/// Renders every template of the profile into `dest_dir`.
///
/// Each output file has the same name as its template.
pub async fn write_definitions(
    metadata: &RepoMetadata,
    profile: &FormatProfile,
    template_dir: &Path,
    dest_dir: &Path,
) -> Result<Vec<BuildDefinition>> {
    let templates = find_templates(profile, template_dir)?;

    let overrides: Vec<String> = override_pairs(metadata, profile)
        .iter()
        .map(|(key, value)| override_line(profile.syntax, key, value))
        .collect();

    tokio::fs::create_dir_all(dest_dir)
        .await
        .fs_context("creating build definition directory", dest_dir)?;

    let mut definitions = Vec::with_capacity(templates.len());
    for template in templates {
        let Some(file_name) = template.file_name() else {
            continue;
        };
        let path = dest_dir.join(file_name);

        let content = tokio::fs::read(&template)
            .await
            .fs_context("reading template", &template)?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .fs_context("creating build definition", &path)?;
        for line in &overrides {
            file.write_all(line.as_bytes())
                .await
                .fs_context("writing build definition", &path)?;
            file.write_all(b"\n")
                .await
                .fs_context("writing build definition", &path)?;
        }
        file.write_all(&content)
            .await
            .fs_context("writing build definition", &path)?;
        file.flush()
            .await
            .fs_context("flushing build definition", &path)?;

        log::debug!("Rendered {} -> {}", template.display(), path.display());
        definitions.push(BuildDefinition {
            template,
            path,
            overrides: overrides.clone(),
        });
    }

    Ok(definitions)
}
