//! Project manifest construction.
//!
//! Walks an extracted project directory and records every file and
//! directory relative to the root. Entries are emitted in pre-order with
//! siblings sorted by name, so the manifest order is stable across runs.
//! Symbolic links are skipped to keep the walk inside the project root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use codewarden_core::types::ManifestEntry;

/// Build the manifest for `root`.
///
/// The filesystem walk runs on the blocking thread pool.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory.
pub async fn build_manifest(root: &Path) -> Result<Vec<ManifestEntry>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || walk(&root))
        .await
        .map_err(|e| anyhow::anyhow!("manifest walk task failed: {}", e))?
}

/// Render entries as the raw manifest JSON stored on a project.
pub fn to_manifest_value(entries: &[ManifestEntry]) -> Result<serde_json::Value> {
    serde_json::to_value(entries).context("failed to serialize manifest")
}

/// Must be called from a blocking context.
fn walk(root: &Path) -> Result<Vec<ManifestEntry>> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("cannot access project root {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("project root {} is not a directory", root.display());
    }

    let mut entries = Vec::new();
    visit(root, PathBuf::new(), &mut entries)?;
    Ok(entries)
}

fn visit(dir: &Path, relative: PathBuf, out: &mut Vec<ManifestEntry>) -> Result<()> {
    let mut children: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to read directory entry");
                None
            }
        })
        .collect();
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let file_type = match child.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::warn!(path = %child.path().display(), error = %e, "failed to stat entry");
                continue;
            }
        };
        if file_type.is_symlink() {
            tracing::debug!(path = %child.path().display(), "skipping symlink");
            continue;
        }

        let child_relative = relative.join(child.file_name());
        let manifest_path = to_manifest_path(&child_relative);

        if file_type.is_dir() {
            out.push(ManifestEntry::dir(manifest_path));
            visit(&child.path(), child_relative, out)?;
        } else if file_type.is_file() {
            let size = child.metadata().map(|m| m.len()).unwrap_or(0);
            out.push(ManifestEntry::file(manifest_path, size));
        }
    }

    Ok(())
}

/// Manifest paths always use `/` separators.
fn to_manifest_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_path_uses_forward_slashes() {
        let path: PathBuf = ["src", "bin", "main.rs"].iter().collect();
        assert_eq!(to_manifest_path(&path), "src/bin/main.rs");
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_manifest(&dir.path().join("nope")).await.unwrap_err();
        assert!(err.to_string().contains("cannot access project root"));
    }
}
