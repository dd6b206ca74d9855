//! Source tree enumeration.
//!
//! Walks the content root recursively and returns every file whose extension
//! is in the configured document set. Hidden directories (`.git`, `.obsidian`,
//! ...) are never entered. Symlinks are followed unless
//! `source.follow_symlinks` is off, in which case each one is logged and
//! skipped. Unreadable directories and symlink loops are logged and skipped;
//! the listing is best-effort.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};

pub fn list_documents(source: &SourceConfig) -> Result<Vec<PathBuf>> {
    let root = &source.root;
    let exclude_set = build_globset(&source.exclude_globs)?;
    let extensions: Vec<String> = source
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut paths = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(source.follow_symlinks)
        .into_iter()
        .filter_entry(|entry| !is_hidden_dir(entry));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let at = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warn!(path = %at, error = %e, "could not read directory, skipping");
                continue;
            }
        };
        if entry.path_is_symlink() && !source.follow_symlinks {
            warn!(path = %entry.path().display(), "symlink not followed, skipping");
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !has_document_extension(path, &extensions) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            debug!(path = %relative.display(), "excluded by glob");
            continue;
        }

        paths.push(path.to_path_buf());
    }

    // Sort for deterministic logs
    paths.sort();

    Ok(paths)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}

fn has_document_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            MigrateError::config(format!("invalid exclude glob '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MigrateError::config(format!("invalid exclude globs: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source(root: &Path) -> SourceConfig {
        SourceConfig {
            root: root.to_path_buf(),
            ..SourceConfig::default()
        }
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn relative(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn finds_documents_recursively() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.md");
        touch(tmp.path(), "blog/2024/b.MDX");
        touch(tmp.path(), "blog/c.txt");
        touch(tmp.path(), "notes.markdown");

        let found = list_documents(&source(tmp.path())).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["a.md", "blog/2024/b.MDX"]);
    }

    #[test]
    fn skips_hidden_directories() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), ".git/readme.md");
        touch(tmp.path(), "blog/.drafts/hidden.md");
        touch(tmp.path(), "blog/.visible-file.md");

        let found = list_documents(&source(tmp.path())).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["blog/.visible-file.md"]);
    }

    #[test]
    fn exclude_globs_apply_to_relative_paths() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "keep.md");
        touch(tmp.path(), "archive/old.md");

        let mut cfg = source(tmp.path());
        cfg.exclude_globs = vec!["archive/**".to_string()];
        let found = list_documents(&cfg).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["keep.md"]);
    }

    #[test]
    fn custom_extensions() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.md");
        touch(tmp.path(), "b.txt");

        let mut cfg = source(tmp.path());
        cfg.extensions = vec![".txt".to_string()];
        let found = list_documents(&cfg).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["b.txt"]);
    }

    #[test]
    fn invalid_glob_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = source(tmp.path());
        cfg.exclude_globs = vec!["[".to_string()];
        assert!(matches!(
            list_documents(&cfg),
            Err(MigrateError::Config { .. })
        ));
    }

    #[test]
    fn missing_root_yields_empty_listing() {
        let tmp = TempDir::new().unwrap();
        let found = list_documents(&source(&tmp.path().join("nope"))).unwrap();
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "ok.md");
        touch(tmp.path(), "locked/secret.md");
        let locked = tmp.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind a privileged user.
        let enforced = fs::read_dir(&locked).is_err();
        let found = list_documents(&source(tmp.path()));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if !enforced {
            return;
        }

        let found = found.unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["ok.md"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_follow_the_setting() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().unwrap();
        touch(outside.path(), "shared/linked-dir.md");
        touch(outside.path(), "linked-file.md");

        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "local.md");
        symlink(outside.path().join("shared"), tmp.path().join("shared")).unwrap();
        symlink(
            outside.path().join("linked-file.md"),
            tmp.path().join("linked-file.md"),
        )
        .unwrap();

        let found = list_documents(&source(tmp.path())).unwrap();
        assert_eq!(
            relative(tmp.path(), &found),
            vec!["linked-file.md", "local.md", "shared/linked-dir.md"]
        );

        let mut cfg = source(tmp.path());
        cfg.follow_symlinks = false;
        let found = list_documents(&cfg).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["local.md"]);
    }
}
