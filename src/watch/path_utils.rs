// src/watch/path_utils.rs

//! Path helpers shared by the watcher and the project graph.

use std::path::{Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Tries a plain `strip_prefix` first, then again on canonicalized paths
/// (symlinked roots such as `/private/var` on macOS). Returns `None` if the
/// path is not below `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_forward_slashes(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize())
        && let Ok(rel) = path_canon.strip_prefix(&root_canon)
    {
        return Some(to_forward_slashes(rel));
    }

    None
}

/// Directory to watch for a watch token: the token itself, or its parent when
/// the token names a file. A bare file name resolves to `"."`.
pub fn watch_dir_for(token: &Path) -> PathBuf {
    if token.is_file() {
        token
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        token.to_path_buf()
    }
}

fn to_forward_slashes(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_use_forward_slashes() {
        assert_eq!(
            relative_str(Path::new("/repo"), Path::new("/repo/src/a.cs")).as_deref(),
            Some("src/a.cs")
        );
        assert_eq!(relative_str(Path::new("/repo"), Path::new("/elsewhere/a.cs")), None);
    }

    #[test]
    fn file_token_watches_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Solution.sln");
        std::fs::write(&file, "").unwrap();
        assert_eq!(watch_dir_for(&file), dir.path());
        assert_eq!(watch_dir_for(dir.path()), dir.path());
    }

    #[test]
    fn bare_file_name_watches_current_dir() {
        // Test binaries run with the package root as working directory.
        let root = watch_dir_for(Path::new("Cargo.toml"));
        assert_eq!(root, Path::new("."));
        assert!(root.join("Cargo.toml").is_file());
    }
}
