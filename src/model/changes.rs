// src/model/changes.rs

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// A single changed file reported by the watcher.
///
/// Equality and hashing only consider the path; the extension is derived data
/// kept around so consumers can filter without touching the path again.
#[derive(Debug, Clone, Eq)]
pub struct ChangedFile {
    path: PathBuf,
    extension: String,
}

impl ChangedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { path, extension }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension including the leading dot (`".rs"`), or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Case-insensitive extension check; accepts `"php"` or `".php"`.
    pub fn has_extension(&self, ext: &str) -> bool {
        let wanted = ext.trim_start_matches('.');
        self.extension
            .trim_start_matches('.')
            .eq_ignore_ascii_case(wanted)
    }
}

impl PartialEq for ChangedFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Hash for ChangedFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Remove duplicate paths, keeping the first occurrence of each.
pub fn dedup_files<I>(files: I) -> Vec<ChangedFile>
where
    I: IntoIterator<Item = ChangedFile>,
{
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.path.clone()))
        .collect()
}

/// Reference from a test target to the project that produces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRef {
    pub name: String,
    /// Framework/version tag (e.g. `"v4.0"`); empty when unknown.
    pub framework: String,
}

impl ProjectRef {
    pub fn new(name: impl Into<String>, framework: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            framework: framework.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_path_only() {
        let a = ChangedFile::new("/src/a.php");
        let b = ChangedFile::new("/src/a.php");
        assert_eq!(a, b);
        assert_eq!(a.extension(), ".php");
        assert!(a.has_extension("PHP"));
        assert!(a.has_extension(".php"));
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let files = dedup_files(vec![
            ChangedFile::new("/b.txt"),
            ChangedFile::new("/a.php"),
            ChangedFile::new("/b.txt"),
        ]);
        let paths: Vec<_> = files.iter().map(|f| f.path().to_path_buf()).collect();
        assert_eq!(paths, vec![PathBuf::from("/b.txt"), PathBuf::from("/a.php")]);
    }

    #[test]
    fn files_without_extension_have_empty_extension() {
        assert_eq!(ChangedFile::new("/Makefile").extension(), "");
    }
}
