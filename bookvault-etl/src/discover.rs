//! CSV source file discovery
//!
//! Recursive traversal of the source folder, keeping only `.csv` entries.
//! Input files are read-only: discovery never touches file contents beyond
//! metadata, and never modifies anything under the source folder.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Discovery errors
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// CSV file discovery over a source folder
pub struct CsvDiscovery {
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl CsvDiscovery {
    /// Create discovery with default ignore patterns
    ///
    /// Ignores system entries like .DS_Store, Thumbs.db, .git, etc.
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
            max_depth: None,
        }
    }

    /// Scan the source folder for CSV files
    ///
    /// Unreadable entries are logged and skipped; they never abort the
    /// scan. Results are sorted so chunk assignment is deterministic for a
    /// given directory state.
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, DiscoverError> {
        if !root_path.exists() {
            return Err(DiscoverError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(DiscoverError::NotADirectory(root_path.to_path_buf()));
        }

        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_csv(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }

        files.sort();

        tracing::debug!(files_found = files.len(), "CSV discovery complete");

        Ok(files)
    }

    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        for pattern in &self.ignore_patterns {
            if file_name.contains(pattern) {
                return false;
            }
        }

        true
    }
}

impl Default for CsvDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_csv_extension_detection() {
        assert!(is_csv(Path::new("books.csv")));
        assert!(is_csv(Path::new("BOOKS.CSV")));
        assert!(!is_csv(Path::new("books.txt")));
        assert!(!is_csv(Path::new("books")));
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let discovery = CsvDiscovery::new();
        let result = discovery.scan(Path::new("/nonexistent/path"));
        assert!(matches!(result, Err(DiscoverError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "Id,Name\n").unwrap();
        fs::write(dir.path().join("a.csv"), "Id,Name\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a csv").unwrap();

        let discovery = CsvDiscovery::new();
        let files = discovery.scan(dir.path()).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = TempDir::new().unwrap();
        let discovery = CsvDiscovery::new();
        let files = discovery.scan(dir.path()).unwrap();
        assert!(files.is_empty());
    }
}
