// SPDX-License-Identifier: MIT OR Apache-2.0

//! File scanner using the ignore crate (same as ripgrep)

use anyhow::{bail, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Directories never descended into.
const SKIP_DIRS: &[&str] = &[".git", ".vecstash"];

/// Extensions treated as text when walking a directory.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "adoc", "org", "tex", "csv", "tsv", "log", "json", "jsonl",
    "yaml", "yml", "toml", "ini", "xml", "html", "htm", "rs", "py", "js", "ts", "go", "java",
    "c", "h", "cpp", "hpp", "rb", "sh", "sql",
];

/// Lists the text files to ingest under a path.
///
/// A file path is returned as-is, whatever its extension. A directory is
/// walked recursively, honouring `.gitignore`, and only files with a known
/// text extension are kept.
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns matching file paths, sorted for a stable ingestion order.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        if !self.root.is_dir() {
            bail!("Path not found: {}", self.root.display());
        }

        let (tx, rx) = mpsc::channel();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !SKIP_DIRS.contains(&name))
                    .unwrap_or(true)
            })
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();
            Box::new(move |entry| {
                if let Ok(entry) = entry {
                    let path = entry.path();
                    if path.is_file() && is_text_file(path) {
                        let _ = tx.send(path.to_path_buf());
                    }
                }
                ignore::WalkState::Continue
            })
        });

        drop(tx);
        let mut files: Vec<PathBuf> = rx.into_iter().collect();
        files.sort();
        Ok(files)
    }
}

/// Whether a path has one of the known text extensions.
pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lists_text_files_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs/nested")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("docs/b.md"), "b").unwrap();
        fs::write(dir.path().join("docs/nested/c.TXT"), "c").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let files = FileScanner::new(dir.path()).list_files().unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "c.TXT"]);
    }

    #[test]
    fn skips_store_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".vecstash")).unwrap();
        fs::write(dir.path().join(".vecstash/notes.txt"), "x").unwrap();
        fs::write(dir.path().join("keep.txt"), "y").unwrap();

        let files = FileScanner::new(dir.path()).list_files().unwrap();
        assert_eq!(files, vec![dir.path().join("keep.txt")]);
    }

    #[test]
    fn single_file_any_extension() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("README");
        fs::write(&file, "hello").unwrap();

        assert_eq!(FileScanner::new(&file).list_files().unwrap(), vec![file]);
    }

    #[test]
    fn missing_path_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(FileScanner::new(dir.path().join("absent")).list_files().is_err());
    }
}
