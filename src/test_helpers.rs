//! Shared test utilities for the sitkin test suite.
//!
//! [`TestProject`] is a throwaway project directory with helpers to write
//! input files and inspect output files by slash-separated relative path.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let p = TestProject::new();
//! p.write("sitkin/default.tmpl", "<p>{{{contents}}}</p>");
//! p.write("about.md", "# About");
//!
//! let project = Project::load(p.root(), false, false).unwrap();
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Minimal default layout: the whole page is the overridable `contents` block.
pub const PLAIN_LAYOUT: &str = "{{#> contents}}{{{contents}}}{{/contents}}";

pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// A project with `sitkin/default.tmpl` set to [`PLAIN_LAYOUT`].
    pub fn with_layout() -> Self {
        let p = Self::new();
        p.write("sitkin/default.tmpl", PLAIN_LAYOUT);
        p
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
    }

    pub fn mkdir(&self, rel: &str) {
        fs::create_dir_all(self.path(rel)).unwrap();
    }

    /// Read a file. Panics with the missing path if it does not exist.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel))
            .unwrap_or_else(|e| panic!("cannot read '{rel}': {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Names of the entries in a directory, sorted.
    pub fn list(&self, rel: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path(rel))
            .unwrap_or_else(|e| panic!("cannot list '{rel}': {e}"))
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
