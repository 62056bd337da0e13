//! Project configuration module.
//!
//! Handles loading and validating `sitkin/config.json`. The file is optional:
//! a project without one builds with the defaults (nothing ignored, every
//! eligible asset hashed, no file sets).
//!
//! ## Config File Location
//!
//! ```text
//! site/
//! ├── sitkin/
//! │   ├── config.json          # This file (optional)
//! │   ├── default.tmpl
//! │   └── posts.tmpl
//! └── posts/
//!     └── 2020-01-01.hello.md
//! ```
//!
//! ## Configuration Options
//!
//! ```json
//! {
//!   "ignore": ["*.sh", "drafts"],
//!   "nohash": ["favicon.ico", "robots.txt"],
//!   "filesets": ["posts"]
//! }
//! ```
//!
//! - `ignore`: globs for paths that are never copied to the output.
//! - `nohash`: globs for paths that keep their name when copied.
//! - `filesets`: names of subdirectories holding dated markdown entries.
//!
//! Globs use shell syntax and are matched against the slash-separated path
//! relative to the project root. `*` does not cross a `/`.
//!
//! Unknown keys are rejected to catch typos early.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Name of the config file inside the template directory.
pub const CONFIG_FILENAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error loading config.json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad {list} glob {pattern:?}: {source}")]
    BadGlob {
        list: &'static str,
        pattern: String,
        source: glob::PatternError,
    },
    #[error("bad file set name {0:?}: must be a single directory name")]
    BadFileSetName(String),
}

/// Project configuration loaded from `sitkin/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Paths that are skipped entirely when copying assets.
    pub ignore: Vec<String>,
    /// Paths that are copied without a content hash in their name.
    pub nohash: Vec<String>,
    /// Subdirectories (and same-named templates) that form file sets.
    pub filesets: Vec<String>,
}

impl Config {
    /// Whether `name` is one of the declared file sets.
    pub fn is_file_set(&self, name: &str) -> bool {
        self.filesets.iter().any(|n| n == name)
    }

    /// Compile the glob lists, failing on the first invalid pattern.
    pub fn matcher(&self) -> Result<PathMatcher, ConfigError> {
        Ok(PathMatcher {
            ignore: compile_globs("ignore", &self.ignore)?,
            nohash: compile_globs("nohash", &self.nohash)?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.filesets {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(ConfigError::BadFileSetName(name.clone()));
            }
        }
        Ok(())
    }
}

/// Compiled `ignore` / `nohash` globs.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    ignore: Vec<Pattern>,
    nohash: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl PathMatcher {
    /// Whether the slash-separated relative path is ignored.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        matches_any(&self.ignore, rel_path)
    }

    /// Whether the slash-separated relative path is exempt from hashing.
    pub fn is_nohash(&self, rel_path: &str) -> bool {
        matches_any(&self.nohash, rel_path)
    }
}

fn matches_any(patterns: &[Pattern], rel_path: &str) -> bool {
    patterns
        .iter()
        .any(|p| p.matches_with(rel_path, MATCH_OPTIONS))
}

fn compile_globs(list: &'static str, globs: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|source| ConfigError::BadGlob {
                list,
                pattern: g.clone(),
                source,
            })
        })
        .collect()
}

/// Load `config.json` from the template directory.
///
/// Returns the defaults if the file does not exist. Returns `Err` if the
/// file exists but is not valid JSON, has unknown keys, or declares a glob
/// that does not compile.
pub fn load_config(template_dir: &Path) -> Result<(Config, PathMatcher), ConfigError> {
    let config_path = template_dir.join(CONFIG_FILENAME);
    let content = match fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok((Config::default(), PathMatcher::default()));
        }
        Err(e) => return Err(e.into()),
    };
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    let matcher = config.matcher()?;
    Ok((config, matcher))
}
