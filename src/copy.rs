//! Content-addressed asset copying.
//!
//! Every top-level entry that is not a template, markdown file or file set is
//! an asset: it is copied to the output tree as-is. Most assets get a content
//! hash in their name so they can be served with far-future cache headers:
//!
//! ```text
//! assets/css/x.css  →  gen/assets/css/x.<token>.css
//! ```
//!
//! A file keeps its name when any of these hold:
//!
//! - the build is in dev mode,
//! - it has no extension or the `.html` extension (entry points reached by
//!   fixed URLs),
//! - it matches a `nohash` glob.
//!
//! Files matching an `ignore` glob are not copied at all; an ignored
//! directory is not descended into.
//!
//! ## Two phases
//!
//! [`discover`] runs at load time. It walks the tree, decides every file's
//! destination name and computes hash tokens, so the full
//! [`HashAssets`] map exists before any template is executed.
//! [`CopyFile::copy`] runs at render time and materializes one file.
//!
//! Copies are atomic per file: content goes to a temporary sibling which is
//! then renamed over the destination.

use crate::config::PathMatcher;
use crate::hash;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("error walking files to copy: {0}")]
    Walk(#[from] walkdir::Error),
}

impl CopyError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> CopyError + '_ {
        move |source| CopyError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A file to copy from the project to the output tree.
///
/// Both paths are slash-separated and relative to their roots. They differ
/// only when the file is content-hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFile {
    pub src_path: String,
    pub dst_path: String,
}

impl CopyFile {
    /// Whether the destination name carries a hash token.
    pub fn is_hashed(&self) -> bool {
        self.src_path != self.dst_path
    }

    /// Site URLs `(original, hashed)` for a hashed file.
    pub fn urls(&self) -> Option<(String, String)> {
        self.is_hashed()
            .then(|| (format!("/{}", self.src_path), format!("/{}", self.dst_path)))
    }

    /// Copy the file from `src_root` into `dst_root`, atomically.
    pub fn copy(&self, src_root: &Path, dst_root: &Path) -> Result<(), CopyError> {
        let src = src_root.join(&self.src_path);
        let dst = dst_root.join(&self.dst_path);
        let parent = dst.parent().unwrap_or(dst_root);
        fs::create_dir_all(parent).map_err(CopyError::io(parent))?;

        let mut input = File::open(&src).map_err(CopyError::io(&src))?;
        let permissions = input
            .metadata()
            .map_err(CopyError::io(&src))?
            .permissions();

        let file_name = dst
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(CopyError::io(parent))?;
        io::copy(&mut input, tmp.as_file_mut()).map_err(CopyError::io(&dst))?;
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(CopyError::io(&dst))?;
        tmp.persist(&dst).map_err(|e| CopyError::Io {
            path: dst.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Run-scoped map from original asset URLs to hashed asset URLs.
///
/// `"/styles/x.css"` → `"/styles/x.<token>.css"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashAssets(BTreeMap<String, String>);

impl HashAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original: impl Into<String>, hashed: impl Into<String>) {
        self.0.insert(original.into(), hashed.into());
    }

    /// Hashed URL for an original URL, if the asset was renamed.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.0.get(original).map(String::as_str)
    }

    /// Hashed URL for `href`, or `href` itself.
    pub fn resolve<'a>(&'a self, href: &'a str) -> &'a str {
        self.get(href).unwrap_or(href)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pairs in original-URL order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for HashAssets {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Discover the files to copy under `root/name`.
///
/// `name` is a direct child of `root` (file or directory). Globs are matched
/// against paths relative to `root`. Files come back in path order.
pub fn discover(
    root: &Path,
    name: &str,
    matcher: &PathMatcher,
    dev_mode: bool,
) -> Result<Vec<CopyFile>, CopyError> {
    let walker = WalkDir::new(root.join(name))
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            relative_slash_path(root, entry.path())
                .map(|rel| !matcher.is_ignored(&rel))
                .unwrap_or(true)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let Some(rel) = relative_slash_path(root, path) else {
            continue;
        };
        let dst_path = if should_hash(&rel, path, matcher, dev_mode) {
            let token = hash::hash_file(path).map_err(CopyError::io(path))?;
            hash::hashed_name(&rel, &token)
        } else {
            rel.clone()
        };
        files.push(CopyFile {
            src_path: rel,
            dst_path,
        });
    }
    Ok(files)
}

/// Copy every non-ignored file under `src_root` into `dst_root`.
///
/// Returns the renames performed; files that kept their name are not listed.
pub fn copy_tree(
    dst_root: &Path,
    src_root: &Path,
    matcher: &PathMatcher,
    dev_mode: bool,
) -> Result<HashAssets, CopyError> {
    let mut names: Vec<String> = fs::read_dir(src_root)
        .map_err(CopyError::io(src_root))?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()
        .map_err(CopyError::io(src_root))?;
    names.sort();

    let mut renames = HashAssets::new();
    for name in &names {
        for file in discover(src_root, name, matcher, dev_mode)? {
            file.copy(src_root, dst_root)?;
            if let Some((original, hashed)) = file.urls() {
                renames.insert(original, hashed);
            }
        }
    }
    Ok(renames)
}

fn should_hash(rel: &str, path: &Path, matcher: &PathMatcher, dev_mode: bool) -> bool {
    if dev_mode {
        return false;
    }
    match path.extension() {
        None => false,
        Some(ext) if ext == "html" => false,
        Some(_) => !matcher.is_nohash(rel),
    }
}

/// `path` relative to `root`, with `/` separators. `None` for `root` itself
/// or paths outside it.
pub(crate) fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
