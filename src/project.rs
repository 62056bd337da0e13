//! Project loading.
//!
//! Stage 1 of the build. Reads a project directory once and produces a
//! [`Project`]: the validated, fully resolved model the renderer consumes.
//! Nothing is written to disk here, so a failed load leaves the previous
//! output untouched.
//!
//! ## Directory Structure
//!
//! ```text
//! site/
//! ├── sitkin/
//! │   ├── config.json              # optional
//! │   ├── default.tmpl             # root layout (required)
//! │   └── posts.tmpl               # layout for the "posts" file set
//! ├── posts/                       # file set (declared in config.json)
//! │   ├── 2020-01-01.hello.md      # → gen/posts/hello.html
//! │   └── 2020-02-01.second.md
//! ├── index.tmpl                   # → gen/index.html
//! ├── feed.xml.tpl                 # → gen/feed.xml (plain text)
//! ├── about.md                     # → gen/about.html
//! ├── assets/                      # copied, content-hashed
//! └── gen/                         # output, never read
//! ```
//!
//! ## Classification
//!
//! Top-level entries are classified by name alone ([`classify`]), then folded
//! into the project. Entries whose name starts with `.`, or whose base name
//! (up to the first `.`) is `sitkin` or `gen`, are skipped.
//!
//! ## Validation
//!
//! - `sitkin/` must exist and `sitkin/default.tmpl` must parse.
//! - Every declared file set needs a same-named template and directory.
//! - Entry names within a file set are unique.
//! - Metadata blocks must be closed and hold a JSON object.
//! - A `"template"` named in metadata must exist.
//!
//! Stray files in a file-set directory are skipped with a warning.

use crate::config::{self, Config, ConfigError, PathMatcher};
use crate::copy::{self, CopyError, CopyFile, HashAssets};
use crate::metadata::{self, Metadata, MetadataError};
use crate::naming::{self, MARKDOWN_EXT};
use crate::template::{DEFAULT_TEMPLATE, SourceError, TemplateKind, Templates};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Directory holding layouts and `config.json`.
pub const TEMPLATE_DIR: &str = "sitkin";
/// Output directory, deleted and recreated by every build.
pub const OUTPUT_DIR: &str = "gen";

const TEMPLATE_EXT: &str = "tmpl";
const TEXT_TEMPLATE_EXT: &str = "tpl";
const TEMPLATE_KEY: &str = "template";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{path}: {reason}")]
    ProjectStructure { path: PathBuf, reason: String },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("duplicate entry {name:?} in file set {file_set:?}")]
    DuplicateEntry { file_set: String, name: String },
    #[error("malformed metadata in {path}: {source}")]
    MalformedMetadata {
        path: PathBuf,
        source: MetadataError,
    },
    #[error("no template {template:?} for {used_by}")]
    MissingTemplate { template: String, used_by: String },
    #[error("template error in {path}: {source}")]
    Template {
        path: PathBuf,
        source: Box<SourceError>,
    },
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Copy(#[from] CopyError),
}

impl LoadError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> LoadError + '_ {
        move |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn template(path: &Path) -> impl FnOnce(SourceError) -> LoadError + '_ {
        move |source| LoadError::Template {
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    }

    fn structure(path: &Path, reason: impl Into<String>) -> LoadError {
        LoadError::ProjectStructure {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// A markdown document: a file-set entry or a top-level `.md` file.
///
/// Serializes to the fields templates see: `name`, `date`, `metadata` and
/// `contents`.
#[derive(Debug, Clone, Serialize)]
pub struct MarkdownFile {
    /// Entry name (file sets) or file stem (top level).
    pub name: String,
    /// Date prefix of a file-set entry.
    pub date: Option<NaiveDate>,
    pub metadata: Option<Metadata>,
    /// Rendered HTML body. Empty until the renderer fills it in.
    pub contents: String,
    /// Layout the document renders with.
    #[serde(skip)]
    pub template: String,
    /// Output path relative to the output root, without `.html`.
    #[serde(skip)]
    pub id: String,
}

impl MarkdownFile {
    /// Output path relative to the output root.
    pub fn output_path(&self) -> String {
        format!("{}.html", self.id)
    }
}

/// A named collection of dated entries, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct FileSet {
    pub name: String,
    pub files: Vec<MarkdownFile>,
    /// Date of the newest entry.
    pub last_date: Option<NaiveDate>,
}

/// A top-level `*.tmpl` page or `*.tpl` text file, by output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub name: String,
}

/// What a top-level entry is, decided from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Template,
    TextTemplate,
    Markdown,
    FileSet,
    CopyCandidate,
}

/// Classify a top-level directory entry. `None` means skip it.
pub fn classify(name: &str, is_dir: bool, config: &Config) -> Option<EntryKind> {
    let base = name.split('.').next().unwrap_or(name);
    if name.starts_with('.') || base == TEMPLATE_DIR || base == OUTPUT_DIR {
        return None;
    }
    if is_dir {
        return Some(if config.is_file_set(name) {
            EntryKind::FileSet
        } else {
            EntryKind::CopyCandidate
        });
    }
    Some(match naming::split_extension(name).1 {
        Some(TEMPLATE_EXT) => EntryKind::Template,
        Some(TEXT_TEMPLATE_EXT) => EntryKind::TextTemplate,
        Some(MARKDOWN_EXT) => EntryKind::Markdown,
        _ => EntryKind::CopyCandidate,
    })
}

/// Classified top-level entries, grouped by kind, in name order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Entries {
    pub templates: Vec<String>,
    pub text_templates: Vec<String>,
    pub markdown: Vec<String>,
    pub file_sets: Vec<String>,
    pub copy_candidates: Vec<String>,
}

impl FromIterator<(String, EntryKind)> for Entries {
    fn from_iter<I: IntoIterator<Item = (String, EntryKind)>>(iter: I) -> Self {
        let mut entries = Entries::default();
        for (name, kind) in iter {
            let list = match kind {
                EntryKind::Template => &mut entries.templates,
                EntryKind::TextTemplate => &mut entries.text_templates,
                EntryKind::Markdown => &mut entries.markdown,
                EntryKind::FileSet => &mut entries.file_sets,
                EntryKind::CopyCandidate => &mut entries.copy_candidates,
            };
            list.push(name);
        }
        entries
    }
}

/// Everything one build needs, loaded and validated.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub dev_mode: bool,
    pub config: Config,
    pub templates: Templates,
    pub file_sets: Vec<FileSet>,
    /// Top-level `*.tmpl` files.
    pub pages: Vec<TemplateFile>,
    /// Top-level `*.tpl` files.
    pub text_files: Vec<TemplateFile>,
    /// Top-level `*.md` files.
    pub markdown: Vec<MarkdownFile>,
    pub copy_files: Vec<CopyFile>,
    pub hash_assets: HashAssets,
}

impl Project {
    /// Load the project rooted at `root`.
    ///
    /// `dev_mode` disables content hashing of assets. `verbose` only adds
    /// diagnostic logging.
    pub fn load(root: &Path, dev_mode: bool, verbose: bool) -> Result<Project, LoadError> {
        let template_dir = root.join(TEMPLATE_DIR);
        match fs::metadata(&template_dir) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => return Err(LoadError::structure(&template_dir, "not a directory")),
            Err(e) => {
                return Err(LoadError::structure(
                    &template_dir,
                    format!("missing template directory: {e}"),
                ));
            }
        }

        let mut templates = load_default_template(&template_dir)?;
        let (config, matcher) = config::load_config(&template_dir)?;
        load_layouts(&template_dir, &mut templates)?;

        let mut used = BTreeSet::new();
        let mut file_sets = Vec::with_capacity(config.filesets.len());
        for name in &config.filesets {
            file_sets.push(load_file_set(root, name, &mut templates)?);
            used.insert(name.clone());
        }

        let entries: Entries = read_dir_sorted(root)?
            .into_iter()
            .filter_map(|(name, is_dir)| classify(&name, is_dir, &config).map(|k| (name, k)))
            .collect();

        let mut pages = Vec::new();
        for name in &entries.templates {
            let path = root.join(name);
            let source = fs::read_to_string(&path).map_err(LoadError::io(&path))?;
            let stem = naming::split_extension(name).0;
            templates
                .add_page(stem, &source)
                .map_err(LoadError::template(&path))?;
            pages.push(TemplateFile {
                name: stem.to_string(),
            });
        }

        let mut text_files = Vec::new();
        for name in &entries.text_templates {
            let path = root.join(name);
            let source = fs::read_to_string(&path).map_err(LoadError::io(&path))?;
            let stem = naming::split_extension(name).0;
            templates
                .add_text(TemplateKind::Text, stem, &source)
                .map_err(LoadError::template(&path))?;
            text_files.push(TemplateFile {
                name: stem.to_string(),
            });
        }

        let mut markdown = Vec::new();
        for name in &entries.markdown {
            let stem = naming::split_extension(name).0;
            let default = if templates.has_layout(stem) {
                stem
            } else {
                DEFAULT_TEMPLATE
            };
            let doc = load_markdown(
                &root.join(name),
                stem.to_string(),
                stem.to_string(),
                None,
                default,
                &mut templates,
            )?;
            markdown.push(doc);
        }
        used.extend(
            file_sets
                .iter()
                .flat_map(|s| &s.files)
                .chain(&markdown)
                .map(|doc| doc.template.clone()),
        );

        let (copy_files, hash_assets) =
            discover_assets(root, &entries.copy_candidates, &matcher, dev_mode)?;
        if verbose {
            for (original, hashed) in hash_assets.iter() {
                info!(%original, %hashed, "hashed asset");
            }
        }
        templates.set_hash_assets(&hash_assets);

        let unused: Vec<&str> = templates
            .declared_layouts()
            .filter(|name| !used.contains(*name))
            .collect();
        if !unused.is_empty() {
            warn!(templates = ?unused, "unused templates");
        }

        debug!(
            file_sets = file_sets.len(),
            pages = pages.len(),
            text_files = text_files.len(),
            markdown = markdown.len(),
            assets = copy_files.len(),
            "project loaded"
        );

        Ok(Project {
            root: root.to_path_buf(),
            dev_mode,
            config,
            templates,
            file_sets,
            pages,
            text_files,
            markdown,
            copy_files,
            hash_assets,
        })
    }

    /// Absolute output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }
}

fn load_default_template(template_dir: &Path) -> Result<Templates, LoadError> {
    let path = template_dir.join(format!("{DEFAULT_TEMPLATE}.{TEMPLATE_EXT}"));
    let source = fs::read_to_string(&path)
        .map_err(|e| LoadError::structure(&path, format!("cannot read default template: {e}")))?;
    Templates::new(&source)
        .map_err(|e| LoadError::structure(&path, format!("invalid default template: {e}")))
}

/// Register every `sitkin/*.tmpl` other than the default.
fn load_layouts(template_dir: &Path, templates: &mut Templates) -> Result<(), LoadError> {
    for (name, is_dir) in read_dir_sorted(template_dir)? {
        if is_dir {
            continue;
        }
        let (stem, ext) = naming::split_extension(&name);
        if ext != Some(TEMPLATE_EXT) || stem == DEFAULT_TEMPLATE {
            continue;
        }
        let path = template_dir.join(&name);
        let source = fs::read_to_string(&path).map_err(LoadError::io(&path))?;
        templates
            .add_layout(stem, &source)
            .map_err(LoadError::template(&path))?;
    }
    Ok(())
}

fn load_file_set(root: &Path, name: &str, templates: &mut Templates) -> Result<FileSet, LoadError> {
    if !templates.has_layout(name) {
        return Err(LoadError::MissingTemplate {
            template: name.to_string(),
            used_by: format!("file set {name:?}"),
        });
    }
    let dir = root.join(name);
    if !dir.is_dir() {
        return Err(LoadError::structure(&dir, "file set directory missing"));
    }

    let mut files: Vec<MarkdownFile> = Vec::new();
    let mut seen = BTreeSet::new();
    for (filename, is_dir) in read_dir_sorted(&dir)? {
        if filename.starts_with('.') {
            debug!(file_set = name, file = %filename, "skipping hidden file");
            continue;
        }
        if is_dir {
            warn!(file_set = name, file = %filename, "skipping directory in file set");
            continue;
        }
        let entry = match naming::parse_entry_filename(&filename) {
            Ok(entry) => entry,
            Err(issue) => {
                warn!(file_set = name, file = %filename, "skipping file: {issue}");
                continue;
            }
        };
        if !seen.insert(entry.name.clone()) {
            return Err(LoadError::DuplicateEntry {
                file_set: name.to_string(),
                name: entry.name,
            });
        }
        let id = format!("{name}/{}", entry.name);
        files.push(load_markdown(
            &dir.join(&filename),
            id,
            entry.name,
            Some(entry.date),
            name,
            templates,
        )?);
    }

    files.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
    let last_date = files.first().and_then(|f| f.date);
    Ok(FileSet {
        name: name.to_string(),
        files,
        last_date,
    })
}

/// Read a markdown file, split off its metadata and register its body.
fn load_markdown(
    path: &Path,
    id: String,
    name: String,
    date: Option<NaiveDate>,
    default_template: &str,
    templates: &mut Templates,
) -> Result<MarkdownFile, LoadError> {
    let raw = fs::read(path).map_err(LoadError::io(path))?;
    let (metadata, body) =
        metadata::split_metadata(&raw).map_err(|source| LoadError::MalformedMetadata {
            path: path.to_path_buf(),
            source,
        })?;
    let body = std::str::from_utf8(body)
        .map_err(|e| LoadError::io(path)(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let template = match metadata.as_ref().and_then(|m| m.get(TEMPLATE_KEY)) {
        None => default_template.to_string(),
        Some(value) => {
            let requested = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            if !templates.has_layout(&requested) {
                return Err(LoadError::MissingTemplate {
                    template: requested,
                    used_by: path.display().to_string(),
                });
            }
            requested
        }
    };

    templates
        .add_text(TemplateKind::Body, &id, body)
        .map_err(LoadError::template(path))?;
    Ok(MarkdownFile {
        name,
        date,
        metadata,
        contents: String::new(),
        template,
        id,
    })
}

/// Discover every copy candidate and collect the renames.
fn discover_assets(
    root: &Path,
    names: &[String],
    matcher: &PathMatcher,
    dev_mode: bool,
) -> Result<(Vec<CopyFile>, HashAssets), LoadError> {
    let mut files = Vec::new();
    for name in names {
        files.extend(copy::discover(root, name, matcher, dev_mode)?);
    }
    let assets = files.iter().filter_map(CopyFile::urls).collect();
    Ok((files, assets))
}

/// Names of a directory's entries with their is-directory flag, sorted.
fn read_dir_sorted(dir: &Path) -> Result<Vec<(String, bool)>, LoadError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(LoadError::io(dir))? {
        let entry = entry.map_err(LoadError::io(dir))?;
        let path = entry.path();
        let is_dir = path.is_dir();
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    entries.sort();
    Ok(entries)
}
