//! Rendering a loaded project to the output tree.
//!
//! Stage 2 of the build. The renderer consumes a [`Project`] and writes
//! `gen/` from scratch:
//!
//! 1. Delete and recreate the output directory.
//! 2. Copy every asset (names were decided at load time).
//! 3. Run each markdown body as a text template and convert it to HTML.
//! 4. Render file-set entries, top-level markdown, `*.tmpl` pages and
//!    `*.tpl` text files against the shared site context.
//!
//! HTML output has its asset links rewritten to hashed names and is then
//! minified. Text output is written as produced.
//!
//! ## Output Layout
//!
//! ```text
//! gen/
//! ├── posts/hello.html      # file-set entry
//! ├── about.html            # top-level markdown
//! ├── index.html            # top-level *.tmpl
//! ├── feed.xml              # top-level *.tpl
//! └── assets/x.<token>.css  # copied asset
//! ```
//!
//! Every output file is created exclusively: two inputs that map to the same
//! output path fail the build instead of overwriting each other.
//!
//! ## Context
//!
//! All documents share:
//!
//! ```json
//! {
//!   "dev_mode": false,
//!   "file_sets": {
//!     "posts": { "name": "posts", "last_date": "2020-01-01", "files": [ ... ] }
//!   }
//! }
//! ```
//!
//! Markdown documents add `name`, `date`, `metadata` and `contents`.

use crate::copy::CopyError;
use crate::markdown::render_markdown;
use crate::minify::Minifier;
use crate::project::{FileSet, MarkdownFile, Project};
use crate::rewrite::rewrite_links;
use crate::template::TemplateKind;
use handlebars::Context;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("error executing template for {output}: {source}")]
    Template {
        output: String,
        source: Box<handlebars::RenderError>,
    },
    #[error("output file {0} already exists")]
    OutputExists(PathBuf),
    #[error("error building template context: {0}")]
    Context(#[from] serde_json::Error),
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Copy(#[from] CopyError),
}

impl RenderError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> RenderError + '_ {
        move |source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn template(output: &str) -> impl FnOnce(handlebars::RenderError) -> RenderError + '_ {
        move |source| RenderError::Template {
            output: output.to_string(),
            source: Box::new(source),
        }
    }
}

/// Counts of what one render wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Assets copied.
    pub assets: usize,
    /// Assets copied under a hashed name.
    pub hashed: usize,
    /// HTML documents written.
    pub pages: usize,
    /// Plain-text documents written.
    pub text_files: usize,
    /// Links pointed at hashed assets.
    pub rewritten_links: usize,
}

#[derive(Serialize)]
struct SiteContext<'a> {
    dev_mode: bool,
    file_sets: BTreeMap<&'a str, &'a FileSet>,
}

/// Writes a [`Project`] to its output directory.
pub struct Renderer {
    minifier: Minifier,
}

impl Renderer {
    pub fn new(minifier: Minifier) -> Self {
        Self { minifier }
    }

    pub fn render(&self, mut project: Project) -> Result<RenderStats, RenderError> {
        let out = project.output_dir();
        reset_dir(&out)?;

        let mut stats = RenderStats::default();
        for file in &project.copy_files {
            file.copy(&project.root, &out)?;
            stats.assets += 1;
            if file.is_hashed() {
                stats.hashed += 1;
            }
        }

        let body_context = json!({ "dev_mode": project.dev_mode });
        let templates = &project.templates;
        for doc in project
            .file_sets
            .iter_mut()
            .flat_map(|s| s.files.iter_mut())
            .chain(project.markdown.iter_mut())
        {
            let body = templates
                .render(TemplateKind::Body, &doc.id, &body_context)
                .map_err(RenderError::template(&doc.id))?;
            doc.contents = render_markdown(&body);
        }

        let site = Context::from(serde_json::to_value(SiteContext {
            dev_mode: project.dev_mode,
            file_sets: project
                .file_sets
                .iter()
                .map(|s| (s.name.as_str(), s))
                .collect(),
        })?);
        let mut documents = DocumentContext::new(&site);

        let mut page = PageWriter {
            out: &out,
            project: &project,
            minifier: &self.minifier,
            stats: &mut stats,
        };
        for doc in project
            .file_sets
            .iter()
            .flat_map(|s| &s.files)
            .chain(&project.markdown)
        {
            let context = documents.with(doc)?;
            page.html(TemplateKind::Layout, &doc.template, &doc.output_path(), context)?;
        }
        for file in &project.pages {
            page.html(TemplateKind::Page, &file.name, &format!("{}.html", file.name), &site)?;
        }
        for file in &project.text_files {
            page.text(&file.name, &site)?;
        }

        debug!(?stats, output = %out.display(), "render finished");
        Ok(stats)
    }
}

struct PageWriter<'a> {
    out: &'a Path,
    project: &'a Project,
    minifier: &'a Minifier,
    stats: &'a mut RenderStats,
}

impl PageWriter<'_> {
    /// Render an HTML document, rewrite its asset links and write it minified.
    fn html(
        &mut self,
        kind: TemplateKind,
        template: &str,
        output: &str,
        context: &Context,
    ) -> Result<(), RenderError> {
        let html = self
            .project
            .templates
            .render_context(kind, template, context)
            .map_err(RenderError::template(output))?;
        let rewritten = rewrite_links(&html, &self.project.hash_assets);
        for link in &rewritten.relative {
            warn!(document = output, %link, "relative link not rewritten");
        }
        self.stats.rewritten_links += rewritten.rewritten;

        let path = self.out.join(output);
        let file = create_new(&path)?;
        self.minifier
            .minify(rewritten.html.as_bytes(), file)
            .map_err(RenderError::io(&path))?;
        self.stats.pages += 1;
        Ok(())
    }

    /// Render a plain-text document as is.
    fn text(&mut self, name: &str, context: &Context) -> Result<(), RenderError> {
        let text = self
            .project
            .templates
            .render_context(TemplateKind::Text, name, context)
            .map_err(RenderError::template(name))?;
        let path = self.out.join(name);
        let mut file = create_new(&path)?;
        file.write_all(text.as_bytes())
            .map_err(RenderError::io(&path))?;
        self.stats.text_files += 1;
        Ok(())
    }
}

/// Site context with the current document's fields laid over it.
///
/// The site data is copied once per render. Every document serializes the
/// same set of fields, so each one fully replaces the previous document's.
struct DocumentContext(Context);

impl DocumentContext {
    fn new(site: &Context) -> Self {
        Self(Context::from(site.data().clone()))
    }

    fn with(&mut self, doc: &MarkdownFile) -> Result<&Context, RenderError> {
        if let (Value::Object(context), Value::Object(fields)) =
            (self.0.data_mut(), serde_json::to_value(doc)?)
        {
            context.extend(fields);
        }
        Ok(&self.0)
    }
}

fn reset_dir(dir: &Path) -> Result<(), RenderError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(RenderError::io(dir)(e)),
    }
    fs::create_dir_all(dir).map_err(RenderError::io(dir))
}

/// Create a file that must not exist yet, along with its parent directories.
fn create_new(path: &Path) -> Result<File, RenderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(RenderError::io(parent))?;
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => RenderError::OutputExists(path.to_path_buf()),
            _ => RenderError::io(path)(e),
        })
}
