//! # Sitkin
//!
//! A small static site generator. A project directory holds Handlebars
//! layouts, markdown documents, dated markdown collections ("file sets") and
//! plain assets; a build turns it into `gen/`, a static site with
//! content-hashed asset names and minified HTML.
//!
//! # Architecture: Two-Stage Pipeline
//!
//! ```text
//! 1. Load     site/  →  Project   (classify, parse, validate, decide asset names)
//! 2. Render   Project →  site/gen/ (copy assets, run templates, rewrite, minify)
//! ```
//!
//! Loading never writes, so every structural, configuration or content
//! problem is reported before the previous output is touched. Rendering
//! starts by deleting `gen/`, so every build starts from a clean slate and
//! two builds of the same inputs produce identical trees.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`project`] | Stage 1 — classifies the project directory and builds the [`Project`] model |
//! | [`render`] | Stage 2 — writes the output tree from a [`Project`] |
//! | [`pipeline`] | One load + render cycle ([`build`]) with timing |
//! | [`config`] | `sitkin/config.json` loading and glob compilation |
//! | [`template`] | Handlebars registries, layout composition, template helpers |
//! | [`copy`] | Content-addressed asset discovery and atomic copying |
//! | [`hash`] | Content hash tokens and hashed file names |
//! | [`rewrite`] | Points asset links in rendered HTML at hashed names |
//! | [`metadata`] | JSON metadata blocks at the top of markdown files |
//! | [`naming`] | `<YYYY-MM-DD>.<name>.md` file-set entry names |
//! | [`markdown`] | Markdown to HTML |
//! | [`minify`] | HTML minification |
//! | [`output`] | CLI output formatting |
//! | [`watch`] | Debounced filesystem watcher for the dev loop |
//! | [`serve`] | Dev HTTP server for `gen/` |
//!
//! # Design Decisions
//!
//! ## Asset Names Are Decided at Load Time
//!
//! Link rewriting needs the full map from original to hashed asset URLs.
//! The loader hashes every asset while discovering it, so the map is
//! complete before any template runs. Templates can also ask for a hashed
//! URL directly with the `link` helper, which reads the same map.
//!
//! ## Layout Composition
//!
//! Every template in `sitkin/` and every top-level `*.tmpl` is the default
//! layout plus its own inline partials. See [`template::compose_template`].
//!
//! ## Strict Templates
//!
//! Referencing a field the context does not have is a build error, not an
//! empty string, so a mismatch between a template and its content shows up
//! at build time instead of as a broken page.

pub mod config;
pub mod copy;
pub mod hash;
pub mod markdown;
pub mod metadata;
pub mod minify;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod project;
pub mod render;
pub mod rewrite;
pub mod serve;
pub mod template;
pub mod watch;

pub use config::Config;
pub use copy::HashAssets;
pub use minify::Minifier;
pub use pipeline::{BuildError, BuildStats, build};
pub use project::{LoadError, Project};
pub use render::{RenderError, RenderStats, Renderer};

#[cfg(test)]
pub(crate) mod test_helpers;
