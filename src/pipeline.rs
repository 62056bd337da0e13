//! One complete build: load, then render.
//!
//! Each call builds a fresh [`Project`] and a fresh [`Minifier`], so repeated
//! builds in one process (the dev loop) share nothing.

use crate::minify::Minifier;
use crate::project::{LoadError, Project};
use crate::render::{RenderError, RenderStats, Renderer};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

/// What a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub output_dir: PathBuf,
    pub render: RenderStats,
    pub elapsed: Duration,
}

/// Build the project in `dir` into `dir/gen`.
pub fn build(dir: &Path, dev_mode: bool, verbose: bool) -> Result<BuildStats, BuildError> {
    let start = Instant::now();
    let project = Project::load(dir, dev_mode, verbose)?;
    let output_dir = project.output_dir();
    let render = Renderer::new(Minifier::new()).render(project)?;
    Ok(BuildStats {
        output_dir,
        render,
        elapsed: start.elapsed(),
    })
}
