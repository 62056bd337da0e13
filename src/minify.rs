//! HTML minification.
//!
//! A [`Minifier`] is built once per build and handed to the renderer, so
//! repeated builds in one process (dev mode) never share state.

use minify_html::Cfg;
use std::io::{self, Read, Write};

#[derive(Clone)]
pub struct Minifier {
    cfg: Cfg,
}

impl Default for Minifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Minifier {
    pub fn new() -> Self {
        let mut cfg = Cfg::new();
        cfg.minify_css = true;
        // Keep `<!doctype html>` exactly as the template wrote it.
        cfg.do_not_minify_doctype = true;
        Self { cfg }
    }

    /// Minify an HTML document held in memory.
    pub fn minify_bytes(&self, html: &[u8]) -> Vec<u8> {
        minify_html::minify(html, &self.cfg)
    }

    /// Read a whole HTML document from `input` and write it minified to `out`.
    pub fn minify<R: Read, W: Write>(&self, mut input: R, mut out: W) -> io::Result<()> {
        let mut html = Vec::new();
        input.read_to_end(&mut html)?;
        out.write_all(&self.minify_bytes(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_between_tags() {
        let m = Minifier::new();
        let out = m.minify_bytes(b"<ol>\n  <li>one</li>\n  <li>two</li>\n</ol>\n");
        let out = String::from_utf8(out).unwrap();
        assert!(!out.contains('\n'));
        assert!(out.contains("one"));
        assert!(out.contains("two"));
    }

    #[test]
    fn reader_to_writer() {
        let m = Minifier::new();
        let mut out = Vec::new();
        m.minify(&b"<p>  hello   world  </p>"[..], &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("hello world"));
        assert!(out.len() < "<p>  hello   world  </p>".len());
    }

    #[test]
    fn keeps_text_content() {
        let m = Minifier::new();
        let out = m.minify_bytes("<h1>Über</h1><p>a &amp; b</p>".as_bytes());
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Über"));
        assert!(out.starts_with("<h1>"));
    }
}
