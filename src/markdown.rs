//! Markdown to HTML conversion.
//!
//! A pure function over [pulldown-cmark](https://docs.rs/pulldown-cmark) with
//! the GitHub-flavoured extensions (tables, footnotes, strikethrough, task
//! lists) and smart punctuation turned on.

use pulldown_cmark::{Options, Parser, html};

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
}

/// Render a markdown document to an HTML fragment.
pub fn render_markdown(input: &str) -> String {
    let parser = Parser::new_ext(input, options());
    let mut out = String::with_capacity(input.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
