//! Template registry and helpers.
//!
//! Templates use [Handlebars](https://docs.rs/handlebars). A project has one
//! root layout, `sitkin/default.tmpl`, which marks the regions other
//! templates may replace with partial blocks:
//!
//! ```handlebars
//! <html><body>
//! {{#> contents}}{{{contents}}}{{/contents}}
//! </body></html>
//! ```
//!
//! Every other `*.tmpl` only defines inline partials for those regions:
//!
//! ```handlebars
//! {{#*inline "contents"}}<h1>{{metadata.title}}</h1>{{{contents}}}{{/inline}}
//! ```
//!
//! [`compose_template`] turns such a file into a full page template: its
//! inline definitions followed by the layout body. Anything outside the
//! inline definitions is dropped.
//!
//! ## Registries
//!
//! HTML templates (`*.tmpl`) render with HTML escaping. Text templates
//! (`*.tpl`) and markdown bodies render without escaping. Both registries
//! are strict: referencing a missing field is an error.
//!
//! `contents` holds rendered HTML, so HTML templates must emit it with
//! triple braces (`{{{contents}}}`). An escaping `{{contents}}` in a layout
//! or page is rejected when the template is loaded.
//!
//! ## Helpers
//!
//! - `{{link "/assets/x.css"}}` — hashed URL of an asset.
//! - `{{format_rfc3339 date}}` — `2020-01-01` → `2020-01-01T00:00:00Z`.
//! - `{{xml_escape text}}` — escapes `& < > " '` for XML output.

use crate::copy::HashAssets;
use chrono::NaiveDate;
use handlebars::template::TemplateElement;
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    Template, TemplateError, no_escape,
};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Name of the root layout.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Field holding a document's rendered HTML.
const CONTENTS_FIELD: &str = "contents";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Syntax(#[from] TemplateError),
    #[error("{{{{{expr}}}}} escapes rendered HTML, write {{{{{{{expr}}}}}}} instead")]
    EscapedContents { expr: String },
}

/// Which kind of input a registered template came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// `sitkin/*.tmpl`, addressable by name.
    Layout,
    /// Top-level `*.tmpl`.
    Page,
    /// Top-level `*.tpl`.
    Text,
    /// Templated markdown body.
    Body,
}

impl TemplateKind {
    fn key(self, name: &str) -> String {
        let prefix = match self {
            Self::Layout => "layout",
            Self::Page => "page",
            Self::Text => "text",
            Self::Body => "body",
        };
        format!("{prefix}:{name}")
    }

    fn is_html(self) -> bool {
        matches!(self, Self::Layout | Self::Page)
    }
}

/// Build a page template from the layout plus an override's inline partials.
pub fn compose_template(layout: &Template, overrides: &str) -> Result<Template, TemplateError> {
    let parsed = Template::compile(overrides)?;
    let keep: Vec<usize> = parsed
        .elements
        .iter()
        .enumerate()
        .filter(|(_, e)| is_definition(e))
        .map(|(i, _)| i)
        .collect();

    let mut composed = parsed.clone();
    composed.elements = keep.iter().map(|&i| parsed.elements[i].clone()).collect();
    composed.mapping = keep
        .iter()
        .filter_map(|&i| parsed.mapping.get(i).cloned())
        .collect();
    composed.elements.extend(layout.elements.iter().cloned());
    composed.mapping.extend(layout.mapping.iter().cloned());
    Ok(composed)
}

fn is_definition(element: &TemplateElement) -> bool {
    matches!(
        element,
        TemplateElement::DecoratorBlock(_) | TemplateElement::DecoratorExpression(_)
    )
}

/// First double-brace expression naming `contents` (`{{contents}}`,
/// `{{this.contents}}`, `{{../contents}}`), searched through nested blocks.
pub fn find_escaped_contents(template: &Template) -> Option<String> {
    template.elements.iter().find_map(|element| match element {
        TemplateElement::Expression(expr) => expr
            .name
            .as_name()
            .filter(|name| name.rsplit(['.', '/']).next() == Some(CONTENTS_FIELD))
            .map(str::to_string),
        TemplateElement::HelperBlock(block) => block
            .template
            .iter()
            .chain(&block.inverse)
            .find_map(find_escaped_contents),
        TemplateElement::DecoratorBlock(block) | TemplateElement::PartialBlock(block) => {
            block.template.as_ref().and_then(find_escaped_contents)
        }
        _ => None,
    })
}

fn check_html(template: &Template) -> Result<(), SourceError> {
    match find_escaped_contents(template) {
        Some(expr) => Err(SourceError::EscapedContents { expr }),
        None => Ok(()),
    }
}

/// All compiled templates of one build.
pub struct Templates {
    html: Handlebars<'static>,
    text: Handlebars<'static>,
    layout: Template,
    layouts: BTreeSet<String>,
}

impl Templates {
    /// Start a registry from the default layout's source.
    pub fn new(default_source: &str) -> Result<Self, SourceError> {
        let mut layout = Template::compile(default_source)?;
        check_html(&layout)?;
        layout.name = Some(TemplateKind::Layout.key(DEFAULT_TEMPLATE));

        let mut html = Handlebars::new();
        html.set_strict_mode(true);
        let mut text = Handlebars::new();
        text.set_strict_mode(true);
        text.register_escape_fn(no_escape);
        for registry in [&mut html, &mut text] {
            registry.register_helper("format_rfc3339", Box::new(format_rfc3339));
            registry.register_helper("xml_escape", Box::new(xml_escape));
            registry.register_helper("link", Box::new(LinkHelper::default()));
        }

        let mut templates = Self {
            html,
            text,
            layout: layout.clone(),
            layouts: BTreeSet::new(),
        };
        templates.insert(TemplateKind::Layout, DEFAULT_TEMPLATE, layout);
        Ok(templates)
    }

    /// Register a named layout (`sitkin/<name>.tmpl`) derived from the default.
    pub fn add_layout(&mut self, name: &str, source: &str) -> Result<(), SourceError> {
        let composed = compose_template(&self.layout, source)?;
        check_html(&composed)?;
        self.insert(TemplateKind::Layout, name, composed);
        Ok(())
    }

    /// Register a top-level page template derived from the default.
    pub fn add_page(&mut self, name: &str, source: &str) -> Result<(), SourceError> {
        let composed = compose_template(&self.layout, source)?;
        check_html(&composed)?;
        self.insert(TemplateKind::Page, name, composed);
        Ok(())
    }

    /// Register a plain-text template (`*.tpl` or a markdown body).
    pub fn add_text(&mut self, kind: TemplateKind, name: &str, source: &str) -> Result<(), SourceError> {
        let template = Template::compile(source)?;
        self.insert(kind, name, template);
        Ok(())
    }

    fn insert(&mut self, kind: TemplateKind, name: &str, mut template: Template) {
        let key = kind.key(name);
        template.name = Some(key.clone());
        if kind == TemplateKind::Layout {
            self.layouts.insert(name.to_string());
        }
        let registry = if kind.is_html() {
            &mut self.html
        } else {
            &mut self.text
        };
        registry.register_template(&key, template);
    }

    /// Whether a layout with this name exists (including `default`).
    pub fn has_layout(&self, name: &str) -> bool {
        self.layouts.contains(name)
    }

    /// Names of the layouts other than `default`, sorted.
    pub fn declared_layouts(&self) -> impl Iterator<Item = &str> {
        self.layouts
            .iter()
            .map(String::as_str)
            .filter(|n| *n != DEFAULT_TEMPLATE)
    }

    /// Make the hash-asset map available to the `link` helper.
    pub fn set_hash_assets(&mut self, assets: &HashAssets) {
        for registry in [&mut self.html, &mut self.text] {
            registry.register_helper(
                "link",
                Box::new(LinkHelper {
                    assets: assets.clone(),
                }),
            );
        }
    }

    /// Execute a registered template.
    pub fn render<T: Serialize>(
        &self,
        kind: TemplateKind,
        name: &str,
        data: &T,
    ) -> Result<String, RenderError> {
        self.registry(kind).render(&kind.key(name), data)
    }

    /// Execute a registered template against a prepared context.
    pub fn render_context(
        &self,
        kind: TemplateKind,
        name: &str,
        context: &Context,
    ) -> Result<String, RenderError> {
        self.registry(kind)
            .render_with_context(&kind.key(name), context)
    }

    fn registry(&self, kind: TemplateKind) -> &Handlebars<'static> {
        if kind.is_html() { &self.html } else { &self.text }
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates")
            .field("layouts", &self.layouts)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct LinkHelper {
    assets: HashAssets,
}

impl HelperDef for LinkHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let href = string_param(h, "link")?;
        out.write(self.assets.resolve(href))?;
        Ok(())
    }
}

fn format_rfc3339(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let raw = string_param(h, "format_rfc3339")?;
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        RenderError::new(format!("format_rfc3339: invalid date {raw:?}: {e}"))
    })?;
    out.write(&format!("{}T00:00:00Z", date.format("%Y-%m-%d")))?;
    Ok(())
}

fn xml_escape(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let raw = string_param(h, "xml_escape")?;
    out.write(&escape_xml(raw))?;
    Ok(())
}

fn string_param<'a>(h: &'a Helper, helper: &str) -> Result<&'a str, RenderError> {
    h.param(0)
        .and_then(|p| p.value().as_str())
        .ok_or_else(|| RenderError::new(format!("{helper}: expected a string parameter")))
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
