//! Markup tree: a tolerant HTML-fragment parser and serializer.
//!
//! Post bodies are stored as HTML fragments. This module turns them into a
//! tree of [`Node`]s so the rest of the crate can find and rewrite embeds
//! structurally instead of scanning strings.
//!
//! Text nodes keep their source form (entities stay encoded) so regions the
//! editor never touches serialize back byte-for-byte. Attribute values are
//! decoded on parse and re-escaped on serialize.

mod entities;
mod parse;
#[cfg(test)]
mod tests;

use markdown_weaver_escape::{escape_html, escape_html_body_text};
use quill_common::MarkupError;
use smol_str::SmolStr;

pub use entities::decode_entities;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is text up to the matching close tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements that start a new block when rendering plain text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "iframe", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Whether traversal should descend into an element's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    Descend,
    SkipChildren,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Text in source form (entities still encoded).
    Text(String),
    /// Comment body, without the `<!--`/`-->` delimiters.
    Comment(String),
    /// Declarations and processing instructions, verbatim.
    Raw(String),
}

impl Node {
    /// A text node holding `plain`, escaped for HTML body context.
    pub fn text(plain: &str) -> Self {
        let mut escaped = String::with_capacity(plain.len());
        // These won't fail writing to String
        let _ = escape_html_body_text(&mut escaped, plain);
        Node::Text(escaped)
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(el) => el.write_html(out),
            Node::Text(text) => out.push_str(text),
            Node::Comment(body) => {
                out.push_str("<!--");
                out.push_str(body);
                out.push_str("-->");
            }
            Node::Raw(raw) => out.push_str(raw),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

/// A single attribute. `value` is `None` for bare boolean attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: SmolStr,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    name: SmolStr,
    attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: SmolStr::new(name.to_ascii_lowercase()),
            attrs: Vec::new(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Builder form of [`Element::set_attr`].
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form for a bare boolean attribute.
    pub fn with_flag(mut self, name: &str) -> Self {
        if !self.has_attr(name) {
            self.attrs.push(Attribute {
                name: SmolStr::new(name),
                value: None,
            });
        }
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Attribute value, decoded. Boolean attributes read as `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    /// Attribute value if present and not blank.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.trim().is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, keeping its position if it already exists.
    /// Returns whether anything changed.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) if attr.value.as_deref() == Some(value.as_str()) => false,
            Some(attr) => {
                attr.value = Some(value);
                true
            }
            None => {
                self.attrs.push(Attribute {
                    name: SmolStr::new(name),
                    value: Some(value),
                });
                true
            }
        }
    }

    /// Returns whether the attribute existed.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        self.attrs.len() != before
    }

    /// Parser entry point: first occurrence of a name wins, as in HTML.
    pub(crate) fn push_parsed_attr(&mut self, name: String, value: Option<String>) {
        if !self.has_attr(&name) {
            self.attrs.push(Attribute {
                name: SmolStr::new(name),
                value,
            });
        }
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    pub(crate) fn is_raw_text(&self) -> bool {
        RAW_TEXT_ELEMENTS.contains(&self.name.as_str())
    }

    fn is_block(&self) -> bool {
        BLOCK_ELEMENTS.contains(&self.name.as_str())
    }

    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    pub(crate) fn set_self_closing(&mut self, self_closing: bool) {
        self.self_closing = self_closing;
    }

    /// Concatenated, entity-decoded text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Replace the children with parsed markup. Falls back to a single text
    /// node holding the escaped source when the markup does not parse.
    pub fn set_inner_html(&mut self, markup: &str) {
        self.children = match Fragment::parse(markup) {
            Ok(fragment) => fragment.nodes,
            Err(e) => {
                tracing::warn!(error = %e, "inner markup did not parse, inserting as text");
                vec![Node::text(markup)]
            }
        };
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.write_html(&mut out);
        }
        out
    }

    pub fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attrs {
            out.push(' ');
            out.push_str(&attr.name);
            if let Some(value) = &attr.value {
                out.push_str("=\"");
                let _ = escape_html(&mut *out, value);
                out.push('"');
            }
        }
        if self.self_closing {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if self.is_void() {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&decode_entities(text)),
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) | Node::Raw(_) => {}
        }
    }
}

/// A parsed markup fragment: the body of a post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse markup. Unbalanced tags are repaired; only unterminated
    /// constructs are errors.
    pub fn parse(src: &str) -> Result<Self, MarkupError> {
        parse::parse_nodes(src)
            .map(|nodes| Self { nodes })
            .map_err(|e| e.with_source("markup", src))
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.nodes.push(node.into());
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_html(&mut out);
        }
        out
    }

    /// Pre-order walk over every element. The callback decides whether to
    /// descend into each element's children.
    pub fn visit_elements<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a Element) -> Visit,
    {
        visit(&self.nodes, &mut f);
    }

    /// First element, in document order, matching `pred`.
    pub fn find_element<F>(&self, mut pred: F) -> Option<&Element>
    where
        F: FnMut(&Element) -> bool,
    {
        find_in(&self.nodes, &mut pred)
    }

    pub fn find_element_mut<F>(&mut self, mut pred: F) -> Option<&mut Element>
    where
        F: FnMut(&Element) -> bool,
    {
        find_in_mut(&mut self.nodes, &mut pred)
    }

    pub fn any_element<F>(&self, pred: F) -> bool
    where
        F: FnMut(&Element) -> bool,
    {
        self.find_element(pred).is_some()
    }

    /// Plain-text rendering: entity-decoded text with blank lines between
    /// blocks. Script and style contents are skipped.
    pub fn plain_text(&self) -> String {
        let mut blocks = Vec::new();
        let mut current = String::new();
        plain_text_into(&self.nodes, &mut blocks, &mut current);
        flush_block(&mut blocks, &mut current);
        blocks.join("\n\n")
    }
}

fn visit<'a, F>(nodes: &'a [Node], f: &mut F)
where
    F: FnMut(&'a Element) -> Visit,
{
    for node in nodes {
        if let Node::Element(el) = node {
            if f(el) == Visit::Descend {
                visit(&el.children, f);
            }
        }
    }
}

fn find_in<'a, F>(nodes: &'a [Node], pred: &mut F) -> Option<&'a Element>
where
    F: FnMut(&Element) -> bool,
{
    for node in nodes {
        if let Node::Element(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_in(&el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn find_in_mut<'a, F>(nodes: &'a mut [Node], pred: &mut F) -> Option<&'a mut Element>
where
    F: FnMut(&Element) -> bool,
{
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_in_mut(&mut el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn plain_text_into(nodes: &[Node], blocks: &mut Vec<String>, current: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => current.push_str(&decode_entities(text)),
            Node::Element(el) if el.is("br") => current.push('\n'),
            Node::Element(el) if el.is("script") || el.is("style") => {}
            Node::Element(el) if el.is_block() => {
                flush_block(blocks, current);
                plain_text_into(&el.children, blocks, current);
                flush_block(blocks, current);
            }
            Node::Element(el) => plain_text_into(&el.children, blocks, current),
            Node::Comment(_) | Node::Raw(_) => {}
        }
    }
}

fn flush_block(blocks: &mut Vec<String>, current: &mut String) {
    let text = std::mem::take(current);
    if !text.trim().is_empty() {
        blocks.push(text.trim().to_owned());
    }
}
