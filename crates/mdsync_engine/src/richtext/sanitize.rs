//! Allowlist sanitizer over the owned tree.
use super::dom::{DocumentTree, DomNode, Element};

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "strong", "b", "em", "i", "s", "del",
    "code", "pre", "blockquote", "ul", "ol", "li", "a", "img", "table", "thead", "tbody",
    "tfoot", "tr", "th", "td", "sup", "sub", "div",
];

/// Sectioning containers kept as plain `div`s.
const RENAMED_TO_DIV: &[&str] = &[
    "section", "article", "header", "footer", "figure", "figcaption", "main", "aside", "nav",
    "address", "details", "summary",
];

/// Dropped together with their content.
const DROPPED_SUBTREES: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "form", "input",
    "button", "select", "textarea", "head", "title", "meta", "link", "svg", "canvas", "video",
    "audio",
];

const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    /// `img` attributes kept beyond the default set.
    extra_image_attrs: Vec<String>,
}

impl Sanitizer {
    pub fn new(extra_image_attrs: Vec<String>) -> Self {
        Self { extra_image_attrs }
    }

    pub fn sanitize(&self, tree: &mut DocumentTree) {
        tree.children = self.sanitize_nodes(std::mem::take(&mut tree.children));
    }

    fn sanitize_nodes(&self, nodes: Vec<DomNode>) -> Vec<DomNode> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                DomNode::Element(element) => self.sanitize_element(element, &mut out),
                other => out.push(other),
            }
        }
        out
    }

    fn sanitize_element(&self, mut element: Element, out: &mut Vec<DomNode>) {
        if DROPPED_SUBTREES.contains(&element.tag.as_str()) {
            return;
        }
        // Literal blocks are kept as-is; their text is never markup.
        if element.tag == "pre" {
            element.attrs.clear();
            element.children = literal_children(element.children);
            out.push(DomNode::Element(element));
            return;
        }
        if RENAMED_TO_DIV.contains(&element.tag.as_str()) {
            element.tag = "div".to_string();
        } else if element.tag == "strike" {
            element.tag = "del".to_string();
        }
        let children = self.sanitize_nodes(std::mem::take(&mut element.children));
        if !ALLOWED_TAGS.contains(&element.tag.as_str()) {
            out.extend(children);
            return;
        }
        element.children = children;
        let tag = element.tag.clone();
        element
            .attrs
            .retain(|(name, value)| self.keeps_attribute(&tag, name, value));
        out.push(DomNode::Element(element));
    }

    fn keeps_attribute(&self, tag: &str, name: &str, value: &str) -> bool {
        match (tag, name) {
            ("a", "href") | ("img", "src") => !has_unsafe_scheme(value),
            ("a", "title") => true,
            ("img", "alt" | "title" | "width" | "height") => true,
            ("img", other) => self.extra_image_attrs.iter().any(|attr| attr == other),
            ("code", "class") | ("ol", "start") => true,
            ("th" | "td", "align") => true,
            _ => false,
        }
    }
}

/// Inside `pre`, only `code` wrappers and text survive.
fn literal_children(nodes: Vec<DomNode>) -> Vec<DomNode> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            DomNode::Element(mut element) if element.tag == "code" => {
                element.attrs.retain(|(name, _)| name == "class");
                element.children = literal_children(element.children);
                Some(DomNode::Element(element))
            }
            DomNode::Element(element) if element.tag == "br" => Some(DomNode::Text("\n".into())),
            DomNode::Element(element) => Some(DomNode::Text(element.text_content())),
            DomNode::Comment(_) => None,
            text => Some(text),
        })
        .collect()
}

fn has_unsafe_scheme(value: &str) -> bool {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();
    UNSAFE_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}
