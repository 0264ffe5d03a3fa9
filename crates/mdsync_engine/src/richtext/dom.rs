//! Owned HTML tree the rewriting passes mutate.
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

use crate::error::RewriteError;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Element(Element),
    Text(String),
    Comment(String),
}

impl DomNode {
    pub fn element(&self) -> Option<&Element> {
        match self {
            DomNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.element().is_some_and(|element| element.tag == tag)
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, DomNode::Text(text) if text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DomNode>) -> Self {
        self.children = children;
        self
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(text) => out.push_str(text),
            DomNode::Element(element) => collect_text(&element.children, out),
            DomNode::Comment(_) => {}
        }
    }
}

/// The top-level nodes of one parsed HTML fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTree {
    pub children: Vec<DomNode>,
}

impl DocumentTree {
    /// Parses `html` as a body fragment. Fails when elements nest deeper than
    /// `max_depth`.
    pub fn parse(html: &str, max_depth: usize) -> Result<Self, RewriteError> {
        let fragment = Html::parse_fragment(html);
        let mut children = Vec::new();
        for child in fragment.root_element().children() {
            push_node(child, 1, max_depth, &mut children)?;
        }
        Ok(Self { children })
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.children, &mut out);
        out
    }
}

fn push_node(
    node: NodeRef<'_, Node>,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<DomNode>,
) -> Result<(), RewriteError> {
    match node.value() {
        Node::Text(text) => out.push(DomNode::Text(text.text.to_string())),
        Node::Comment(comment) => out.push(DomNode::Comment(comment.comment.to_string())),
        Node::Element(element) => {
            if depth > max_depth {
                return Err(RewriteError::TooDeep { limit: max_depth });
            }
            let mut converted = Element::new(element.name().to_ascii_lowercase());
            converted.attrs = element
                .attrs()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
            for child in node.children() {
                push_node(child, depth + 1, max_depth, &mut converted.children)?;
            }
            out.push(DomNode::Element(converted));
        }
        _ => {
            for child in node.children() {
                push_node(child, depth, max_depth, out)?;
            }
        }
    }
    Ok(())
}

fn write_nodes(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(text) => escape_into(text, false, out),
            DomNode::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            DomNode::Element(element) => write_element(element, out),
        }
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&element.tag.as_str()) {
        return;
    }
    // Parsers drop one newline right after `<pre>`.
    if element.tag == "pre" && matches!(element.children.first(), Some(DomNode::Text(text)) if text.starts_with('\n')) {
        out.push('\n');
    }
    write_nodes(&element.children, out);
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fragment_into_owned_nodes() {
        let tree = DocumentTree::parse(r#"<P Class="x">a<!--c--><BR></P>"#, 16).unwrap();
        let DomNode::Element(p) = &tree.children[0] else {
            panic!("expected element");
        };
        assert_eq!(p.tag, "p");
        assert_eq!(p.attrs, vec![("class".to_string(), "x".to_string())]);
        assert_eq!(p.children.len(), 3);
        assert_eq!(p.children[1], DomNode::Comment("c".into()));
        assert!(p.children[2].is_tag("br"));
    }

    #[test]
    fn serializes_back_to_html() {
        let html = r#"<p title="a&quot;b">x &amp; y<br></p><!--keep-->"#;
        let tree = DocumentTree::parse(html, 16).unwrap();
        assert_eq!(tree.to_html(), html);
    }

    #[test]
    fn leading_pre_newline_survives_reparsing() {
        let tree = DocumentTree::parse("<pre>\n\nx</pre>", 16).unwrap();
        let again = DocumentTree::parse(&tree.to_html(), 16).unwrap();
        assert_eq!(again, tree);
    }
}
