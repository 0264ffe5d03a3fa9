//! Lifts block-level content out of paragraphs so every paragraph holds
//! inline content only.
use super::dom::{DocumentTree, DomNode, Element};

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol",
    "p", "pre", "section", "table", "ul",
];

fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

pub fn split_paragraphs(tree: &mut DocumentTree) {
    tree.children = split_nodes(std::mem::take(&mut tree.children));
}

fn split_nodes(nodes: Vec<DomNode>) -> Vec<DomNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            DomNode::Element(mut element) => {
                element.children = split_nodes(std::mem::take(&mut element.children));
                if element.tag == "p" {
                    split_paragraph(element, &mut out);
                } else {
                    out.push(DomNode::Element(element));
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn split_paragraph(paragraph: Element, out: &mut Vec<DomNode>) {
    let Element {
        tag,
        attrs,
        children,
    } = paragraph;
    let mut run = Vec::new();
    for child in children {
        if child.element().is_some_and(|element| is_block_tag(&element.tag)) {
            flush(&tag, &attrs, &mut run, out);
            out.push(child);
        } else {
            run.push(child);
        }
    }
    flush(&tag, &attrs, &mut run, out);
}

/// Emits the pending inline run as a paragraph, dropping it when empty.
fn flush(tag: &str, attrs: &[(String, String)], run: &mut Vec<DomNode>, out: &mut Vec<DomNode>) {
    let children = std::mem::take(run);
    let empty = children.iter().all(|node| node.is_blank_text() || node.is_tag("br"));
    if empty {
        return;
    }
    out.push(DomNode::Element(Element {
        tag: tag.to_string(),
        attrs: attrs.to_vec(),
        children,
    }));
}
