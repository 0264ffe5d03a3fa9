//! Hoists a `---` delimited preamble out of the first paragraph.
//!
//! Front matter arrives as a leading paragraph of `<br>`-separated text lines
//! between `---` markers. Anything other than text and line breaks between
//! the markers leaves the paragraph alone.
use super::dom::{DocumentTree, DomNode, Element};
use super::LITERAL_MARKDOWN_MARKER;

const DELIMITER: &str = "---";

/// Replaces a front-matter run at the start of the first paragraph with a
/// literal Markdown block. Returns whether anything was hoisted.
pub fn hoist(tree: &mut DocumentTree) -> bool {
    let Some(index) = tree.children.iter().position(|node| !node.is_blank_text()) else {
        return false;
    };
    let DomNode::Element(paragraph) = &mut tree.children[index] else {
        return false;
    };
    if paragraph.tag != "p" {
        return false;
    }
    let Some((end, body)) = scan(&paragraph.children) else {
        return false;
    };

    let mut end = end;
    while paragraph
        .children
        .get(end + 1)
        .is_some_and(|node| node.is_tag("br"))
    {
        end += 1;
    }

    let literal = format!(
        "{LITERAL_MARKDOWN_MARKER}\n{DELIMITER}\n{}\n{DELIMITER}",
        body.trim_matches('\n')
    );
    let block = Element::new("pre").with_children(vec![DomNode::Element(
        Element::new("code").with_children(vec![DomNode::Text(literal)]),
    )]);
    paragraph
        .children
        .splice(0..=end, [DomNode::Element(block)]);
    true
}

/// Finds the closing delimiter. Returns its index and the captured text.
fn scan(children: &[DomNode]) -> Option<(usize, String)> {
    match children.first()? {
        DomNode::Text(text) if text.trim() == DELIMITER => {}
        _ => return None,
    }
    let mut body = String::new();
    for (index, node) in children.iter().enumerate().skip(1) {
        match node {
            DomNode::Text(text) if text.trim() == DELIMITER => return Some((index, body)),
            // Line structure comes from the breaks, not the source formatting.
            DomNode::Text(text) => body.push_str(text.trim_matches(['\r', '\n'])),
            DomNode::Element(element) if element.tag == "br" => body.push('\n'),
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(html: &str) -> DocumentTree {
        DocumentTree::parse(html, 64).unwrap()
    }

    #[test]
    fn hoists_and_absorbs_trailing_breaks() {
        let mut tree = tree("<p>---<br>title: A<br>tags: [x]<br>---<br><br>after</p>");
        assert!(hoist(&mut tree));
        let paragraph = tree.children[0].element().unwrap();
        assert_eq!(paragraph.children.len(), 2);
        assert_eq!(
            paragraph.children[0].element().unwrap().text_content(),
            "===md\n---\ntitle: A\ntags: [x]\n---"
        );
        assert_eq!(paragraph.children[1], DomNode::Text("after".into()));
    }

    #[test]
    fn source_newlines_around_breaks_are_ignored() {
        let mut tree = tree("<p>---<br>\na: 1<br>\nb: 2<br>\n---</p>");
        assert!(hoist(&mut tree));
        let paragraph = tree.children[0].element().unwrap();
        assert_eq!(
            paragraph.children[0].element().unwrap().text_content(),
            "===md\n---\na: 1\nb: 2\n---"
        );
    }

    #[test]
    fn leaves_unclosed_preamble_alone() {
        let mut tree = tree("<p>---<br>title: A<br></p>");
        let before = tree.clone();
        assert!(!hoist(&mut tree));
        assert_eq!(tree, before);
    }

    #[test]
    fn interrupting_markup_cancels_the_hoist() {
        let mut tree = tree("<p>---<br><strong>title</strong>: A<br>---</p>");
        assert!(!hoist(&mut tree));
    }

    #[test]
    fn only_the_first_block_is_considered() {
        let mut tree = tree("<h1>Doc</h1><p>---<br>a: b<br>---</p>");
        assert!(!hoist(&mut tree));
    }
}
