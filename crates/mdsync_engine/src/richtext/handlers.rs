//! Tag handlers layered over `html2md`'s defaults.
use std::collections::HashMap;
use std::rc::Rc;

use html2md::anchors::AnchorHandler;
use html2md::common::get_tag_attr;
use html2md::{Handle, NodeData, StructuredPrinter, TagHandler, TagHandlerFactory};
use mdsync_core::{EmbedStyle, ImageEmbedRule};

use super::LITERAL_MARKDOWN_MARKER;

pub(crate) type HandlerMap = HashMap<String, Box<dyn TagHandlerFactory>>;

/// Builds the overrides for one conversion.
pub(crate) fn handlers(embed_rules: &[ImageEmbedRule]) -> HandlerMap {
    let rules: Rc<[ImageEmbedRule]> = embed_rules.into();
    let mut map: HandlerMap = HashMap::new();
    map.insert("pre".to_string(), Box::new(LiteralBlockHandler::default));
    map.insert("code".to_string(), Box::new(InlineCodeHandler::default));
    map.insert("br".to_string(), Box::new(LineBreakHandler::default));
    map.insert("hr".to_string(), Box::new(RuleHandler::default));
    map.insert("a".to_string(), Box::new(LinkHandler::default));
    map.insert("blockquote".to_string(), Box::new(QuoteHandler::default));
    map.insert(
        "img".to_string(),
        Box::new(move || EmbedImageHandler {
            rules: Rc::clone(&rules),
        }),
    );
    map
}

/// `pre` blocks: raw Markdown behind the literal marker, fenced code otherwise.
#[derive(Default)]
struct LiteralBlockHandler;

impl TagHandler for LiteralBlockHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        let code = child_element(tag, "code");
        let mut text = String::new();
        text_content(code.as_ref().unwrap_or(tag), &mut text);

        printer.append_str("\n\n");
        match raw_markdown(&text) {
            Some(raw) => printer.append_str(&raw),
            None => {
                let language = code
                    .as_ref()
                    .and_then(|code| get_tag_attr(code, "class"))
                    .and_then(|class| code_language(&class));
                printer.append_str(&fenced(language.as_deref(), &text));
            }
        }
        printer.append_str("\n\n");
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}

    fn skip_descendants(&self) -> bool {
        true
    }
}

/// Code spans outside `pre`, fenced past any backticks they contain.
#[derive(Default)]
struct InlineCodeHandler;

impl TagHandler for InlineCodeHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        let mut raw = String::new();
        text_content(tag, &mut raw);
        let code = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if code.is_empty() {
            return;
        }
        let fence = "`".repeat(longest_run(&code, '`') + 1);
        let pad = if code.starts_with('`') || code.ends_with('`') {
            " "
        } else {
            ""
        };
        printer.append_str(&format!("{fence}{pad}{code}{pad}{fence}"));
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}

    fn skip_descendants(&self) -> bool {
        true
    }
}

/// Soft breaks: a single space between the surrounding text.
#[derive(Default)]
struct LineBreakHandler;

impl TagHandler for LineBreakHandler {
    fn handle(&mut self, _tag: &Handle, printer: &mut StructuredPrinter) {
        if !printer.data.ends_with(char::is_whitespace) {
            printer.append_str(" ");
        }
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}
}

#[derive(Default)]
struct RuleHandler;

impl TagHandler for RuleHandler {
    fn handle(&mut self, _tag: &Handle, printer: &mut StructuredPrinter) {
        printer.append_str("\n\n***\n\n");
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}
}

/// Links without a usable target keep only their text.
#[derive(Default)]
struct LinkHandler {
    inner: Option<AnchorHandler>,
}

impl TagHandler for LinkHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        if get_tag_attr(tag, "href").is_some_and(|href| !href.trim().is_empty()) {
            let mut inner = AnchorHandler::default();
            inner.handle(tag, printer);
            self.inner = Some(inner);
        }
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        if let Some(inner) = self.inner.as_mut() {
            inner.after_handle(printer);
        }
    }
}

/// Prefixes the rendered content with `> `, one blank quote line between blocks.
#[derive(Default)]
struct QuoteHandler {
    start: usize,
}

impl TagHandler for QuoteHandler {
    fn handle(&mut self, _tag: &Handle, printer: &mut StructuredPrinter) {
        self.start = printer.data.len();
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        let content = printer.data.split_off(self.start);
        let mut lines: Vec<String> = Vec::new();
        for line in content.trim_matches('\n').lines() {
            let line = line.trim_end();
            if line.is_empty() {
                if lines.last().is_some_and(|last| last.as_str() != ">") {
                    lines.push(">".to_string());
                }
            } else {
                lines.push(format!("> {line}"));
            }
        }
        if lines.is_empty() {
            return;
        }
        printer.append_str("\n\n");
        printer.append_str(&lines.join("\n"));
        printer.append_str("\n\n");
    }
}

/// Images, with extra attributes carried for sources matching an embed rule.
struct EmbedImageHandler {
    rules: Rc<[ImageEmbedRule]>,
}

impl TagHandler for EmbedImageHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        let src = get_tag_attr(tag, "src").unwrap_or_default();
        let mut alt = get_tag_attr(tag, "alt").unwrap_or_default();
        let title = get_tag_attr(tag, "title")
            .map(|title| format!(" \"{}\"", title.replace('"', "\\\"")))
            .unwrap_or_default();
        let mut annotation = None;

        let rule = self
            .rules
            .iter()
            .find(|rule| !src.is_empty() && src.starts_with(&rule.base_url));
        if let Some(rule) = rule {
            let attrs: Vec<(&str, String)> = rule
                .attributes
                .iter()
                .filter_map(|name| get_tag_attr(tag, name).map(|value| (name.as_str(), value)))
                .collect();
            if !attrs.is_empty() {
                match rule.style {
                    EmbedStyle::Alt => {
                        for (name, value) in &attrs {
                            alt.push_str(&format!("|{name}={value}"));
                        }
                    }
                    EmbedStyle::Block => {
                        let pairs: Vec<String> = attrs
                            .iter()
                            .map(|(name, value)| format!("{name}=\"{}\"", value.replace('"', "\\\"")))
                            .collect();
                        annotation = Some(format!("{{: {}}}", pairs.join(" ")));
                    }
                }
            }
        }

        printer.append_str(&format!("![{alt}]({}{title})", src.replace(' ', "%20")));
        if let Some(annotation) = annotation {
            printer.append_str("\n");
            printer.append_str(&annotation);
            printer.append_str("\n");
        }
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}
}

fn child_element(tag: &Handle, local: &str) -> Option<Handle> {
    tag.children
        .borrow()
        .iter()
        .find(|child| matches!(child.data, NodeData::Element { ref name, .. } if &*name.local == local))
        .cloned()
}

fn text_content(tag: &Handle, out: &mut String) {
    for child in tag.children.borrow().iter() {
        match child.data {
            NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => text_content(child, out),
            _ => {}
        }
    }
}

fn code_language(class: &str) -> Option<String> {
    class.split_whitespace().find_map(|name| {
        name.strip_prefix("language-")
            .or_else(|| name.strip_prefix("lang-"))
            .map(str::to_string)
    })
}

/// The block body when `text` opens with the literal marker line.
fn raw_markdown(text: &str) -> Option<String> {
    let rest = text.strip_prefix(LITERAL_MARKDOWN_MARKER)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    let rest = rest.strip_prefix('\n')?;
    Some(rest.trim_end_matches('\n').to_string())
}

fn fenced(language: Option<&str>, text: &str) -> String {
    let fence = "`".repeat(longest_run(text, '`').max(2) + 1);
    let body = text.strip_suffix('\n').unwrap_or(text);
    format!("{fence}{}\n{body}\n{fence}", language.unwrap_or(""))
}

fn longest_run(text: &str, needle: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == needle {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_marker_must_fill_its_line() {
        assert_eq!(raw_markdown("===md\n# Title\n\n"), Some("# Title".to_string()));
        assert_eq!(raw_markdown("===md"), Some(String::new()));
        assert_eq!(raw_markdown("===mdx\nbody"), None);
        assert_eq!(raw_markdown(" ===md\nbody"), None);
    }

    #[test]
    fn fences_outgrow_embedded_backticks() {
        assert_eq!(fenced(Some("rust"), "let a = 1;\n"), "```rust\nlet a = 1;\n```");
        assert_eq!(fenced(None, "````\nx"), "`````\n````\nx\n`````");
        assert_eq!(longest_run("a``b```c", '`'), 3);
    }

    #[test]
    fn language_comes_from_the_class_prefix() {
        assert_eq!(code_language("hl language-js"), Some("js".to_string()));
        assert_eq!(code_language("lang-py"), Some("py".to_string()));
        assert_eq!(code_language("plain"), None);
    }
}
