//! HTML rich text to Markdown.
//!
//! The tree passes (front-matter hoist, paragraph splitting, sanitization) run
//! over an owned copy of the parsed document. The result is serialized back
//! to HTML and handed to `html2md` with the handlers in [`handlers`].
mod dom;
mod frontmatter;
mod handlers;
mod sanitize;
mod split;

use mdsync_core::{RichTextMode, RichTextOptions};

use crate::error::RewriteError;
use sanitize::Sanitizer;

/// First line of a `pre` block whose remaining text is emitted as raw Markdown.
pub const LITERAL_MARKDOWN_MARKER: &str = "===md";

/// Deepest element nesting accepted.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct RichTextConverter {
    options: RichTextOptions,
    sanitizer: Sanitizer,
    max_depth: usize,
}

impl RichTextConverter {
    pub fn new(options: RichTextOptions) -> Self {
        let extra_image_attrs = options
            .embed_images
            .iter()
            .flat_map(|rule| rule.attributes.iter().cloned())
            .collect();
        Self {
            options,
            sanitizer: Sanitizer::new(extra_image_attrs),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn options(&self) -> &RichTextOptions {
        &self.options
    }

    /// Converts one rich-text document. In [`RichTextMode::Html`] the
    /// sanitized HTML is returned instead of Markdown.
    pub fn to_markdown(&self, html: &str) -> Result<String, RewriteError> {
        if html.trim().is_empty() {
            return Ok(String::new());
        }

        let mut tree = dom::DocumentTree::parse(html, self.max_depth)?;
        let hoisted = frontmatter::hoist(&mut tree);
        split::split_paragraphs(&mut tree);
        self.sanitizer.sanitize(&mut tree);

        let mut output = match self.options.mode {
            RichTextMode::Markdown => html2md::parse_html_custom(
                &tree.to_html(),
                &handlers::handlers(&self.options.embed_images),
            ),
            RichTextMode::Html => tree.to_html(),
        };

        if hoisted {
            if let Some(rest) = output.strip_prefix("\\---") {
                output = format!("---{rest}");
            }
        }
        if !output.ends_with('\n') {
            output.push('\n');
        }
        Ok(output)
    }
}
