//! Document flattening and attachment recovery

use crate::detect::{decode_payload, is_base64_payload};
use crate::document::{Document, NodeId};
use crate::sniff::{sniff, Format};
use std::path::Path;

/// Tags whose whole subtree is dropped when signature blocks are skipped
pub const SIGNATURE_TAGS: &[&str] = &["SignatureValue", "X509Certificate"];

/// Extension appended when nothing better is known
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Prefix of names synthesized for unnamed attachments
pub const SYNTHESIZED_NAME_PREFIX: &str = "attachment_";

const INDENT: &str = "  ";

/// Options controlling a flattening pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Drop signature values and certificates with everything below them
    pub skip_signature_blocks: bool,
    /// Tags rendered as `## text` headings
    pub heading_tags: Vec<String>,
    /// Attributes holding an attachment file name, first match wins
    pub name_attributes: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            skip_signature_blocks: true,
            heading_tags: vec!["Informacja".to_string(), "Info".to_string()],
            name_attributes: vec![
                "nazwaPliku".to_string(),
                "NazwaPliku".to_string(),
                "Nazwa".to_string(),
            ],
        }
    }
}

/// A base64 payload recovered from the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Resolved file name, never empty
    pub name: String,
    /// Base64 text as found in the document, whitespace included
    pub payload: String,
}

impl Attachment {
    /// Decode the payload, ignoring embedded whitespace
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        decode_payload(&self.payload)
    }

    /// Sniffed format of the decoded payload, `None` if it does not decode
    pub fn format(&self) -> Option<Format> {
        self.decode().ok().map(|bytes| sniff(&bytes))
    }
}

/// Output of one flattening pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Rendered rows in reading order, indentation included
    pub lines: Vec<String>,
    /// Attachments in the order their nodes were visited
    pub attachments: Vec<Attachment>,
}

impl Extraction {
    /// Lines joined for plain-text display
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Whether a node with this (local) tag is pruned together with its subtree
pub fn is_signature_block(tag: &str, skip_signature_blocks: bool) -> bool {
    skip_signature_blocks && SIGNATURE_TAGS.contains(&tag)
}

/// Whether a file name already carries an extension
pub fn has_extension(name: &str) -> bool {
    Path::new(name).extension().is_some()
}

/// Work out the final attachment name.
///
/// Returns the name and whether the payload decoded. Names without an
/// extension get the sniffed one, or [`FALLBACK_EXTENSION`] when the payload
/// is broken or of unknown type.
pub fn resolve_name(candidate: Option<&str>, payload: &str, counter: usize) -> (String, bool) {
    let mut name = match candidate {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}{}", SYNTHESIZED_NAME_PREFIX, counter + 1),
    };

    match decode_payload(payload) {
        Ok(bytes) => {
            if !has_extension(&name) {
                let format = sniff(&bytes);
                name.push_str(format.extension().unwrap_or(FALLBACK_EXTENSION));
            }
            (name, true)
        }
        Err(e) => {
            log::debug!("Attachment '{}' does not decode: {}", name, e);
            if !has_extension(&name) {
                name.push_str(FALLBACK_EXTENSION);
            }
            (name, false)
        }
    }
}

/// Pending node on the traversal stack
struct Frame<'a> {
    id: NodeId,
    depth: usize,
    inherited_name: Option<&'a str>,
}

/// Flattens a document into readable lines and attachments
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    /// Create an extractor with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with a custom configuration
    pub fn with_config(config: ExtractConfig) -> Self {
        Self { config }
    }

    /// Enable or disable pruning of signature blocks
    pub fn with_skip_signatures(mut self, skip: bool) -> Self {
        self.config.skip_signature_blocks = skip;
        self
    }

    /// Render an additional tag as a heading
    pub fn with_heading_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.heading_tags.push(tag.into());
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Walk the document depth-first and collect lines and attachments
    pub fn extract(&self, document: &Document) -> Extraction {
        let mut result = Extraction::default();
        let mut stack = vec![Frame {
            id: document.root(),
            depth: 0,
            inherited_name: None,
        }];

        while let Some(frame) = stack.pop() {
            let node = document.node(frame.id);
            let tag = node.local_name();

            if is_signature_block(tag, self.config.skip_signature_blocks) {
                log::debug!("Skipping signature block <{}>", tag);
                continue;
            }

            let text = node.text.as_deref().map(str::trim).unwrap_or("");
            let file_name = self
                .config
                .name_attributes
                .iter()
                .find_map(|key| node.attribute(key).filter(|v| !v.is_empty()))
                .or(frame.inherited_name);

            if !text.is_empty() {
                let indent = INDENT.repeat(frame.depth);
                if is_base64_payload(text) {
                    let (name, _) = resolve_name(file_name, text, result.attachments.len());
                    result.lines.push(format!("{}{}:", indent, tag));
                    result.lines.push(format!("{}{}Attachment name: {}", indent, INDENT, name));
                    result.attachments.push(Attachment {
                        name,
                        payload: text.to_string(),
                    });
                } else {
                    result.lines.push(self.render_text(&indent, tag, text));
                }
            }

            // Reversed so the first child is popped first
            for child in node.children().iter().rev() {
                stack.push(Frame {
                    id: *child,
                    depth: frame.depth + 1,
                    inherited_name: file_name,
                });
            }
        }

        result
    }

    /// Format a plain text field
    fn render_text(&self, indent: &str, tag: &str, text: &str) -> String {
        if self.config.heading_tags.iter().any(|h| h == tag) {
            format!("{}## {}", indent, text)
        } else if text.contains(':') {
            // Already a "label: value" string
            format!("{}{}", indent, text)
        } else {
            format!("{}{}: {}", indent, tag, text)
        }
    }
}
