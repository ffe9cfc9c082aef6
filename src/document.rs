//! Document tree

use anyhow::{anyhow, Context, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::collections::HashMap;
use std::path::Path;

// XML declaration constants
const DECLARATION_START: &[u8] = b"<?xml";
const DECLARATION_END: &[u8] = b"?>";
const DECLARATION_SCAN_LEN: usize = 256;
const ENCODING_KEY: &str = "encoding";

/// Strip a `{namespace-uri}` qualification from a tag or attribute name.
///
/// Names without the `{...}` prefix are returned unchanged.
pub fn local_name(tag: &str) -> &str {
    if tag.starts_with('{') {
        if let Some(end) = tag.find('}') {
            return &tag[end + 1..];
        }
    }
    tag
}

/// Index of a node inside its [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the document arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single element of the document tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Tag name, `{uri}local` when the element is namespaced
    pub tag: Option<String>,
    /// Text before the first child element
    pub text: Option<String>,
    /// Attributes in document order, keys qualified like tags
    pub attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
}

impl Node {
    /// Create a node with the given tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Default::default()
        }
    }

    /// Tag name without namespace qualification, empty for untagged nodes
    pub fn local_name(&self) -> &str {
        self.tag.as_deref().map(local_name).unwrap_or("")
    }

    /// Look up an attribute by name, ignoring any namespace qualification
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name || local_name(key) == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child nodes in document order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An immutable-once-built XML tree stored in an arena.
///
/// Nodes are addressed by [`NodeId`]; ids are only meaningful for the
/// document that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Create a document holding only a root element
    pub fn new(root_tag: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(root_tag)],
        }
    }

    /// Id of the root element
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Borrow a node by id
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A document always has a root, so this is never true
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a new child element under `parent` and return its id
    pub fn append_child(&mut self, parent: NodeId, tag: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(tag));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Set the immediate text of a node
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.0].text = Some(text.into());
    }

    /// Set an attribute, replacing an existing value with the same key
    pub fn set_attribute(&mut self, id: NodeId, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let attributes = &mut self.nodes[id.0].attributes;
        match attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => attributes.push((key, value)),
        }
    }

    /// Parse an XML document from a string
    pub fn parse(input: &str) -> Result<Self> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let xml = roxmltree::Document::parse_with_options(input, options)
            .map_err(|e| anyhow!("Failed to parse XML: {}", e))?;

        let root = xml.root_element();
        let mut document = Self::new(qualified_name(root.tag_name().namespace(), root.tag_name().name()));
        let mut ids = HashMap::new();
        ids.insert(root.id(), document.root());

        // descendants() is pre-order, so a parent is always mapped before its children
        for element in root.descendants().filter(|n| n.is_element()) {
            let id = match ids.get(&element.id()) {
                Some(id) => *id,
                None => {
                    let parent = element
                        .parent_element()
                        .and_then(|p| ids.get(&p.id()).copied())
                        .ok_or_else(|| anyhow!("Element <{}> has no parent", element.tag_name().name()))?;
                    let tag = qualified_name(element.tag_name().namespace(), element.tag_name().name());
                    let id = document.append_child(parent, tag);
                    ids.insert(element.id(), id);
                    id
                }
            };

            if let Some(text) = leading_text(element) {
                document.set_text(id, text);
            }
            for attr in element.attributes() {
                document.set_attribute(id, qualified_name(attr.namespace(), attr.name()), attr.value());
            }
        }

        Ok(document)
    }

    /// Decode raw bytes using the BOM or declared encoding, then parse
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let encoding = detect_encoding(bytes);
        let (text, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            log::warn!("Input contains byte sequences invalid in {}, replaced", used.name());
        }
        Self::parse(&text)
    }

    /// Read and parse an XML file
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read: {}", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("Failed to load document: {}", path.display()))
    }
}

/// Text before the first child element, joined across comments and PIs
fn leading_text(element: roxmltree::Node) -> Option<String> {
    let mut text: Option<String> = None;
    for child in element.children().take_while(|c| !c.is_element()) {
        if !child.is_text() {
            continue;
        }
        if let Some(piece) = child.text() {
            text.get_or_insert_with(String::new).push_str(piece);
        }
    }
    text
}

/// Render a name as `{uri}local` when it carries a namespace
fn qualified_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(uri) if !uri.is_empty() => format!("{{{}}}{}", uri, name),
        _ => name.to_string(),
    }
}

/// Choose the input encoding: BOM first, then the XML declaration, else UTF-8
fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    declared_encoding(bytes)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        // A declaration readable as ASCII cannot really be UTF-16
        .filter(|encoding| *encoding != UTF_16LE && *encoding != UTF_16BE)
        .unwrap_or(UTF_8)
}

/// Extract the `encoding="..."` value from an XML declaration
fn declared_encoding(bytes: &[u8]) -> Option<&str> {
    if !bytes.starts_with(DECLARATION_START) {
        return None;
    }

    let head = &bytes[..bytes.len().min(DECLARATION_SCAN_LEN)];
    let end = head
        .windows(DECLARATION_END.len())
        .position(|w| w == DECLARATION_END)?;
    let declaration = std::str::from_utf8(&head[..end]).ok()?;

    let rest = &declaration[declaration.find(ENCODING_KEY)? + ENCODING_KEY.len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(&value[..close])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("{http://crd.gov.pl/xml/schematy/struktura/2009/11/16/}Zalacznik"), "Zalacznik");
        assert_eq!(local_name("{}Empty"), "Empty");
        assert_eq!(local_name("Plain"), "Plain");
        assert_eq!(local_name("str:Prefixed"), "str:Prefixed");
        assert_eq!(local_name(""), "");
    }

    #[test]
    fn test_local_name_unterminated_brace() {
        assert_eq!(local_name("{broken"), "{broken");
    }

    #[test]
    fn test_build_tree() {
        let mut doc = Document::new("root");
        let child = doc.append_child(doc.root(), "child");
        doc.set_text(child, "value");
        doc.set_attribute(child, "Nazwa", "a.pdf");
        doc.set_attribute(child, "Nazwa", "b.pdf");

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.node(doc.root()).children(), &[child]);
        assert_eq!(doc.node(child).text.as_deref(), Some("value"));
        assert_eq!(doc.node(child).attributes.len(), 1);
        assert_eq!(doc.node(child).attribute("Nazwa"), Some("b.pdf"));
    }

    #[test]
    fn test_parse_namespaces() {
        let input = r#"<?xml version="1.0" encoding="UTF-8"?>
<wnio:Dokument xmlns:wnio="http://example.com/wnio" xmlns:str="http://example.com/str">
  <str:Zalacznik str:nazwaPliku="scan.pdf">abc</str:Zalacznik>
</wnio:Dokument>"#;

        let doc = Document::parse(input).unwrap();
        let root = doc.node(doc.root());
        assert_eq!(root.tag.as_deref(), Some("{http://example.com/wnio}Dokument"));
        assert_eq!(root.local_name(), "Dokument");

        let attachment = doc.node(root.children()[0]);
        assert_eq!(attachment.local_name(), "Zalacznik");
        assert_eq!(attachment.text.as_deref(), Some("abc"));
        assert_eq!(
            attachment.attributes[0].0,
            "{http://example.com/str}nazwaPliku"
        );
        assert_eq!(attachment.attribute("nazwaPliku"), Some("scan.pdf"));
    }

    #[test]
    fn test_parse_preserves_child_order_and_leading_text() {
        let input = "<a>lead<b>1</b>tail<c><d>2</d></c><e/></a>";

        let doc = Document::parse(input).unwrap();
        let root = doc.node(doc.root());
        assert_eq!(root.text.as_deref(), Some("lead"));

        let tags: Vec<&str> = root
            .children()
            .iter()
            .map(|id| doc.node(*id).local_name())
            .collect();
        assert_eq!(tags, vec!["b", "c", "e"]);

        let c = doc.node(root.children()[1]);
        assert!(c.text.is_none());
        assert_eq!(doc.node(c.children()[0]).text.as_deref(), Some("2"));
        assert_eq!(doc.len(), 5);
    }

    #[test]
    fn test_parse_cdata() {
        let doc = Document::parse("<a><![CDATA[x < y]]></a>").unwrap();
        assert_eq!(doc.node(doc.root()).text.as_deref(), Some("x < y"));
    }

    #[test]
    fn test_parse_text_around_comments() {
        let input = "<a><b><!-- scan -->payload</b><c>Kra<!-- x -->kow<?pi data?>w</c><d>x<e/>tail</d><f><!-- only --></f></a>";

        let doc = Document::parse(input).unwrap();
        let root = doc.node(doc.root());
        let text = |i: usize| doc.node(root.children()[i]).text.as_deref();
        assert_eq!(text(0), Some("payload"));
        assert_eq!(text(1), Some("Krakoww"));
        assert_eq!(text(2), Some("x"));
        assert_eq!(text(3), None);
    }

    #[test]
    fn test_parse_malformed() {
        let result = Document::parse("<a><b></a>");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse XML"));
    }

    #[test]
    fn test_declared_encoding() {
        assert_eq!(
            declared_encoding(br#"<?xml version="1.0" encoding="windows-1250"?><a/>"#),
            Some("windows-1250")
        );
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding = 'ISO-8859-2' ?><a/>"),
            Some("ISO-8859-2")
        );
        assert_eq!(declared_encoding(br#"<?xml version="1.0"?><a/>"#), None);
        assert_eq!(declared_encoding(b"<a/>"), None);
    }

    #[test]
    fn test_from_bytes_windows_1250() {
        // "Łódź" in windows-1250
        let mut bytes = br#"<?xml version="1.0" encoding="windows-1250"?><Miasto>"#.to_vec();
        bytes.extend_from_slice(&[0xA3, 0xF3, 0x64, 0x9F]);
        bytes.extend_from_slice(b"</Miasto>");

        let doc = Document::from_bytes(&bytes).unwrap();
        assert_eq!(doc.node(doc.root()).text.as_deref(), Some("Łódź"));
    }

    #[test]
    fn test_from_bytes_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("<a>zażółć</a>".as_bytes());

        let doc = Document::from_bytes(&bytes).unwrap();
        assert_eq!(doc.node(doc.root()).text.as_deref(), Some("zażółć"));
    }

    #[test]
    fn test_open_missing_file() {
        let result = Document::open(Path::new("/nonexistent/emx-xmlview/input.xml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }
}
