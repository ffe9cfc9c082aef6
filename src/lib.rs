//! # emx-xmlview
//!
//! Readable rendering of XML documents with embedded base64 attachments.
//!
//! Document-exchange formats (signed administrative documents, e-filing
//! envelopes) often embed whole files inline as base64 text nodes. This crate
//! flattens such a document into indented `tag: value` lines and recovers the
//! embedded files with a best-guess name and extension.
//!
//! ## Flattening
//!
//! The tree is walked depth-first in document order:
//!
//! ```text
//! <Dokument>                          Dokument is empty, nothing emitted
//!   <Informacja>Wniosek</Informacja>    ## Wniosek
//!   <Miasto>Kraków</Miasto>             Miasto: Kraków
//!   <Zalacznik nazwaPliku="skan">       Zalacznik:
//!     JVBERi0xLjQK...                     Attachment name: skan.pdf
//!   </Zalacznik>
//! </Dokument>
//! ```
//!
//! Namespace qualification is ignored. Text that already reads like
//! `label: value` is emitted verbatim.
//!
//! ## Attachment Names
//!
//! An attachment takes its name from the `nazwaPliku`/`NazwaPliku`/`Nazwa`
//! attribute of its own element or of the nearest ancestor declaring one.
//! Unnamed attachments become `attachment_1`, `attachment_2`, ... in
//! traversal order. A name without an extension gets one from the
//! [`sniff`](sniff::sniff)ed content, or `.bin` as a last resort.
//!
//! ## Detection Rules
//!
//! A text node is a payload if (see [`detect`]):
//! 1. It is longer than 100 characters
//! 2. It decodes as base64
//! 3. Re-encoding reproduces its first 100 characters
//!
//! The content type is sniffed from magic bytes, looking inside ZIP
//! containers (DOCX/XLSX/PPTX) and OLE compound files (DOC/XLS/PPT/MSG).
//!
//! ## Signature Blocks
//!
//! `SignatureValue` and `X509Certificate` subtrees are skipped by default;
//! they are large base64 blobs that are not attachments.

pub mod detect;
pub mod document;
pub mod export;
pub mod extract;
pub mod sniff;

pub use detect::is_base64_payload;
pub use document::{local_name, Document, Node, NodeId};
pub use export::{summary_lines, ExportFailure, ExportReport, Exporter};
pub use extract::{
    is_signature_block, resolve_name,
    Attachment, ExtractConfig, Extraction, Extractor,
};
pub use sniff::{sniff, Format};
