//! Binary format sniffing
//!
//! Decoded attachments rarely carry a usable name, so the file type is
//! guessed from magic bytes. Rules are tried in a fixed order, first match
//! wins:
//!
//! 1. `%PDF-` → `.pdf`
//! 2. JPEG SOI `FF D8 FF` → `.jpg`
//! 3. PNG signature → `.png`
//! 4. ZIP local header `PK\x03\x04` → container inspection
//! 5. `<?xml` or `<` → `.xml`
//! 6. `From:` header, or `\nFrom:` early in the data → `.eml`
//! 7. OLE compound file → `.msg` for Outlook items, else container inspection
//! 8. Valid UTF-8 that is not an XML document → `.txt`
//! 9. Anything else → [`Format::Unknown`]
//!
//! Rules 1-6 look at the first [`HEADER_LEN`] bytes with leading ASCII
//! whitespace (vertical tab included) skipped. Container inspection opens ZIP archives to tell
//! OOXML documents apart and scans the OLE header sectors for stream names.

use std::io::Cursor;

/// Number of leading bytes examined by the prefix rules
pub const HEADER_LEN: usize = 100;
/// Window searched for an embedded `From:` line
pub const MAIL_SCAN_LEN: usize = 200;
/// Start of the OLE window searched for stream names
pub const OLE_SCAN_START: usize = 512;
/// End of the OLE window, also the length of the text and Outlook samples
pub const SAMPLE_LEN: usize = 2048;

const PDF_MAGIC: &[u8] = b"%PDF-";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const XML_DECLARATION: &[u8] = b"<?xml";
const MAIL_FROM: &[u8] = b"From:";
const VERTICAL_TAB: u8 = 0x0B;

/// File type guessed from content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Pdf,
    Jpeg,
    Png,
    Zip,
    Docx,
    Xlsx,
    Pptx,
    Xml,
    Eml,
    Msg,
    Doc,
    Xls,
    Ppt,
    /// OLE compound file without a recognised stream
    Ole,
    Text,
    /// No rule matched
    Unknown,
}

impl Format {
    /// File extension including the leading dot, `None` for [`Format::Unknown`]
    pub fn extension(self) -> Option<&'static str> {
        let ext = match self {
            Format::Pdf => ".pdf",
            Format::Jpeg => ".jpg",
            Format::Png => ".png",
            Format::Zip => ".zip",
            Format::Docx => ".docx",
            Format::Xlsx => ".xlsx",
            Format::Pptx => ".pptx",
            Format::Xml => ".xml",
            Format::Eml => ".eml",
            Format::Msg => ".msg",
            Format::Doc => ".doc",
            Format::Xls => ".xls",
            Format::Ppt => ".ppt",
            Format::Ole => ".ole",
            Format::Text => ".txt",
            Format::Unknown => return None,
        };
        Some(ext)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.extension() {
            Some(ext) => write!(f, "{}", ext),
            None => write!(f, "unknown"),
        }
    }
}

/// Guess the format of a decoded attachment
pub fn sniff(data: &[u8]) -> Format {
    let header = skip_ascii_whitespace(clamp(data, 0, HEADER_LEN));

    if header.starts_with(PDF_MAGIC) {
        Format::Pdf
    } else if header.starts_with(JPEG_MAGIC) {
        Format::Jpeg
    } else if header.starts_with(PNG_MAGIC) {
        Format::Png
    } else if header.starts_with(ZIP_MAGIC) {
        inspect_container(data)
    } else if header.starts_with(XML_DECLARATION) || header.starts_with(b"<") {
        Format::Xml
    } else if looks_like_mail(header, data) {
        Format::Eml
    } else if data.starts_with(OLE_MAGIC) {
        let sample = clamp(data, 0, SAMPLE_LEN).to_ascii_lowercase();
        if contains(&sample, b"outlook message") || contains(&sample, b"microsoft outlook") {
            Format::Msg
        } else {
            inspect_container(data)
        }
    } else {
        text_or_unknown(data)
    }
}

/// Refine a ZIP or OLE buffer by looking inside the container
fn inspect_container(data: &[u8]) -> Format {
    if let Some(format) = zip_format(data) {
        return format;
    }
    if data.starts_with(OLE_MAGIC) {
        return ole_format(data);
    }
    text_or_unknown(data)
}

/// Classify a ZIP archive by its entry names, `None` if it does not open
fn zip_format(data: &[u8]) -> Option<Format> {
    let archive = match zip::ZipArchive::new(Cursor::new(data)) {
        Ok(archive) => archive,
        Err(e) => {
            log::debug!("ZIP signature present but archive unreadable: {}", e);
            return None;
        }
    };

    let has_prefix = |prefix: &str| archive.file_names().any(|name| name.starts_with(prefix));

    let format = if has_prefix("word/") {
        Format::Docx
    } else if has_prefix("xl/") {
        Format::Xlsx
    } else if has_prefix("ppt/") {
        Format::Pptx
    } else {
        Format::Zip
    };
    Some(format)
}

/// Classify an OLE compound file by the stream names near its directory
fn ole_format(data: &[u8]) -> Format {
    let window = clamp(data, OLE_SCAN_START, SAMPLE_LEN).to_ascii_lowercase();

    if contains(&window, b"worddocument") {
        Format::Doc
    } else if contains(&window, b"workbook") {
        Format::Xls
    } else if contains(&window, b"powerpoint document") {
        Format::Ppt
    } else {
        Format::Ole
    }
}

/// Final fallback: readable UTF-8 is plain text
fn text_or_unknown(data: &[u8]) -> Format {
    let sample = clamp(data, 0, SAMPLE_LEN);
    let text = match std::str::from_utf8(sample) {
        Ok(text) => text,
        // The sample cut may split a multi-byte character
        Err(e) if e.error_len().is_none() && sample.len() < data.len() => {
            match std::str::from_utf8(&sample[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return Format::Unknown,
            }
        }
        Err(_) => return Format::Unknown,
    };

    if text.trim_start().starts_with("<?xml") {
        Format::Unknown
    } else {
        Format::Text
    }
}

fn looks_like_mail(header: &[u8], data: &[u8]) -> bool {
    if header.starts_with(MAIL_FROM) {
        return true;
    }
    let window = clamp(data, 0, MAIL_SCAN_LEN);
    contains(window, b"\r\nFrom:") || contains(window, b"\nFrom:")
}

/// `data[start..end]` with both bounds clamped to the buffer
fn clamp(data: &[u8], start: usize, end: usize) -> &[u8] {
    let end = end.min(data.len());
    let start = start.min(end);
    &data[start..end]
}

fn skip_ascii_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace() && *b != VERTICAL_TAB)
        .unwrap_or(data.len());
    &data[start..]
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
