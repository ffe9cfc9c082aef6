//! Attachment export

use crate::extract::Attachment;
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name used when sanitizing leaves nothing
const EMPTY_NAME_REPLACEMENT: &str = "attachment";

/// An attachment that could not be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    /// Attachment name as resolved during extraction
    pub name: String,
    /// Human readable cause
    pub reason: String,
}

/// Outcome of saving a batch of attachments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Paths written, in attachment order
    pub saved: Vec<PathBuf>,
    /// Attachments skipped because of decode or I/O errors
    pub failed: Vec<ExportFailure>,
}

impl ExportReport {
    /// True when every attachment was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes decoded attachments into a directory
pub struct Exporter {
    /// Replace existing files instead of picking a suffixed name
    overwrite: bool,
}

impl Exporter {
    /// Create a new exporter that never overwrites
    pub fn new() -> Self {
        Self { overwrite: false }
    }

    /// Replace files that already exist in the target directory
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Save all attachments into `dir`, creating it if needed.
    ///
    /// A broken attachment is recorded in the report and does not stop the
    /// rest. Unless overwriting is enabled, existing files are kept and a
    /// numeric suffix is added instead (`scan.pdf`, `scan_1.pdf`, ...).
    pub fn save_all(&self, attachments: &[Attachment], dir: &Path) -> Result<ExportReport> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut report = ExportReport::default();
        for attachment in attachments {
            match self.save(attachment, dir) {
                Ok(path) => report.saved.push(path),
                Err(e) => {
                    log::warn!("Failed to save {}: {:#}", attachment.name, e);
                    report.failed.push(ExportFailure {
                        name: attachment.name.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Decode one attachment and write it under a free name in `dir`
    pub fn save(&self, attachment: &Attachment, dir: &Path) -> Result<PathBuf> {
        let data = attachment
            .decode()
            .with_context(|| format!("Failed to decode base64 for attachment '{}'", attachment.name))?;

        let name = safe_file_name(&attachment.name);

        if self.overwrite {
            let path = dir.join(&name);
            fs::write(&path, &data)
                .with_context(|| format!("Failed to write: {}", path.display()))?;
            log::debug!("Saved {} ({} bytes)", path.display(), data.len());
            return Ok(path);
        }

        let (stem, extension) = split_name(&name);

        let mut counter = 0usize;
        loop {
            let candidate = if counter == 0 {
                dir.join(&name)
            } else {
                dir.join(format!("{}_{}{}", stem, counter, extension))
            };

            match fs::OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut file) => {
                    file.write_all(&data)
                        .with_context(|| format!("Failed to write: {}", candidate.display()))?;
                    log::debug!("Saved {} ({} bytes)", candidate.display(), data.len());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create: {}", candidate.display()));
                }
            }
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

/// One line per attachment: `1. name (.ext)`, or `(unknown type)` when the
/// payload does not decode
pub fn summary_lines(attachments: &[Attachment]) -> Vec<String> {
    attachments
        .iter()
        .enumerate()
        .map(|(i, attachment)| match attachment.format() {
            Some(format) => format!("{}. {} ({})", i + 1, attachment.name, format),
            None => format!("{}. {} (unknown type)", i + 1, attachment.name),
        })
        .collect()
}

/// Reduce a document-supplied name to a single safe path component
pub fn safe_file_name(name: &str) -> String {
    let sanitized = sanitize_filename::sanitize(name);
    if sanitized.trim_matches('.').is_empty() {
        EMPTY_NAME_REPLACEMENT.to_string()
    } else {
        sanitized
    }
}

/// Split into stem and extension (with its dot), like `scan` + `.pdf`
fn split_name(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, extension)
}
