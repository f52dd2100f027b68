// Documents module
// Turns raw repository files into addressable sections and their citable URL

pub mod locator;
pub mod sectionizer;

pub use locator::{SourceLocator, resolve_source_url};
pub use sectionizer::{SectionizedDocument, Sectionizer, sectionize};

/// A documentation file fetched from the repository for one indexing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Repository path, unique within a snapshot (e.g. `docs/core/entity.md`)
    pub path: String,
    /// Decoded UTF-8 content
    pub raw_content: String,
}

impl Document {
    #[inline]
    pub fn new(path: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            raw_content: raw_content.into(),
        }
    }

    /// File extension without the leading dot, if the file name has one
    #[inline]
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.path)
    }
}

/// Extension of the last path component, without the dot
#[inline]
pub fn extension_of(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next()?;
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Whether `path` names a file with the given extension (with or without a leading dot)
#[inline]
pub fn has_extension(path: &str, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    extension_of(path).is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}
