
use fancy_regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Front-matter block at the very start of a document: `---\n<body>\n---`
static FRONT_MATTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---\n([\s\S]+?)\n---").expect("valid regex"));

/// `source_code: src/<path>` field inside the front-matter
static SOURCE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"source_code:\s*src/(.+)").expect("valid regex"));

/// Script extensions removed from the `source_code` path when deriving the URL path
const SCRIPT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".jsx", ".ts", ".tsx"];

/// A document split into heading-delimited sections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionizedDocument {
    /// Sections in document order. The first entry is whatever preceded the
    /// first heading boundary and may be empty.
    pub sections: Vec<String>,
    /// URL path taken from the front-matter `source_code` field, or empty
    pub url_path: String,
    /// Raw front-matter body, if the document had one
    pub front_matter: Option<String>,
}

impl SectionizedDocument {
    #[inline]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Sections that still contain text once surrounding whitespace is ignored
    #[inline]
    pub fn non_blank_sections(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|section| !section.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Heading splitter for one delimiter, with its boundary pattern compiled once
///
/// A boundary is one or more newlines, followed by one or more repetitions of
/// the delimiter, followed by whitespace. The delimiter is matched literally.
#[derive(Debug, Clone)]
pub struct Sectionizer {
    delimiter: String,
    boundary: Option<Regex>,
}

impl Sectionizer {
    #[inline]
    pub fn new(delimiter: &str) -> Self {
        let boundary = if delimiter.is_empty() {
            None
        } else {
            let pattern = format!(r"\n+(?:{})+\s+", fancy_regex::escape(delimiter));
            Regex::new(&pattern)
                .inspect_err(|e| warn!("Invalid section delimiter '{}': {}", delimiter, e))
                .ok()
        };

        Self {
            delimiter: delimiter.to_string(),
            boundary,
        }
    }

    #[inline]
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Split a document into sections at heading boundaries
    ///
    /// A leading front-matter block is captured and removed before splitting.
    /// Sections keep their raw text; no trimming is applied.
    #[inline]
    pub fn sectionize(&self, document_content: &str) -> SectionizedDocument {
        let (body, front_matter) = strip_front_matter(document_content);

        let url_path = front_matter
            .as_deref()
            .map(extract_url_path)
            .unwrap_or_default();

        let sections = match &self.boundary {
            Some(boundary) => split_on_boundaries(body, boundary),
            None => vec![body.to_string()],
        };

        debug!(
            "Sectionized document into {} sections (url path: '{}')",
            sections.len(),
            url_path
        );

        SectionizedDocument {
            sections,
            url_path,
            front_matter,
        }
    }
}

/// Split a document into sections at `delimiter` heading boundaries
///
/// Compiles the boundary pattern for this call only; reuse a [`Sectionizer`]
/// when splitting many documents.
#[inline]
pub fn sectionize(document_content: &str, delimiter: &str) -> SectionizedDocument {
    Sectionizer::new(delimiter).sectionize(document_content)
}

/// Remove a leading front-matter block, returning the remaining body and the block body
fn strip_front_matter(content: &str) -> (&str, Option<String>) {
    match FRONT_MATTER_REGEX.captures(content) {
        Ok(Some(captures)) => {
            let whole = captures.get(0).map_or(0, |m| m.end());
            let front_matter = captures.get(1).map(|m| m.as_str().to_string());
            let body = content.get(whole..).unwrap_or_default();
            (body, front_matter)
        }
        Ok(None) => (content, None),
        Err(e) => {
            warn!("Front-matter detection failed, treating document as body: {}", e);
            (content, None)
        }
    }
}

/// Derive the documentation URL path from the front-matter `source_code` field
///
/// `source_code: src/components/foo.js` becomes `components/foo`. A missing
/// field is logged and yields an empty path.
fn extract_url_path(front_matter: &str) -> String {
    let header = front_matter.trim();
    let matched = SOURCE_CODE_REGEX
        .captures(header)
        .ok()
        .flatten()
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string());

    match matched {
        Some(path) if !path.is_empty() => strip_script_extension(&path).to_string(),
        _ => {
            warn!(
                "Unable to extract source code URL from front-matter: {}",
                header
            );
            String::new()
        }
    }
}

fn strip_script_extension(path: &str) -> &str {
    SCRIPT_EXTENSIONS
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

fn split_on_boundaries(body: &str, boundary: &Regex) -> Vec<String> {
    let mut sections = Vec::new();
    let mut start = 0;
    for found in boundary.find_iter(body) {
        let found = match found {
            Ok(found) => found,
            Err(e) => {
                warn!("Stopped splitting sections early: {}", e);
                break;
            }
        };
        sections.push(body.get(start..found.start()).unwrap_or_default().to_string());
        start = found.end();
    }
    sections.push(body.get(start..).unwrap_or_default().to_string());

    sections
}
