#[cfg(test)]
mod tests;

use tracing::debug;

use crate::config::DocsConfig;

/// Build the citable URL for a repository document
///
/// The configured prefix (for example the `docs/` folder) is removed from the
/// start of `document_path` and the remainder is appended to `base_url`. The
/// result is the identity key shared by every stored chunk of the document.
#[inline]
pub fn resolve_source_url(document_path: &str, base_url: &str, path_prefix_to_strip: &str) -> String {
    let relative = if path_prefix_to_strip.is_empty() {
        document_path
    } else {
        document_path
            .strip_prefix(path_prefix_to_strip)
            .unwrap_or(document_path)
    };

    format!("{}{}", base_url, relative)
}

/// Resolves source URLs for documents using the configured base URL and prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    base_url: String,
    strip_prefix: String,
    prefer_front_matter: bool,
}

impl SourceLocator {
    #[inline]
    pub fn new(base_url: impl Into<String>, strip_prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            strip_prefix: strip_prefix.into(),
            prefer_front_matter: false,
        }
    }

    #[inline]
    pub fn from_config(config: &DocsConfig) -> Self {
        Self::new(config.source_url.clone(), config.strip_prefix.clone())
            .with_front_matter_preference(config.prefer_front_matter_url)
    }

    /// Prefer the front-matter URL path over the repository path when one was found
    #[inline]
    pub fn with_front_matter_preference(mut self, prefer: bool) -> Self {
        self.prefer_front_matter = prefer;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Source URL for a document path, optionally using the front-matter URL path
    #[inline]
    pub fn locate(&self, document_path: &str, front_matter_url_path: &str) -> String {
        if self.prefer_front_matter && !front_matter_url_path.is_empty() {
            let url = format!("{}{}", self.base_url, front_matter_url_path);
            debug!("Resolved {} to {} via front-matter", document_path, url);
            return url;
        }

        let url = resolve_source_url(document_path, &self.base_url, &self.strip_prefix);
        debug!("Resolved {} to {}", document_path, url);
        url
    }
}
