// Content source module
// Repository listing and file retrieval backed by the GitHub REST API

pub mod client;
pub mod rate_limit;


use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{DocsError, Result};

pub use client::GithubClient;
pub use rate_limit::{RateLimitRetry, rate_limit_wait};

/// Kind of a repository directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    /// Symlinks, submodules and anything else the API reports
    Other(String),
}

impl EntryKind {
    #[inline]
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "dir" => Self::Dir,
            "file" => Self::File,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

/// File body as delivered by the content source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    /// Transport encoding, normally `base64`
    ///
    /// `none` means the body was withheld (files over 1 MB on the contents
    /// API) and `content` is not the file.
    pub encoding: String,
    pub content: String,
}

impl FileContent {
    #[inline]
    pub fn is_withheld(&self) -> bool {
        self.encoding.eq_ignore_ascii_case("none")
    }

    /// Decode the transport encoding into UTF-8 text
    ///
    /// Fails for a withheld body rather than yielding an empty document.
    #[inline]
    pub fn decode(&self) -> Result<String> {
        if self.is_withheld() {
            return Err(DocsError::Other(anyhow::anyhow!(
                "Content of {} was not delivered (encoding '{}')",
                self.path,
                self.encoding
            )));
        }

        if !self.encoding.eq_ignore_ascii_case("base64") {
            return Ok(self.content.clone());
        }

        let compact: String = self
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        let bytes = STANDARD.decode(compact).map_err(|e| {
            DocsError::Other(anyhow::anyhow!(
                "Failed to decode base64 content of {}: {}",
                self.path,
                e
            ))
        })?;

        String::from_utf8(bytes).map_err(|e| {
            DocsError::Other(anyhow::anyhow!(
                "Content of {} is not valid UTF-8: {}",
                self.path,
                e
            ))
        })
    }
}

/// A file touched by a change request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub filename: String,
    /// `added`, `modified`, `removed`, `renamed`, ...
    pub status: String,
    /// Path before the change, reported for renamed files
    pub previous_filename: Option<String>,
}

impl ChangedFile {
    #[inline]
    pub fn new(filename: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: status.into(),
            previous_filename: None,
        }
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.status == "removed"
    }

    /// The path this file was renamed from, if it was renamed
    #[inline]
    pub fn renamed_from(&self) -> Option<&str> {
        if self.status == "renamed" {
            self.previous_filename.as_deref()
        } else {
            None
        }
    }
}

/// Read access to the repository holding the documentation
///
/// Implementations report an exhausted request quota as
/// [`DocsError::RateLimited`] so callers can wait for the reset time.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List a directory. A path naming a single file yields a one-entry listing.
    async fn list_directory(&self, path: &str) -> Result<Vec<RepoEntry>>;

    async fn get_file_content(&self, path: &str) -> Result<FileContent>;

    /// Files changed by change request (pull request) `number`
    async fn list_changed_files(&self, number: u64) -> Result<Vec<ChangedFile>>;
}
