
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::DocsConfig;
use crate::documents::{Sectionizer, SourceLocator, has_extension};
use crate::github::{ContentSource, EntryKind};
use crate::indexer::{ReindexReport, Reindexer};
use crate::{DocsError, Result};

/// Summary of one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Files selected for processing
    pub total_files: usize,
    /// Files whose chunks were fully replaced
    pub indexed_files: usize,
    /// Files removed upstream whose chunks were purged
    pub purged_files: usize,
    /// Files that failed at any pipeline stage
    pub failed_files: usize,
    /// Chunks written across all files
    pub chunks_written: usize,
    pub failed_paths: Vec<String>,
    pub duration: Duration,
}

impl CrawlStats {
    #[inline]
    pub fn total_processed(&self) -> usize {
        self.indexed_files + self.purged_files + self.failed_files
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failed_files == 0
    }

    fn merge(&mut self, other: CrawlStats) {
        self.total_files += other.total_files;
        self.indexed_files += other.indexed_files;
        self.purged_files += other.purged_files;
        self.failed_files += other.failed_files;
        self.chunks_written += other.chunks_written;
        self.failed_paths.extend(other.failed_paths);
    }
}

/// Walks the documentation tree and feeds every file through
/// fetch, decode, sectionize, locate and re-index
pub struct DocsCrawler {
    source: Arc<dyn ContentSource>,
    reindexer: Reindexer,
    locator: SourceLocator,
    sectionizer: Sectionizer,
    docs: DocsConfig,
    show_progress: bool,
}

impl DocsCrawler {
    #[inline]
    pub fn new(source: Arc<dyn ContentSource>, reindexer: Reindexer, docs: &DocsConfig) -> Self {
        Self {
            source,
            reindexer,
            locator: SourceLocator::from_config(docs),
            sectionizer: Sectionizer::new(&docs.section_delimiter),
            docs: docs.clone(),
            show_progress: true,
        }
    }

    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Re-index the configured documentation root
    #[inline]
    pub async fn reindex_docs(&self) -> Result<CrawlStats> {
        self.reindex_all(&self.docs.docs_root, &self.docs.file_extension)
            .await
    }

    /// Re-index every document under `root_path`
    ///
    /// Directories directly under the root contribute their files with the
    /// given extension; files directly under the root are processed as they
    /// are. Any other kind of entry fails the whole crawl with
    /// [`DocsError::PathNotFound`] before anything is re-indexed.
    #[inline]
    pub async fn reindex_all(&self, root_path: &str, file_extension: &str) -> Result<CrawlStats> {
        info!("Collecting documents under {}", root_path);

        let mut paths = Vec::new();
        for entry in self.source.list_directory(root_path).await? {
            match entry.kind {
                EntryKind::Dir => {
                    let children = self.source.list_directory(&entry.path).await?;
                    paths.extend(
                        children
                            .into_iter()
                            .filter(|child| {
                                child.kind == EntryKind::File
                                    && has_extension(&child.name, file_extension)
                            })
                            .map(|child| child.path),
                    );
                }
                EntryKind::File => paths.push(entry.path),
                EntryKind::Other(kind) => {
                    error!("Unexpected {} entry at {}", kind, entry.path);
                    return Err(DocsError::PathNotFound(entry.path));
                }
            }
        }

        info!("Found {} documents under {}", paths.len(), root_path);
        Ok(self.run(&paths).await)
    }

    /// Re-index the given files; paths are expected to lie under the documentation root
    #[inline]
    pub async fn reindex_changed_files(&self, changed_file_paths: &[String]) -> Result<CrawlStats> {
        Ok(self.run(changed_file_paths).await)
    }

    /// Re-index the documentation files touched by change request `number`
    ///
    /// Files outside the documentation root are ignored. Files removed by the
    /// change request, and the old paths of renamed files, have their chunks
    /// purged instead of being fetched.
    #[inline]
    pub async fn reindex_change_request(&self, number: u64) -> Result<CrawlStats> {
        let started = Instant::now();
        let changed = self.source.list_changed_files(number).await?;

        let mut removed = Vec::new();
        let mut updated = Vec::new();
        for file in changed {
            if let Some(previous) = file
                .renamed_from()
                .filter(|previous| self.is_documentation_file(previous))
            {
                removed.push(previous.to_string());
            }
            if !self.is_documentation_file(&file.filename) {
                continue;
            }
            if file.is_removed() {
                removed.push(file.filename);
            } else {
                updated.push(file.filename);
            }
        }

        info!(
            "Change request #{}: {} documents to re-index, {} to purge",
            number,
            updated.len(),
            removed.len()
        );

        let mut stats = CrawlStats {
            total_files: removed.len(),
            ..CrawlStats::default()
        };

        for path in removed {
            match self.purge_document(&path).await {
                Ok(_) => stats.purged_files += 1,
                Err(e) => {
                    error!("Failed to purge {}: {}", path, e);
                    stats.failed_files += 1;
                    stats.failed_paths.push(path);
                }
            }
        }

        stats.merge(self.run(&updated).await);
        stats.duration = started.elapsed();

        Ok(stats)
    }

    /// Remove every chunk cut from the repository file `path`
    ///
    /// Covers the path-derived URL as well as any other URL the file's
    /// chunks were stored under, such as one taken from its front-matter.
    #[inline]
    pub async fn purge_document(&self, path: &str) -> Result<u64> {
        let mut source_urls = self
            .reindexer
            .store()
            .source_urls_for_document(path)
            .await?;
        let path_url = self.locator.locate(path, "");
        if !source_urls.contains(&path_url) {
            source_urls.push(path_url);
        }

        let mut removed = 0;
        for source_url in &source_urls {
            removed += self.reindexer.purge(source_url).await?;
        }
        debug!("Purged {} chunks of {} across {:?}", removed, path, source_urls);
        Ok(removed)
    }

    /// Fetch, sectionize and re-index one file
    ///
    /// Chunks the same file left under a different URL, after its
    /// front-matter changed, are purged afterwards.
    #[inline]
    pub async fn reindex_file(&self, path: &str) -> Result<ReindexReport> {
        debug!("Fetching {}", path);
        let file = self.source.get_file_content(path).await?;
        let content = file.decode()?;

        let document = self.sectionizer.sectionize(&content);
        let sections = document.non_blank_sections();
        let source_url = self.locator.locate(path, &document.url_path);

        debug!(
            "{}: {} sections ({} non-blank) -> {}",
            path,
            document.section_count(),
            sections.len(),
            source_url
        );

        let result = self
            .reindexer
            .reindex_document(&sections, &source_url, path)
            .await;
        self.purge_stale_urls(path, &source_url).await;
        result
    }

    async fn purge_stale_urls(&self, path: &str, current_url: &str) {
        let source_urls = match self.reindexer.store().source_urls_for_document(path).await {
            Ok(source_urls) => source_urls,
            Err(e) => {
                warn!("Could not look up earlier URLs of {}: {}", path, e);
                return;
            }
        };

        for stale in source_urls.iter().filter(|url| url.as_str() != current_url) {
            info!("{} moved from {} to {}", path, stale, current_url);
            if let Err(e) = self.reindexer.purge(stale).await {
                warn!("Failed to purge stale chunks of {} at {}: {}", path, stale, e);
            }
        }
    }

    /// Whether `path` is a documentation file under the configured root
    #[inline]
    pub fn is_documentation_file(&self, path: &str) -> bool {
        let root = self.docs.docs_root.trim_end_matches('/');
        let under_root = root.is_empty()
            || path
                .strip_prefix(root)
                .is_some_and(|rest| rest.starts_with('/'));
        under_root && has_extension(path, &self.docs.file_extension)
    }

    /// Run the per-file pipeline over `paths` with bounded concurrency
    async fn run(&self, paths: &[String]) -> CrawlStats {
        let started = Instant::now();
        let mut stats = CrawlStats {
            total_files: paths.len(),
            ..CrawlStats::default()
        };

        let bar = if self.show_progress && console::user_attended_stderr() {
            ProgressBar::new(paths.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut results = futures::stream::iter(paths)
            .map(|path| async move { (path, self.reindex_file(path).await) })
            .buffer_unordered(self.docs.concurrency.max(1));

        while let Some((path, result)) = results.next().await {
            bar.set_message(path.clone());
            match result {
                Ok(report) => {
                    stats.indexed_files += 1;
                    stats.chunks_written += report.inserted;
                }
                Err(DocsError::PartialReindex {
                    source_url,
                    failed_sections,
                }) => {
                    warn!(
                        "{} indexed with {} failed sections ({}): {:?}",
                        path,
                        failed_sections.len(),
                        source_url,
                        failed_sections
                    );
                    stats.failed_files += 1;
                    stats.failed_paths.push(path.clone());
                }
                Err(e) => {
                    error!("Failed to index {}: {}", path, e);
                    stats.failed_files += 1;
                    stats.failed_paths.push(path.clone());
                }
            }
            bar.set_position(stats.total_processed() as u64);
        }

        bar.finish_and_clear();
        stats.duration = started.elapsed();

        info!(
            "Indexed {}/{} documents ({} chunks, {} failed) in {:?}",
            stats.indexed_files, stats.total_files, stats.chunks_written, stats.failed_files,
            stats.duration
        );
        stats
    }
}
