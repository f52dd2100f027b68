
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use ureq::Agent;
use url::Url;

use super::{ChangedFile, ContentSource, EntryKind, FileContent, RepoEntry};
use crate::config::GithubConfig;
use crate::{DocsError, Result};

/// Page size used when listing the files of a change request
pub const CHANGED_FILES_PAGE_SIZE: usize = 100;
/// The API stops returning change-request files after 3000 entries
const MAX_CHANGED_FILE_PAGES: u32 = 30;
/// Wait applied when the quota is exhausted but no reset time was sent
const DEFAULT_RATE_LIMIT_WAIT_SECONDS: i64 = 60;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
/// Returns the file body itself; works for files the JSON form withholds
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(ContentItem),
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestFile {
    filename: String,
    status: String,
    #[serde(default)]
    previous_filename: Option<String>,
}

/// GitHub REST client for one repository
#[derive(Debug, Clone)]
pub struct GithubClient {
    agent: Agent,
    api_base: Url,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl GithubClient {
    #[inline]
    pub fn new(config: &GithubConfig) -> anyhow::Result<Self> {
        let api_base = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", config.api_url))?;

        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            api_base,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token: config.token(),
        })
    }

    #[inline]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[inline]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn repo_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| DocsError::Config(format!("Unusable API URL: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments.iter().copied().filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn contents_url(&self, path: &str) -> Result<Url> {
        let mut segments = vec!["contents"];
        segments.extend(path.split('/'));
        self.repo_url(&segments)
    }

    fn get(&self, url: &Url) -> Result<String> {
        self.get_as(url, JSON_MEDIA_TYPE)
    }

    fn get_as(&self, url: &Url, media_type: &str) -> Result<String> {
        debug!("GitHub GET {} ({})", url, media_type);

        let mut request = self
            .agent
            .get(url.as_str())
            .header("Accept", media_type)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }

        let mut response = request
            .call()
            .map_err(|e| DocsError::Network(format!("GET {url} failed: {e}")))?;

        let status = response.status().as_u16();
        if status == 403 || status == 429 {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            let signal = RateLimitSignal {
                remaining: header("x-ratelimit-remaining"),
                reset: header("x-ratelimit-reset"),
                retry_after: header("retry-after"),
            };
            if let Some(reset_at) = signal.reset_at(chrono::Utc::now().timestamp()) {
                warn!("GitHub rate limit hit on {}; resets at {}", url, reset_at);
                return Err(DocsError::RateLimited { reset_at });
            }
        }

        if status == 404 {
            return Err(DocsError::PathNotFound(url.path().to_string()));
        }

        if !(200..300).contains(&status) {
            return Err(DocsError::Network(format!("GET {url} returned HTTP {status}")));
        }

        response
            .body_mut()
            .read_to_string()
            .map_err(|e| DocsError::Network(format!("Failed to read response from {url}: {e}")))
    }

    fn fetch_contents(&self, path: &str) -> Result<ContentsResponse> {
        let url = self.contents_url(path)?;
        let body = self.get(&url)?;
        serde_json::from_str(&body).map_err(|e| {
            DocsError::Network(format!("Unexpected contents response for {path}: {e}"))
        })
    }

    /// Blocking form of [`ContentSource::list_directory`]
    #[inline]
    pub fn list_directory_blocking(&self, path: &str) -> Result<Vec<RepoEntry>> {
        let items = match self.fetch_contents(path)? {
            ContentsResponse::Listing(items) => items,
            ContentsResponse::Single(item) => vec![item],
        };

        debug!("Listed {} entries under {}", items.len(), path);

        Ok(items
            .into_iter()
            .map(|item| RepoEntry {
                name: item.name,
                path: item.path,
                kind: EntryKind::from_api(&item.kind),
            })
            .collect())
    }

    /// Blocking form of [`ContentSource::get_file_content`]
    ///
    /// Files too large for the JSON contents response are fetched again as raw text.
    #[inline]
    pub fn get_file_content_blocking(&self, path: &str) -> Result<FileContent> {
        match self.fetch_contents(path)? {
            ContentsResponse::Single(item) if item.kind == "file" => {
                let file = FileContent {
                    path: item.path,
                    encoding: item.encoding.unwrap_or_default(),
                    content: item.content.unwrap_or_default(),
                };
                if file.is_withheld() {
                    info!("{} is too large for the contents API; fetching raw", path);
                    return self.get_raw_file(path);
                }
                Ok(file)
            }
            ContentsResponse::Single(item) => Err(DocsError::Other(anyhow::anyhow!(
                "{} is a {}, not a file",
                path,
                item.kind
            ))),
            ContentsResponse::Listing(_) => Err(DocsError::Other(anyhow::anyhow!(
                "{} is a directory, not a file",
                path
            ))),
        }
    }

    fn get_raw_file(&self, path: &str) -> Result<FileContent> {
        let url = self.contents_url(path)?;
        let content = self.get_as(&url, RAW_MEDIA_TYPE)?;
        Ok(FileContent {
            path: path.to_string(),
            encoding: "utf-8".to_string(),
            content,
        })
    }

    /// Blocking form of [`ContentSource::list_changed_files`]
    #[inline]
    pub fn list_changed_files_blocking(&self, number: u64) -> Result<Vec<ChangedFile>> {
        let number = number.to_string();
        let mut files = Vec::new();

        for page in 1..=MAX_CHANGED_FILE_PAGES {
            let mut url = self.repo_url(&["pulls", &number, "files"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &CHANGED_FILES_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let body = self.get(&url)?;
            let batch: Vec<PullRequestFile> = serde_json::from_str(&body).map_err(|e| {
                DocsError::Network(format!("Unexpected files response for #{number}: {e}"))
            })?;

            let fetched = batch.len();
            files.extend(batch.into_iter().map(|file| ChangedFile {
                filename: file.filename,
                status: file.status,
                previous_filename: file.previous_filename,
            }));

            if fetched < CHANGED_FILES_PAGE_SIZE {
                break;
            }
        }

        debug!("Change request #{} touches {} files", number, files.len());
        Ok(files)
    }
}

#[async_trait]
impl ContentSource for GithubClient {
    async fn list_directory(&self, path: &str) -> Result<Vec<RepoEntry>> {
        let client = self.clone();
        let path = path.to_string();
        run_blocking(move || client.list_directory_blocking(&path)).await
    }

    async fn get_file_content(&self, path: &str) -> Result<FileContent> {
        let client = self.clone();
        let path = path.to_string();
        run_blocking(move || client.get_file_content_blocking(&path)).await
    }

    async fn list_changed_files(&self, number: u64) -> Result<Vec<ChangedFile>> {
        let client = self.clone();
        run_blocking(move || client.list_changed_files_blocking(number)).await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| DocsError::Network(format!("GitHub request task failed: {e}")))?
}

/// Rate-limit headers of a rejected response
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub remaining: Option<String>,
    pub reset: Option<String>,
    pub retry_after: Option<String>,
}

impl RateLimitSignal {
    /// Unix time at which the request may be retried, or `None` when the
    /// rejection was not caused by rate limiting
    #[inline]
    pub fn reset_at(&self, now: i64) -> Option<i64> {
        if let Some(seconds) = self
            .retry_after
            .as_deref()
            .and_then(|value| value.trim().parse::<i64>().ok())
        {
            return Some(now.saturating_add(seconds));
        }

        if self.remaining.as_deref().map(str::trim) != Some("0") {
            return None;
        }

        Some(
            self.reset
                .as_deref()
                .and_then(|value| value.trim().parse::<i64>().ok())
                .unwrap_or(now + DEFAULT_RATE_LIMIT_WAIT_SECONDS),
        )
    }
}
