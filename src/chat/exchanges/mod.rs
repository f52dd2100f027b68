//! Record of chat exchanges.
//!
//! Every question the [`super::ChatResponder`] accepts ends in one
//! [`Exchange`]: the prompt that was sent to the model, the answer (if one
//! was generated), the reply actually delivered and the documents it cites.

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::{DocsError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub request_id: Uuid,
    pub question: String,
    /// Composed prompt header sent for completion
    pub prompt: String,
    /// Generated answer; `None` when generation failed
    pub answer: Option<String>,
    /// Text delivered to the user: the formatted answer or the fallback reply
    pub reply: String,
    pub source_urls: Vec<String>,
    /// Why no answer was generated
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl Exchange {
    #[inline]
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

/// Destination for finished exchanges
#[async_trait]
pub trait ExchangeLog: Send + Sync {
    async fn record(&self, exchange: &Exchange) -> Result<()>;
}

/// Keeps exchanges in memory
#[derive(Debug, Default)]
pub struct MemoryExchangeLog {
    exchanges: Mutex<Vec<Exchange>>,
}

impl MemoryExchangeLog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn exchanges(&self) -> Result<Vec<Exchange>> {
        self.exchanges
            .lock()
            .map(|exchanges| exchanges.clone())
            .map_err(|_| DocsError::Other(anyhow::anyhow!("Exchange log lock poisoned")))
    }
}

#[async_trait]
impl ExchangeLog for MemoryExchangeLog {
    async fn record(&self, exchange: &Exchange) -> Result<()> {
        self.exchanges
            .lock()
            .map_err(|_| DocsError::Other(anyhow::anyhow!("Exchange log lock poisoned")))?
            .push(exchange.clone());
        Ok(())
    }
}

/// Appends one JSON object per exchange to a file
pub struct JsonlExchangeLog {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlExchangeLog {
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every exchange recorded so far, oldest first; empty if the file does not exist yet
    #[inline]
    pub async fn load(&self) -> Result<Vec<Exchange>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    DocsError::Other(anyhow::anyhow!(
                        "Malformed exchange in {}: {}",
                        self.path.display(),
                        e
                    ))
                })
            })
            .collect()
    }
}

#[async_trait]
impl ExchangeLog for JsonlExchangeLog {
    async fn record(&self, exchange: &Exchange) -> Result<()> {
        let mut line = serde_json::to_string(exchange)
            .map_err(|e| DocsError::Other(anyhow::anyhow!("Failed to encode exchange: {}", e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(
            "Recorded exchange {} in {}",
            exchange.request_id,
            self.path.display()
        );
        Ok(())
    }
}
