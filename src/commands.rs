use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::chat::{AnswerService, ChatResponder, ExchangeLog, JsonlExchangeLog, ReplySink};
use crate::config::Config;
use crate::crawler::{CrawlStats, DocsCrawler};
use crate::database::{ChunkStore, VectorStore};
use crate::embeddings::{Completer, Embedder, OllamaClient};
use crate::github::{ContentSource, GithubClient, RateLimitRetry};
use crate::indexer::Reindexer;
use crate::retrieval::Retriever;

static SERVICES: OnceCell<Services> = OnceCell::const_new();

/// Long-lived clients shared by every command
///
/// Built once per process by [`shared_services`]; the pipeline components
/// receive these handles explicitly instead of reaching for globals.
pub struct Services {
    config: Config,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    source: Arc<dyn ContentSource>,
    reindexer: Reindexer,
    exchange_log: Option<Arc<dyn ExchangeLog>>,
}

impl Services {
    /// Connect the vector store, Ollama and GitHub clients described by `config`
    #[inline]
    pub async fn initialize(config: Config) -> Result<Self> {
        let store = Arc::new(
            VectorStore::new(&config)
                .await
                .context("Failed to open vector store")?,
        );
        let ollama =
            Arc::new(OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?);
        let github = GithubClient::new(&config.github).context("Failed to create GitHub client")?;

        info!(
            "Services ready: repository {}, embeddings via {}",
            github.repository(),
            config.ollama.model
        );

        let exchange_log = Arc::new(JsonlExchangeLog::new(config.exchange_log_path()));

        Ok(Self::from_parts(
            config,
            store,
            Arc::clone(&ollama) as Arc<dyn Embedder>,
            ollama,
            Arc::new(RateLimitRetry::new(github)),
        )
        .with_exchange_log(exchange_log))
    }

    /// Assemble services from already constructed capabilities
    #[inline]
    pub fn from_parts(
        config: Config,
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        source: Arc<dyn ContentSource>,
    ) -> Self {
        let reindexer = Reindexer::new(Arc::clone(&store), Arc::clone(&embedder));
        Self {
            config,
            store,
            embedder,
            completer,
            source,
            reindexer,
            exchange_log: None,
        }
    }

    /// Record every chat exchange answered through [`Services::chat_responder`]
    #[inline]
    pub fn with_exchange_log(mut self, exchange_log: Arc<dyn ExchangeLog>) -> Self {
        self.exchange_log = Some(exchange_log);
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Crawl driver sharing this process's re-indexer and its per-URL locks
    #[inline]
    pub fn crawler(&self) -> DocsCrawler {
        DocsCrawler::new(
            Arc::clone(&self.source),
            self.reindexer.clone(),
            &self.config.docs,
        )
    }

    #[inline]
    pub fn retriever(&self) -> Retriever {
        Retriever::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
            &self.config.retrieval,
        )
    }

    #[inline]
    pub fn chat_responder(&self) -> ChatResponder {
        let service = AnswerService::new(
            self.retriever(),
            Arc::clone(&self.completer),
            &self.config.assistant,
            &self.config.retrieval,
        );
        let responder = ChatResponder::new(Arc::new(service), &self.config.assistant);
        match &self.exchange_log {
            Some(log) => responder.with_exchange_log(Arc::clone(log)),
            None => responder,
        }
    }
}

/// Process-wide services, initialised on first use from `config_dir`
#[inline]
pub async fn shared_services(config_dir: &Path) -> Result<&'static Services> {
    SERVICES
        .get_or_try_init(|| async {
            let config = Config::load(config_dir)?;
            Services::initialize(config).await
        })
        .await
}

/// Re-index every document under the configured documentation root
#[inline]
pub async fn reindex_all(services: &Services) -> Result<CrawlStats> {
    let docs = &services.config.docs;
    println!(
        "Re-indexing {}/{} (*.{})",
        services.config.github.owner, docs.docs_root, docs.file_extension
    );

    let stats = services
        .crawler()
        .reindex_docs()
        .await
        .context("Re-index of documentation root failed")?;

    report(&stats)
}

/// Re-index the documentation files touched by a change request
#[inline]
pub async fn reindex_change_request(services: &Services, number: u64) -> Result<CrawlStats> {
    println!("Re-indexing documentation changed in #{}", number);

    let stats = services
        .crawler()
        .reindex_change_request(number)
        .await
        .with_context(|| format!("Re-index of change request #{} failed", number))?;

    report(&stats)
}

/// Re-index one repository file
#[inline]
pub async fn reindex_file(services: &Services, path: &str) -> Result<()> {
    let report = services
        .crawler()
        .reindex_file(path)
        .await
        .with_context(|| format!("Re-index of {} failed", path))?;

    println!("✅ {}", report.source_url);
    println!("   Removed chunks: {}", report.removed);
    println!("   Inserted chunks: {}", report.inserted);
    Ok(())
}

/// Prints replies to standard output
struct ConsoleSink;

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn send(&self, reply: &str) -> crate::Result<()> {
        println!("{}", reply);
        Ok(())
    }
}

/// Ask a question and print the grounded reply
#[inline]
pub async fn ask(services: &Services, question: String) -> Result<()> {
    let (acknowledgement, handle) = services
        .chat_responder()
        .accept(question, Arc::new(ConsoleSink));
    eprintln!("⏳ Accepted ({})", acknowledgement.request_id);

    handle.await.context("Answer task did not finish")?;
    Ok(())
}

/// Show stored chunk counts and backend health
#[inline]
pub async fn show_status(services: &Services, source_url: Option<&str>) -> Result<()> {
    let config = &services.config;

    println!("📊 Docs RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📚 Source:");
    println!(
        "   Repository: {}/{}",
        config.github.owner, config.github.repo
    );
    println!(
        "   Documents: {}/**.{}",
        config.docs.docs_root, config.docs.file_extension
    );
    println!("   Published at: {}", config.docs.source_url);
    println!();

    println!("🔍 Vector Database:");
    match services.store.count_chunks(None).await {
        Ok(total) => println!("   📄 Total chunks: {}", total),
        Err(e) => println!("   ❌ Failed to count chunks - {}", e),
    }
    if let Some(url) = source_url {
        match services.store.count_chunks(Some(url)).await {
            Ok(count) => println!("   📄 Chunks for {}: {}", url, count),
            Err(e) => println!("   ❌ Failed to count chunks for {} - {}", url, e),
        }
    }
    println!();

    println!("💬 Chat:");
    let exchange_log = JsonlExchangeLog::new(config.exchange_log_path());
    match exchange_log.load().await {
        Ok(exchanges) => {
            let answered = exchanges.iter().filter(|e| e.is_answered()).count();
            println!(
                "   📝 Exchanges recorded: {} ({} answered)",
                exchanges.len(),
                answered
            );
        }
        Err(e) => println!("   ❌ Failed to read {} - {}", exchange_log.path().display(), e),
    }
    println!();

    println!("🤖 Ollama:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match tokio::task::spawn_blocking(move || client.health_check()).await {
            Ok(Ok(())) => {
                println!(
                    "   ✅ Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Embedding model: {}", config.ollama.model);
                println!("   💬 Completion model: {}", config.ollama.completion_model);
            }
            Ok(Err(e)) => println!("   ⚠️  Connected but unhealthy - {}", e),
            Err(e) => println!("   ⚠️  Health check did not complete - {}", e),
        },
        Err(e) => println!("   ❌ Failed to connect - {}", e),
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'docs-rag reindex all' to index the documentation");
    println!("   • Use 'docs-rag ask \"<question>\"' to query it");

    Ok(())
}

fn report(stats: &CrawlStats) -> Result<CrawlStats> {
    println!("  Documents: {}", stats.total_files);
    println!("  Re-indexed: {}", stats.indexed_files);
    if stats.purged_files > 0 {
        println!("  Purged: {}", stats.purged_files);
    }
    println!("  Chunks written: {}", stats.chunks_written);
    println!("  Duration: {:?}", stats.duration);

    if stats.is_clean() {
        println!("✅ Re-index completed successfully!");
        return Ok(stats.clone());
    }

    for path in &stats.failed_paths {
        warn!("Not fully indexed: {}", path);
        println!("  ❌ {}", path);
    }
    error!("{} documents failed to re-index", stats.failed_files);
    bail!(
        "{} of {} documents failed to re-index",
        stats.failed_files,
        stats.total_files
    )
}
