// Chat module
// Answers questions grounded in the indexed documentation

pub mod exchanges;


use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{AssistantConfig, RetrievalConfig};
use crate::embeddings::Completer;
use crate::retrieval::{ComposedContext, ContextComposer, Retriever};
use crate::{DocsError, Result};

pub use exchanges::{Exchange, ExchangeLog, JsonlExchangeLog, MemoryExchangeLog};

/// A generated answer and the documents it cites
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub source_urls: Vec<String>,
}

/// Retrieve, compose, complete
pub struct AnswerService {
    retriever: Retriever,
    composer: ContextComposer,
    completer: Arc<dyn Completer>,
    char_budget: usize,
}

impl AnswerService {
    #[inline]
    pub fn new(
        retriever: Retriever,
        completer: Arc<dyn Completer>,
        assistant: &AssistantConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            composer: ContextComposer::new(assistant.preamble()),
            completer,
            char_budget: retrieval.char_budget,
        }
    }

    /// Answer `question`, grounded in whatever the retriever finds
    ///
    /// Missing grounding is not an error. A failed or empty completion is.
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let context = self.prepare(question).await;
        self.generate(question, &context).await
    }

    /// Retrieve grounding for `question` and compose the prompt header
    #[inline]
    pub async fn prepare(&self, question: &str) -> ComposedContext {
        let candidates = self.retriever.retrieve(question).await;
        let context = self
            .composer
            .compose(&candidates, question, self.char_budget);

        if !context.is_grounded() {
            info!("No grounding found for question: {}", question);
        }
        debug!("Prompt: {}", context.prompt_header);
        context
    }

    /// Complete an already composed prompt
    #[inline]
    pub async fn generate(&self, question: &str, context: &ComposedContext) -> Result<Answer> {
        let text = self
            .completer
            .complete(&context.prompt_header)
            .await
            .inspect_err(|e| error!("Completion failed for question '{}': {}", question, e))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            error!("Completion for question '{}' was empty", question);
            return Err(DocsError::Completion("model returned an empty answer".to_string()));
        }

        Ok(Answer {
            text,
            source_urls: context.source_urls.clone(),
        })
    }
}

/// Where finished replies are delivered
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, reply: &str) -> Result<()>;
}

/// Returned to the caller as soon as a question is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    pub request_id: Uuid,
}

/// Accepts questions immediately and answers them in the background
#[derive(Clone)]
pub struct ChatResponder {
    service: Arc<AnswerService>,
    exchange_log: Option<Arc<dyn ExchangeLog>>,
    fallback_reply: String,
    html_links: bool,
}

impl ChatResponder {
    #[inline]
    pub fn new(service: Arc<AnswerService>, assistant: &AssistantConfig) -> Self {
        Self {
            service,
            exchange_log: None,
            fallback_reply: assistant.fallback_reply.clone(),
            html_links: assistant.html_links,
        }
    }

    /// Record every finished exchange in `log`
    #[inline]
    pub fn with_exchange_log(mut self, log: Arc<dyn ExchangeLog>) -> Self {
        self.exchange_log = Some(log);
        self
    }

    /// Acknowledge `question` and spawn the work that answers it
    ///
    /// Failures inside the spawned task are logged and the sink receives the
    /// fallback reply instead of error details.
    #[inline]
    pub fn accept(
        &self,
        question: String,
        sink: Arc<dyn ReplySink>,
    ) -> (Acknowledgement, JoinHandle<()>) {
        let acknowledgement = Acknowledgement {
            request_id: Uuid::new_v4(),
        };
        info!(
            "Accepted question {}: {}",
            acknowledgement.request_id, question
        );

        let responder = self.clone();
        let request_id = acknowledgement.request_id;
        let handle = tokio::spawn(async move {
            responder.respond(request_id, &question, sink.as_ref()).await;
        });

        (acknowledgement, handle)
    }

    async fn respond(&self, request_id: Uuid, question: &str, sink: &dyn ReplySink) {
        let context = self.service.prepare(question).await;
        let outcome = self.service.generate(question, &context).await;

        let reply = match &outcome {
            Ok(answer) => format_reply(question, &answer.text, &answer.source_urls, self.html_links),
            Err(e) => {
                error!("Question {} failed: {}", request_id, e);
                self.fallback_reply.clone()
            }
        };

        match sink.send(&reply).await {
            Ok(()) => debug!("Delivered reply for question {}", request_id),
            Err(e) => error!("Failed to deliver reply for question {}: {}", request_id, e),
        }

        let Some(log) = &self.exchange_log else {
            return;
        };
        let (answer, error) = match outcome {
            Ok(answer) => (Some(answer.text), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let exchange = Exchange {
            request_id,
            question: question.to_string(),
            prompt: context.prompt_header,
            answer,
            reply,
            source_urls: context.source_urls,
            error,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = log.record(&exchange).await {
            warn!("Failed to record exchange {}: {}", request_id, e);
        }
    }
}

/// Quote the question, then the answer, then the cited documents
#[inline]
pub fn format_reply(question: &str, answer: &str, source_urls: &[String], html_links: bool) -> String {
    let mut reply = format!("> {}\n\n{}", question, answer);

    if !source_urls.is_empty() {
        reply.push_str("\n\nRelated documentation links:\n");
        for url in source_urls {
            let link = match url.strip_suffix(".md") {
                Some(stem) if html_links => format!("{stem}.html"),
                _ => url.clone(),
            };
            let _ = writeln!(reply, "- <{}>", link);
        }
    }

    reply
}
