#[cfg(test)]
mod tests;

use tracing::debug;

use super::RetrievalCandidate;

/// Prompt header plus the documents it was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComposedContext {
    pub prompt_header: String,
    /// Unique source URLs in first-seen order
    pub source_urls: Vec<String>,
}

impl ComposedContext {
    #[inline]
    pub fn is_grounded(&self) -> bool {
        !self.source_urls.is_empty()
    }
}

/// Builds the prompt handed to the completion model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextComposer {
    preamble: String,
}

impl ContextComposer {
    #[inline]
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    #[inline]
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Preamble, the question, then every candidate's content in order
    ///
    /// The result is cut to `char_budget` characters from the start, which
    /// may end it mid-sentence.
    #[inline]
    pub fn compose(
        &self,
        candidates: &[RetrievalCandidate],
        question: &str,
        char_budget: usize,
    ) -> ComposedContext {
        let mut parts = Vec::with_capacity(candidates.len() + 2);
        if !self.preamble.is_empty() {
            parts.push(self.preamble.clone());
        }
        parts.push(format!("Question: {}", question));

        let mut source_urls: Vec<String> = Vec::new();
        for candidate in candidates {
            parts.push(candidate.content.replace('\n', " "));
            if !source_urls.contains(&candidate.source_url) {
                source_urls.push(candidate.source_url.clone());
            }
        }

        let assembled = parts.join(" ");
        let prompt_header = truncate_chars(&assembled, char_budget);

        debug!(
            "Composed prompt header of {} chars ({} before truncation) from {} candidates",
            prompt_header.chars().count(),
            assembled.chars().count(),
            candidates.len()
        );

        ComposedContext {
            prompt_header,
            source_urls,
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text.get(..end).unwrap_or(text).to_string(),
        None => text.to_string(),
    }
}
