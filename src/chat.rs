//! Question answering over the knowledge store.
//!
//! Retrieval is a similarity search filtered by distance; generation goes
//! to the configured [`LanguageModel`] when enabled, otherwise (or when the
//! model call fails) to a deterministic extractive answer built from the
//! retrieved chunks.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ChatConfig;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::models::SearchHit;
use crate::store::KnowledgeStore;

pub const NO_DOCUMENTS_RESPONSE: &str = "I don't have any documents uploaded yet to answer your question.\n\n\
Please upload some PDF or Word documents first, then ask your question again.";

pub const NO_RELEVANT_CONTENT_RESPONSE: &str = "I couldn't find relevant information in the uploaded documents to answer your question.\n\n\
This could mean:\n\
- The documents don't contain information about your topic\n\
- Try rephrasing your question with different keywords\n\
- Upload additional documents that might contain the information you're looking for";

const FALLBACK_SNIPPET_CHARS: usize = 300;
const FALLBACK_SENTENCES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub response: String,
    /// Distinct source documents, most relevant first.
    pub sources: Vec<String>,
}

pub struct ChatHandler {
    store: Arc<KnowledgeStore>,
    model: Option<Arc<dyn LanguageModel>>,
    config: ChatConfig,
}

impl ChatHandler {
    pub fn new(
        store: Arc<KnowledgeStore>,
        model: Option<Arc<dyn LanguageModel>>,
        config: ChatConfig,
    ) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Answer `query` from the stored documents.
    ///
    /// Store and embedding failures propagate. A failed model call is
    /// logged and answered with the extractive fallback.
    pub fn generate_response(&self, query: &str, use_llm: bool) -> Result<ChatAnswer> {
        let hits = self.store.search_similar(query, self.config.n_results)?;
        if hits.is_empty() {
            return Ok(ChatAnswer {
                response: NO_DOCUMENTS_RESPONSE.to_string(),
                sources: Vec::new(),
            });
        }

        let relevant: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| hit.distance < self.config.distance_threshold)
            .collect();
        if relevant.is_empty() {
            return Ok(ChatAnswer {
                response: NO_RELEVANT_CONTENT_RESPONSE.to_string(),
                sources: Vec::new(),
            });
        }

        let context: Vec<&str> = relevant
            .iter()
            .take(self.config.context_chunks.max(1))
            .map(|hit| hit.text.as_str())
            .collect();

        let response = match self.model.as_ref().filter(|_| use_llm) {
            Some(model) => match model.complete(&build_prompt(query, &context)) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "language model call failed, using fallback answer");
                    fallback_answer(query, &context)
                }
            },
            None => fallback_answer(query, &context),
        };

        let mut sources: Vec<String> = Vec::new();
        for hit in &relevant {
            if !sources.contains(&hit.document_id) {
                sources.push(hit.document_id.clone());
            }
        }

        Ok(ChatAnswer { response, sources })
    }

    /// Starter questions, depending on whether anything is stored yet.
    pub fn suggestions(&self) -> Result<Vec<String>> {
        let list: &[&str] = if self.store.list_documents()?.is_empty() {
            &[
                "Upload some documents first to get started!",
                "Try uploading PDF or Word files with content you'd like to explore",
            ]
        } else {
            &[
                "What is the main topic discussed in the documents?",
                "Can you summarize the key points?",
                "What are the important details mentioned?",
                "Are there any specific procedures or steps outlined?",
                "What conclusions or recommendations are made?",
            ]
        };
        Ok(list.iter().map(|s| s.to_string()).collect())
    }
}

/// Prompt sent to the language model.
pub fn build_prompt(query: &str, context: &[&str]) -> String {
    format!(
        "You are a helpful AI assistant that answers questions based on provided documents.

Guidelines:
- Answer questions using only the information provided in the context
- Format the entire response as a markdown document, with proper headings and subheadings
- If the context doesn't contain relevant information, say so clearly
- Be concise but comprehensive
- Quote relevant parts of the documents when appropriate
- If you're uncertain about something, express that uncertainty
- Keep the response as short as possible

Context from documents:
{}

Question: {}

Please provide a helpful answer based on the context above.",
        context.join("\n\n"),
        query
    )
}

/// Extractive answer: sentences mentioning a query word, else the start of
/// the most relevant chunk.
pub fn fallback_answer(query: &str, context: &[&str]) -> String {
    let keywords: Vec<String> = query
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let joined = context.join(" ");
    let matching: Vec<&str> = joined
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let lower = s.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .take(FALLBACK_SENTENCES)
        .collect();

    if !matching.is_empty() {
        return format!("Based on the uploaded documents: {}.", matching.join(". "));
    }

    let first = context.first().copied().unwrap_or_default();
    let snippet = if first.chars().count() > FALLBACK_SNIPPET_CHARS {
        let cut: String = first.chars().take(FALLBACK_SNIPPET_CHARS).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    };
    format!(
        "Based on the uploaded documents, here's relevant information: {}",
        snippet
    )
}
