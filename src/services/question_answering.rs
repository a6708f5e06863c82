//! Retrieval-augmented question answering.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::errors::{IndexError, ModelError};
use crate::domain::models::RetrievalContext;
use crate::domain::ports::ModelClient;
use crate::services::prompt_budget::truncate_chars;
use crate::services::retrieval_context::RetrievalContextBuilder;

/// Passages consulted per question.
const ASK_TOP_K: usize = 3;
/// Characters of each passage placed in the prompt.
const CONTEXT_CHARS: usize = 500;
/// Characters of each passage echoed back as a source preview.
const PREVIEW_CHARS: usize = 200;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

const SYSTEM_PROMPT: &str = "You answer questions using the numbered context passages you are given. \
Cite passages as [Context n]. If the context does not contain the answer, say so.";

#[derive(Debug, Error)]
pub enum AskError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Retrieval(#[from] IndexError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A passage an answer was based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSource {
    pub source_id: String,
    pub score: f32,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<AnswerSource>,
}

/// Answers free-form questions from the knowledge base.
#[derive(Clone)]
pub struct QuestionAnswerer {
    retrieval: RetrievalContextBuilder,
    model: Arc<dyn ModelClient>,
    call_timeout: Duration,
}

impl QuestionAnswerer {
    pub fn new(retrieval: RetrievalContextBuilder, model: Arc<dyn ModelClient>) -> Self {
        Self {
            retrieval,
            model,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Upper bound on the single model call made per question.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[instrument(skip(self, question), fields(model = %self.model.model_id()))]
    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let context = self.retrieval.build(question, ASK_TOP_K).await?;
        let prompt = build_prompt(question, &context);
        let answer = tokio::time::timeout(self.call_timeout, self.model.complete(SYSTEM_PROMPT, &prompt))
            .await
            .map_err(|_| ModelError::Timeout(self.call_timeout.as_secs()))??;
        info!(sources = context.len(), "Question answered");

        Ok(Answer {
            question: question.to_string(),
            answer,
            sources: context
                .passages()
                .iter()
                .map(|p| AnswerSource {
                    source_id: p.source_id.clone(),
                    score: p.score,
                    preview: preview(&p.text),
                })
                .collect(),
        })
    }
}

fn build_prompt(question: &str, context: &RetrievalContext) -> String {
    let mut prompt = String::from("Context:\n");
    if context.is_empty() {
        prompt.push_str("(no relevant passages found)\n");
    }
    for (i, passage) in context.passages().iter().enumerate() {
        let _ = writeln!(
            prompt,
            "[Context {}] ({})\n{}\n",
            i + 1,
            passage.source_id,
            truncate_chars(&passage.text, CONTEXT_CHARS)
        );
    }
    let _ = write!(prompt, "Question: {question}\n\nAnswer based on the context above.");
    prompt
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
