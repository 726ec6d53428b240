// Prompt layer between the scheduler and the text-generation backend.
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::{GenerateRequest, LlmBackend};
use crate::news::Article;
use crate::settings::Settings;

/// Summarizer boundary consumed by the scheduler and the HTTP layer.
///
/// Backend failures surface as `Err`; the scheduler maps both errors and
/// empty strings to "skip publish this cycle".
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a batch of articles into a post-sized text.
    async fn summarize(&self, articles: &[Article], settings: &Settings) -> Result<String>;

    /// Generate an automatic reply to a comment thread on a published post.
    async fn reply(
        &self,
        post_text: &str,
        existing_replies: &[String],
        settings: &Settings,
    ) -> Result<String>;
}

/// Summarizer over a generative backend, shaping prompts with the
/// configured persona.
pub struct LlmSummarizer {
    backend: Arc<dyn LlmBackend>,
}

impl LlmSummarizer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        LlmSummarizer { backend }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, articles: &[Article], settings: &Settings) -> Result<String> {
        let prompt = summary_prompt(articles, settings);
        let text = self
            .backend
            .generate(GenerateRequest {
                model: settings.model_name.clone(),
                prompt,
                timeout_seconds: None,
            })
            .await?;
        Ok(text.trim().to_string())
    }

    async fn reply(
        &self,
        post_text: &str,
        existing_replies: &[String],
        settings: &Settings,
    ) -> Result<String> {
        let prompt = reply_prompt(post_text, existing_replies);
        let text = self
            .backend
            .generate(GenerateRequest {
                model: settings.model_name.clone(),
                prompt,
                timeout_seconds: None,
            })
            .await?;
        Ok(text.trim().to_string())
    }
}

fn summary_prompt(articles: &[Article], settings: &Settings) -> String {
    let news_text = articles
        .iter()
        .take(settings.max_news_items.max(1))
        .map(|a| {
            format!(
                "Title: {}\nSource: {}\nContent: {}",
                a.title, a.source, a.excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "As a {}, summarize the following news items into a concise Twitter post \
         (max 280 characters) that captures the most important information:\n\n\
         {}\n\n\
         Include a brief commentary on the most significant story.",
        settings.bot_persona, news_text
    )
}

fn reply_prompt(post_text: &str, existing_replies: &[String]) -> String {
    format!(
        "Generate a thoughtful and engaging comment for this Twitter post:\n\n\
         Post: {}\n\n\
         Existing comments:\n{}\n\n\
         Generate a unique perspective that adds value to the discussion.\n\
         Keep it concise and respectful.",
        post_text,
        existing_replies.join("\n")
    )
}
