use anyhow::{Context, Result};
use feed_rs::model::Feed;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

use super::{Article, NewsSource, MAX_ARTICLES};
use async_trait::async_trait;
use chrono::Utc;

/// Content source backed by one or more RSS/Atom feeds.
pub struct RssNewsSource {
    feeds: Vec<String>,
    client: Client,
}

impl RssNewsSource {
    pub fn new(feeds: Vec<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Newsbot/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(RssNewsSource { feeds, client })
    }

    async fn fetch_feed(&self, url: &str) -> Result<Feed> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("network error during feed fetch")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("feed fetch failed with status: {}", status);
        }

        let bytes = response.bytes().await.context("failed to read feed body")?;
        parser::parse(bytes.as_ref()).context("failed to parse feed")
    }
}

#[async_trait]
impl NewsSource for RssNewsSource {
    async fn fetch(&self, query: Option<&str>) -> Vec<Article> {
        let mut articles: Vec<Article> = Vec::new();

        for url in &self.feeds {
            match self.fetch_feed(url).await {
                Ok(feed) => {
                    let feed_title = feed
                        .title
                        .as_ref()
                        .map(|t| t.content.clone())
                        .unwrap_or_default();

                    for entry in feed.entries {
                        let link = match entry.links.first() {
                            Some(l) => l.href.clone(),
                            None => continue,
                        };
                        let title = entry
                            .title
                            .as_ref()
                            .map(|t| t.content.clone())
                            .unwrap_or_default();
                        let excerpt = entry
                            .summary
                            .as_ref()
                            .map(|s| s.content.clone())
                            .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
                            .unwrap_or_default();

                        articles.push(Article {
                            title,
                            excerpt,
                            link,
                            source: feed_title.clone(),
                            published_at: entry.published.unwrap_or_else(Utc::now),
                        });
                    }
                }
                Err(e) => {
                    // One broken feed must not take down the whole fetch
                    warn!(url, error = %e, "feed fetch failed, skipping");
                }
            }
        }

        if let Some(query) = query {
            let terms: Vec<String> = query
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(|t| t.to_lowercase())
                .collect();
            if !terms.is_empty() {
                let matching: Vec<Article> = articles
                    .iter()
                    .filter(|a| {
                        let haystack = format!("{} {}", a.title, a.excerpt).to_lowercase();
                        terms.iter().any(|t| haystack.contains(t))
                    })
                    .cloned()
                    .collect();
                // The feeds already encode their topic, so the query is
                // best-effort here: a query that matches no headline falls
                // back to the full list instead of silencing the source
                if !matching.is_empty() {
                    articles = matching;
                }
            }
        }

        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles.truncate(MAX_ARTICLES);
        articles
    }
}
