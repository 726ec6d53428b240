use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::{parse_published, Article, NewsSource, MAX_ARTICLES};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Content source backed by a JSON news-search endpoint.
///
/// The endpoint is queried with `q` and `max_results` parameters and is
/// expected to answer with a JSON array of result objects (a top-level
/// `{"results": [...]}` wrapper is also accepted). Field names follow
/// the common search-provider shape: title, body/excerpt, link/url,
/// source, date.
pub struct SearchNewsSource {
    endpoint: String,
    client: Client,
}

impl SearchNewsSource {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Newsbot/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(SearchNewsSource {
            endpoint: endpoint.into(),
            client,
        })
    }

    async fn fetch_inner(&self, query: &str) -> Result<Vec<Article>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("max_results", "10")])
            .send()
            .await
            .context("news search request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("news search failed with status: {}", status);
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("failed to parse news search response")?;

        let articles = body
            .into_results()
            .into_iter()
            .filter_map(|r| {
                let link = r.link.or(r.url)?;
                let title = r.title?;
                Some(Article {
                    title,
                    excerpt: r.body.or(r.excerpt).unwrap_or_default(),
                    link,
                    source: r.source.unwrap_or_default(),
                    published_at: parse_published(r.date.as_deref()),
                })
            })
            .take(MAX_ARTICLES)
            .collect();

        Ok(articles)
    }
}

#[async_trait]
impl NewsSource for SearchNewsSource {
    async fn fetch(&self, query: Option<&str>) -> Vec<Article> {
        let query = query.unwrap_or("latest breaking news today");
        match self.fetch_inner(query).await {
            Ok(articles) => {
                if articles.is_empty() {
                    warn!(query, "news search returned no results");
                }
                articles
            }
            Err(e) => {
                warn!(query, error = %e, "news search failed, returning no articles");
                Vec::new()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { results: Vec<SearchResult> },
    Bare(Vec<SearchResult>),
}

impl SearchResponse {
    fn into_results(self) -> Vec<SearchResult> {
        match self {
            SearchResponse::Wrapped { results } => results,
            SearchResponse::Bare(results) => results,
        }
    }
}

#[derive(Deserialize)]
struct SearchResult {
    title: Option<String>,
    body: Option<String>,
    excerpt: Option<String>,
    link: Option<String>,
    url: Option<String>,
    source: Option<String>,
    date: Option<String>,
}
