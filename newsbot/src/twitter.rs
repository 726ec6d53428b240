use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::settings::SettingsStore;
use crate::storage;

/// Production Twitter API base; tests inject a mock server URL instead.
pub const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// A successfully published post.
#[derive(Debug, Clone, Serialize)]
pub struct PostedTweet {
    pub id: String,
    pub url: String,
}

/// A comment on a published post, transient per reply cycle.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub in_reply_to: String,
}

/// Publisher boundary.
///
/// All operations are awaited to completion and carry their own timeout.
/// `fetch_comments` only returns comments that have not been auto-replied
/// to yet, so the scheduler's reply phase stays idempotent.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str, link: Option<&str>) -> Result<PostedTweet>;
    async fn fetch_comments(&self, tweet_id: &str) -> Result<Vec<Comment>>;
    async fn reply(&self, comment_id: &str, text: &str) -> Result<()>;
    async fn validate_credentials(&self) -> Result<()>;
}

/// Twitter API v2 client with bearer-token auth.
///
/// Credentials come from the settings store on every call, so dashboard
/// edits apply without a restart. Published tweets and discovered
/// comments are recorded in sqlite for the stats endpoint and for reply
/// deduplication.
pub struct TwitterPublisher {
    base_url: String,
    settings: Arc<SettingsStore>,
    db: SqlitePool,
    client: reqwest::Client,
}

impl TwitterPublisher {
    pub fn new(settings: Arc<SettingsStore>, db: SqlitePool) -> Result<Self> {
        Self::with_base_url(settings, db, TWITTER_API_BASE)
    }

    pub fn with_base_url(
        settings: Arc<SettingsStore>,
        db: SqlitePool,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Newsbot/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(TwitterPublisher {
            base_url: base_url.into(),
            settings,
            db,
            client,
        })
    }

    fn bearer_token(&self) -> Result<String> {
        let settings = self.settings.snapshot();
        if !settings.twitter.is_configured() {
            anyhow::bail!("Twitter API not configured");
        }
        settings
            .twitter
            .bearer_token
            .ok_or_else(|| anyhow::anyhow!("Twitter API not configured"))
    }

    async fn post_tweet_body(&self, body: &CreateTweetRequest) -> Result<String> {
        let token = self.bearer_token()?;
        let response = self
            .client
            .post(format!("{}/2/tweets", self.base_url))
            .header("Authorization", format!("Bearer {}", token.trim()))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .context("failed to reach Twitter API")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", api_error(status, &text));
        }

        let created: CreateTweetResponse = response
            .json()
            .await
            .context("failed to parse Twitter create response")?;
        Ok(created.data.id)
    }

    /// Latest posted tweet with engagement counters, refreshed from the
    /// platform when possible. A metrics fetch failure keeps the stored
    /// counters rather than failing the dashboard.
    pub async fn latest_stats(&self) -> Result<Option<storage::TweetStats>> {
        let Some(stats) = storage::latest_tweet(&self.db).await? else {
            return Ok(None);
        };

        match self.fetch_metrics(&stats.tweet_id).await {
            Ok(metrics) => {
                storage::update_tweet_metrics(
                    &self.db,
                    &stats.tweet_id,
                    metrics.like_count,
                    metrics.retweet_count,
                    metrics.reply_count,
                    metrics.impression_count,
                )
                .await?;
                Ok(storage::latest_tweet(&self.db).await?)
            }
            Err(e) => {
                warn!(tweet_id = %stats.tweet_id, error = %e, "metrics refresh failed, serving stored stats");
                Ok(Some(stats))
            }
        }
    }

    async fn fetch_metrics(&self, tweet_id: &str) -> Result<PublicMetrics> {
        let token = self.bearer_token()?;
        let response = self
            .client
            .get(format!("{}/2/tweets/{}", self.base_url, tweet_id))
            .header("Authorization", format!("Bearer {}", token.trim()))
            .query(&[("tweet.fields", "public_metrics")])
            .send()
            .await
            .context("failed to reach Twitter API")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", api_error(status, &text));
        }

        let body: TweetLookupResponse = response
            .json()
            .await
            .context("failed to parse tweet lookup response")?;
        Ok(body.data.public_metrics.unwrap_or_default())
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    async fn publish(&self, text: &str, link: Option<&str>) -> Result<PostedTweet> {
        let full_text = match link {
            Some(link) if !link.is_empty() => format!("{}\n\n{}", text, link),
            _ => text.to_string(),
        };

        let id = self
            .post_tweet_body(&CreateTweetRequest {
                text: full_text.clone(),
                reply: None,
            })
            .await?;

        storage::record_tweet(&self.db, &id, &full_text).await?;
        info!(tweet_id = %id, "tweet published");

        Ok(PostedTweet {
            url: format!("https://twitter.com/user/status/{}", id),
            id,
        })
    }

    async fn fetch_comments(&self, tweet_id: &str) -> Result<Vec<Comment>> {
        let token = self.bearer_token()?;
        let query = format!("conversation_id:{}", tweet_id);
        let response = self
            .client
            .get(format!("{}/2/tweets/search/recent", self.base_url))
            .header("Authorization", format!("Bearer {}", token.trim()))
            .query(&[
                ("query", query.as_str()),
                ("max_results", "50"),
                ("tweet.fields", "author_id,created_at"),
            ])
            .send()
            .await
            .context("failed to reach Twitter API")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", api_error(status, &text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("failed to parse Twitter search response")?;

        let mut comments = Vec::new();
        for tweet in body.data.unwrap_or_default() {
            // The conversation search includes the root tweet itself
            if tweet.id == tweet_id {
                continue;
            }
            let author = tweet.author_id.unwrap_or_default();
            storage::record_comment(&self.db, &tweet.id, tweet_id, &author, &tweet.text).await?;
            if storage::comment_replied(&self.db, &tweet.id).await? {
                continue;
            }
            comments.push(Comment {
                id: tweet.id,
                author,
                text: tweet.text,
                in_reply_to: tweet_id.to_string(),
            });
        }

        Ok(comments)
    }

    async fn reply(&self, comment_id: &str, text: &str) -> Result<()> {
        self.post_tweet_body(&CreateTweetRequest {
            text: text.to_string(),
            reply: Some(ReplyTarget {
                in_reply_to_tweet_id: comment_id.to_string(),
            }),
        })
        .await?;

        storage::mark_comment_replied(&self.db, comment_id).await?;
        info!(comment_id, "auto-reply sent");
        Ok(())
    }

    async fn validate_credentials(&self) -> Result<()> {
        let token = self.bearer_token()?;
        let response = self
            .client
            .get(format!("{}/2/users/me", self.base_url))
            .header("Authorization", format!("Bearer {}", token.trim()))
            .send()
            .await
            .context("failed to reach Twitter API")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", api_error(status, &text));
        }
        Ok(())
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> String {
    match status.as_u16() {
        401 => format!("Unauthorized (401): invalid or missing bearer token. {}", body),
        403 => format!("Forbidden (403): token lacks access to this endpoint. {}", body),
        429 => format!("Rate limited (429): too many requests. {}", body),
        _ => format!("Twitter API error: {} - {}", status, body),
    }
}

// Twitter API v2 request/response structures
#[derive(Debug, Serialize)]
struct CreateTweetRequest {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTarget>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget {
    in_reply_to_tweet_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<Vec<SearchTweet>>,
}

#[derive(Debug, Deserialize)]
struct SearchTweet {
    id: String,
    text: String,
    author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetLookupResponse {
    data: LookedUpTweet,
}

#[derive(Debug, Deserialize)]
struct LookedUpTweet {
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    retweet_count: i64,
    #[serde(default)]
    reply_count: i64,
    #[serde(default)]
    impression_count: i64,
}
