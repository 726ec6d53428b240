use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Ensure the required schema exists. This runs CREATE TABLE IF NOT EXISTS
/// statements for the posting history tables and is safe to call at startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    info!("storage: ensuring DB schema (CREATE TABLE IF NOT EXISTS ...)");

    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS tweets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tweet_id TEXT NOT NULL UNIQUE,
            content TEXT,
            created_at TIMESTAMP,
            likes INTEGER DEFAULT 0,
            retweets INTEGER DEFAULT 0,
            replies INTEGER DEFAULT 0,
            views INTEGER DEFAULT 0
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            comment_id TEXT NOT NULL UNIQUE,
            tweet_id TEXT NOT NULL,
            author TEXT,
            content TEXT,
            created_at TIMESTAMP,
            replied_at TIMESTAMP
        );
        "#,
    ];

    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| "failed to ensure schema")?;
    }

    Ok(())
}

/// Engagement metrics for a published tweet, as shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct TweetStats {
    pub tweet_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub retweets: i64,
    pub replies: i64,
    pub views: i64,
}

/// Record a freshly published tweet.
pub async fn record_tweet(pool: &SqlitePool, tweet_id: &str, text: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO tweets (tweet_id, content, created_at) VALUES (?, ?, ?)",
    )
    .bind(tweet_id)
    .bind(text)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("failed to insert tweet")?;
    Ok(())
}

/// Refresh the stored engagement counters for a tweet.
pub async fn update_tweet_metrics(
    pool: &SqlitePool,
    tweet_id: &str,
    likes: i64,
    retweets: i64,
    replies: i64,
    views: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE tweets SET likes = ?, retweets = ?, replies = ?, views = ? WHERE tweet_id = ?",
    )
    .bind(likes)
    .bind(retweets)
    .bind(replies)
    .bind(views)
    .bind(tweet_id)
    .execute(pool)
    .await
    .context("failed to update tweet metrics")?;
    Ok(())
}

/// Most recently posted tweet with its stored metrics, if any.
pub async fn latest_tweet(pool: &SqlitePool) -> Result<Option<TweetStats>> {
    let row = sqlx::query(
        r#"
        SELECT tweet_id, content, created_at, likes, retweets, replies, views
        FROM tweets
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await
    .context("failed to query latest tweet")?;

    Ok(row.map(|r| TweetStats {
        tweet_id: r.get("tweet_id"),
        text: r.get::<Option<String>, _>("content").unwrap_or_default(),
        created_at: r.get("created_at"),
        likes: r.get("likes"),
        retweets: r.get("retweets"),
        replies: r.get("replies"),
        views: r.get("views"),
    }))
}

/// Record a discovered comment. Re-fetching the same comment is a no-op.
pub async fn record_comment(
    pool: &SqlitePool,
    comment_id: &str,
    tweet_id: &str,
    author: &str,
    text: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO comments (comment_id, tweet_id, author, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment_id)
    .bind(tweet_id)
    .bind(author)
    .bind(text)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("failed to insert comment")?;
    Ok(())
}

/// Mark a comment as answered so it is not replied to again.
pub async fn mark_comment_replied(pool: &SqlitePool, comment_id: &str) -> Result<()> {
    sqlx::query("UPDATE comments SET replied_at = ? WHERE comment_id = ?")
        .bind(Utc::now())
        .bind(comment_id)
        .execute(pool)
        .await
        .context("failed to mark comment replied")?;
    Ok(())
}

/// True if an auto-reply was already sent for this comment.
pub async fn comment_replied(pool: &SqlitePool, comment_id: &str) -> Result<bool> {
    let replied = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM comments WHERE comment_id = ? AND replied_at IS NOT NULL",
    )
    .bind(comment_id)
    .fetch_one(pool)
    .await
    .context("failed to check comment reply state")?;
    Ok(replied > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::init_db_pool;

    async fn test_pool() -> SqlitePool {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("storage.db");
        // Leak the tempdir so the DB file outlives this helper
        std::mem::forget(dir);
        let pool = init_db_pool(&path.to_string_lossy())
            .await
            .expect("init pool");
        ensure_schema(&pool).await.expect("ensure schema");
        pool
    }

    #[tokio::test]
    async fn tweet_roundtrip_with_metrics() {
        let pool = test_pool().await;

        record_tweet(&pool, "1234", "hello world").await.expect("record");
        update_tweet_metrics(&pool, "1234", 10, 2, 3, 100)
            .await
            .expect("metrics");

        let latest = latest_tweet(&pool).await.expect("latest").expect("some");
        assert_eq!(latest.tweet_id, "1234");
        assert_eq!(latest.text, "hello world");
        assert_eq!(latest.likes, 10);
        assert_eq!(latest.views, 100);
    }

    #[tokio::test]
    async fn comment_reply_state_is_sticky() {
        let pool = test_pool().await;

        record_comment(&pool, "c1", "t1", "alice", "nice post")
            .await
            .expect("record comment");
        assert!(!comment_replied(&pool, "c1").await.expect("check"));

        mark_comment_replied(&pool, "c1").await.expect("mark");
        assert!(comment_replied(&pool, "c1").await.expect("check again"));

        // Re-discovering the same comment must not reset the state
        record_comment(&pool, "c1", "t1", "alice", "nice post")
            .await
            .expect("re-record");
        assert!(comment_replied(&pool, "c1").await.expect("still replied"));
    }

    #[tokio::test]
    async fn latest_tweet_empty_db() {
        let pool = test_pool().await;
        assert!(latest_tweet(&pool).await.expect("query").is_none());
    }
}
