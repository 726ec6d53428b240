use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod rss;
pub mod search;

/// Upper bound on articles returned per fetch.
pub const MAX_ARTICLES: usize = 10;

/// Normalized candidate article, consumed once per posting cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub excerpt: String,
    pub link: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

/// Content source boundary.
///
/// Implementations fetch a bounded list of candidate articles, most
/// recent first. Failures never cross this boundary: they are logged and
/// yield an empty vec, which the scheduler treats as "nothing to do this
/// cycle".
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self, query: Option<&str>) -> Vec<Article>;
}

/// Build the configured provider. The rest of the system only ever sees
/// the `NewsSource` trait.
pub fn from_config(news: Option<&common::NewsConfig>) -> Result<Arc<dyn NewsSource>> {
    let news = news.ok_or_else(|| anyhow::anyhow!("missing [news] configuration section"))?;
    let timeout = news.fetch_timeout_seconds.unwrap_or(10);

    match news.provider.as_deref().unwrap_or("rss") {
        "rss" => {
            if news.feeds.is_empty() {
                anyhow::bail!("news provider 'rss' requires at least one feed URL");
            }
            Ok(Arc::new(rss::RssNewsSource::new(news.feeds.clone(), timeout)?))
        }
        "search" => {
            let endpoint = news
                .endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("news provider 'search' requires an endpoint"))?;
            Ok(Arc::new(search::SearchNewsSource::new(endpoint, timeout)?))
        }
        other => anyhow::bail!("unknown news provider: {}", other),
    }
}

/// Best-effort parse of a provider-supplied date string. Providers
/// disagree on formats; anything unparseable falls back to fetch time.
pub(crate) fn parse_published(raw: Option<&str>) -> DateTime<Utc> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r.trim(),
        _ => return Utc::now(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Utc.from_utc_datetime(&naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&naive);
        }
    }
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_date_formats() {
        let rfc3339 = parse_published(Some("2024-05-01T12:30:00Z"));
        assert_eq!(rfc3339.to_rfc3339(), "2024-05-01T12:30:00+00:00");

        let sql_style = parse_published(Some("2024-05-01 12:30:00"));
        assert_eq!(sql_style, rfc3339);

        let date_only = parse_published(Some("2024-05-01"));
        assert_eq!(date_only.date_naive().to_string(), "2024-05-01");
    }

    #[test]
    fn unparseable_dates_fall_back_to_now() {
        let before = Utc::now();
        let parsed = parse_published(Some("yesterday-ish"));
        assert!(parsed >= before);

        let missing = parse_published(None);
        assert!(missing >= before);
    }
}
