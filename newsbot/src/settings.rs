use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::info;

/// Twitter API credentials as stored in the settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterCredentials {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub bearer_token: Option<String>,
}

impl TwitterCredentials {
    /// All required keys present and non-empty.
    pub fn is_configured(&self) -> bool {
        [
            &self.api_key,
            &self.api_secret,
            &self.access_token,
            &self.access_token_secret,
            &self.bearer_token,
        ]
        .iter()
        .all(|k| k.as_deref().map(|v| !v.is_empty()).unwrap_or(false))
    }
}

/// Mutable runtime settings, persisted as a single JSON document.
///
/// `last_post_time` / `next_post_time` are scheduler-owned: only
/// `mark_posted` writes them, and an external `replace` never forges
/// `last_post_time`. `next_post_time` is either absent (scheduler idle)
/// or strictly greater than the `last_post_time` that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub interval_minutes: u32,
    pub bot_persona: String,
    pub news_categories: Vec<String>,
    pub model_name: String,
    pub ollama_host: String,
    pub max_news_items: usize,
    pub twitter: TwitterCredentials,
    pub last_post_time: Option<DateTime<Utc>>,
    pub next_post_time: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            interval_minutes: 0,
            bot_persona: "professional news analyst".to_string(),
            news_categories: vec![
                "world news".to_string(),
                "breaking news".to_string(),
                "important events".to_string(),
            ],
            model_name: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            max_news_items: 5,
            twitter: TwitterCredentials::default(),
            last_post_time: None,
            next_post_time: None,
        }
    }
}

impl Settings {
    /// Query used when the caller gives no explicit one.
    pub fn default_query(&self) -> String {
        if self.news_categories.is_empty() {
            "latest breaking news today".to_string()
        } else {
            self.news_categories.join(", ")
        }
    }
}

/// Process-wide settings store.
///
/// Reads are cheap snapshots; every mutation is persisted by writing a
/// temp file and renaming it over the document, so a concurrent reader
/// never observes a partial write.
pub struct SettingsStore {
    path: PathBuf,
    inner: RwLock<Settings>,
}

impl SettingsStore {
    /// Load the settings document, creating it with defaults if missing.
    pub async fn load_or_default(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse settings file: {}", path.display()))?,
            Err(_) => {
                info!(path = %path.display(), "settings file not found, creating defaults");
                Settings::default()
            }
        };

        let store = SettingsStore {
            path,
            inner: RwLock::new(settings),
        };
        let snapshot = store.snapshot();
        store.persist(&snapshot).await?;
        Ok(store)
    }

    /// Current settings as an owned copy.
    pub fn snapshot(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the settings document (dashboard write path).
    ///
    /// The scheduler-owned fields are recomputed, not taken from the
    /// caller: `last_post_time` is preserved, and `next_post_time` is
    /// re-armed from the submitted interval (`(last | now) + interval`),
    /// or cleared when the interval is zero. A recomputed time in the
    /// past simply makes the scheduler immediately due.
    pub async fn replace(&self, mut new: Settings) -> Result<Settings> {
        let updated = {
            let mut guard = self
                .inner
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            new.last_post_time = guard.last_post_time;
            new.next_post_time = if new.interval_minutes > 0 {
                let base = guard.last_post_time.unwrap_or_else(Utc::now);
                Some(base + Duration::minutes(new.interval_minutes as i64))
            } else {
                None
            };
            *guard = new.clone();
            new
        };
        self.persist(&updated).await?;
        Ok(updated)
    }

    /// Record a confirmed publish: `last = now`, `next = now + interval`.
    ///
    /// Called by the scheduler only, immediately after the publisher
    /// returns a post id. The interval is clamped to at least one minute
    /// so `next` stays strictly after `last` even if the interval was
    /// zeroed out mid-cycle.
    pub async fn mark_posted(&self, now: DateTime<Utc>) -> Result<Settings> {
        let updated = {
            let mut guard = self
                .inner
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let interval = guard.interval_minutes.max(1) as i64;
            guard.last_post_time = Some(now);
            guard.next_post_time = Some(now + Duration::minutes(interval));
            guard.clone()
        };
        self.persist(&updated).await?;
        Ok(updated)
    }

    /// Atomic whole-file replace: serialize to a sibling temp file, then
    /// rename over the document.
    async fn persist(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create settings directory: {}", parent.display())
                })?;
            }
        }

        let data = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("Failed to write settings temp file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace settings file: {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::load_or_default(dir.path().join("settings.json"))
            .await
            .expect("load store")
    }

    #[tokio::test]
    async fn mark_posted_advances_both_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir).await;

        let mut settings = store.snapshot();
        settings.interval_minutes = 60;
        store.replace(settings).await.expect("replace");

        let t = Utc::now();
        let updated = store.mark_posted(t).await.expect("mark posted");
        assert_eq!(updated.last_post_time, Some(t));
        assert_eq!(updated.next_post_time, Some(t + Duration::minutes(60)));
    }

    #[tokio::test]
    async fn replace_arms_and_disarms_next_post() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir).await;

        // Defaults start idle
        assert!(store.snapshot().next_post_time.is_none());

        let mut armed = store.snapshot();
        armed.interval_minutes = 30;
        let updated = store.replace(armed).await.expect("arm");
        assert!(updated.next_post_time.is_some());
        assert!(updated.last_post_time.is_none());

        let mut disarmed = store.snapshot();
        disarmed.interval_minutes = 0;
        let updated = store.replace(disarmed).await.expect("disarm");
        assert!(updated.next_post_time.is_none());
    }

    #[tokio::test]
    async fn replace_cannot_forge_scheduler_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir).await;

        let mut armed = store.snapshot();
        armed.interval_minutes = 60;
        store.replace(armed).await.expect("arm");
        let posted_at = Utc::now();
        store.mark_posted(posted_at).await.expect("mark posted");

        let mut forged = store.snapshot();
        forged.last_post_time = Some(posted_at + Duration::days(1));
        forged.next_post_time = None;
        let updated = store.replace(forged).await.expect("replace");

        assert_eq!(updated.last_post_time, Some(posted_at));
        assert_eq!(
            updated.next_post_time,
            Some(posted_at + Duration::minutes(60))
        );
    }

    #[tokio::test]
    async fn settings_survive_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        {
            let store = SettingsStore::load_or_default(&path).await.expect("load");
            let mut settings = store.snapshot();
            settings.interval_minutes = 45;
            settings.bot_persona = "tech optimist".to_string();
            store.replace(settings).await.expect("replace");
            store.mark_posted(Utc::now()).await.expect("mark posted");
        }

        let reloaded = SettingsStore::load_or_default(&path).await.expect("reload");
        let settings = reloaded.snapshot();
        assert_eq!(settings.interval_minutes, 45);
        assert_eq!(settings.bot_persona, "tech optimist");
        assert!(settings.last_post_time.is_some());
        assert!(settings.next_post_time > settings.last_post_time);
    }

    #[test]
    fn default_query_joins_categories() {
        let settings = Settings::default();
        assert_eq!(
            settings.default_query(),
            "world news, breaking news, important events"
        );

        let empty = Settings {
            news_categories: vec![],
            ..Settings::default()
        };
        assert_eq!(empty.default_query(), "latest breaking news today");
    }
}
