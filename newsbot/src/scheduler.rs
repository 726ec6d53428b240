use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::llm::summarizer::Summarizer;
use crate::news::NewsSource;
use crate::settings::SettingsStore;
use crate::twitter::Publisher;

/// Normal wake period. Bounds the latency between "due" and "published".
pub const TICK: Duration = Duration::from_secs(60);

/// Flat wait applied after a failed cycle before normal ticking resumes.
/// Deliberately single-tier: no exponential growth, no jitter.
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(300);

/// What a single wake of the scheduler did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No `next_post_time` armed; nothing to do regardless of elapsed time.
    Idle,
    /// Armed but the next post is still in the future.
    NotDue,
    /// Due, but the content source had nothing this cycle.
    NoContent,
    /// Due, but the summarizer failed or produced an empty string.
    SummaryUnavailable,
    /// A post went out; timestamps were advanced before the reply phase.
    Published {
        tweet_id: String,
        replies_sent: usize,
    },
}

/// The posting state machine.
///
/// One instance runs for the lifetime of the process; only this task
/// writes `last_post_time` / `next_post_time`. Settings are re-read at
/// the top of every cycle, so dashboard edits apply on the next
/// due-check without a restart.
pub struct PostScheduler {
    settings: Arc<SettingsStore>,
    news: Arc<dyn NewsSource>,
    summarizer: Arc<dyn Summarizer>,
    publisher: Arc<dyn Publisher>,
    tick: Duration,
    failure_backoff: Duration,
}

impl PostScheduler {
    pub fn new(
        settings: Arc<SettingsStore>,
        news: Arc<dyn NewsSource>,
        summarizer: Arc<dyn Summarizer>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        PostScheduler {
            settings,
            news,
            summarizer,
            publisher,
            tick: TICK,
            failure_backoff: FAILURE_BACKOFF,
        }
    }

    /// Run until `shutdown` is notified. Errors never terminate the loop;
    /// they only stretch the wait before the next wake.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!("posting scheduler started");
        loop {
            let result = self.run_cycle().await;
            match &result {
                Ok(outcome) => debug!(?outcome, "cycle complete"),
                Err(e) => error!(error = %e, "posting cycle failed, backing off"),
            }
            let wait = self.wait_after(&result);

            select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.notified() => {
                    info!("scheduler: shutdown requested, exiting loop");
                    break;
                }
            }
        }
    }

    /// Wait before the next wake: normal tick after any handled outcome,
    /// the flat failure backoff after an error.
    pub fn wait_after(&self, result: &Result<CycleOutcome>) -> Duration {
        match result {
            Ok(_) => self.tick,
            Err(_) => self.failure_backoff,
        }
    }

    /// One wake of the state machine: due-check, then
    /// fetch -> summarize -> publish -> reschedule -> reply.
    ///
    /// Nothing before a confirmed publish mutates the post timestamps,
    /// so a failed attempt leaves the same due condition standing. The
    /// timestamp update runs immediately after the publisher returns an
    /// id, before any further I/O, so a reply-phase failure cannot
    /// re-trigger the window.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let settings = self.settings.snapshot();

        let next_post = match settings.next_post_time {
            Some(t) => t,
            None => return Ok(CycleOutcome::Idle),
        };
        if Utc::now() < next_post {
            return Ok(CycleOutcome::NotDue);
        }

        let query = settings.default_query();
        let articles = self.news.fetch(Some(query.as_str())).await;
        let lead = match articles.first() {
            Some(article) => article.clone(),
            None => {
                info!("no articles available this cycle");
                return Ok(CycleOutcome::NoContent);
            }
        };

        let summary = match self.summarizer.summarize(&articles, &settings).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                warn!("summarizer returned empty text, skipping publish");
                return Ok(CycleOutcome::SummaryUnavailable);
            }
            Err(e) => {
                warn!(error = %e, "summarizer failed, skipping publish");
                return Ok(CycleOutcome::SummaryUnavailable);
            }
        };

        let posted = self.publisher.publish(&summary, Some(&lead.link)).await?;
        self.settings.mark_posted(Utc::now()).await?;
        info!(tweet_id = %posted.id, "published scheduled post");

        let replies_sent = self.auto_reply(&posted.id, &summary).await;

        Ok(CycleOutcome::Published {
            tweet_id: posted.id,
            replies_sent,
        })
    }

    /// Reply phase: answer comments on the post that just went out.
    /// Failures here are logged and never affect the publish outcome.
    async fn auto_reply(&self, tweet_id: &str, post_text: &str) -> usize {
        let settings = self.settings.snapshot();

        let comments = match self.publisher.fetch_comments(tweet_id).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(tweet_id, error = %e, "comment fetch failed");
                return 0;
            }
        };

        let existing: Vec<String> = comments.iter().map(|c| c.text.clone()).collect();
        let mut sent = 0;

        for comment in &comments {
            let text = match self.summarizer.reply(post_text, &existing, &settings).await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => continue,
                Err(e) => {
                    warn!(comment_id = %comment.id, error = %e, "reply generation failed");
                    continue;
                }
            };
            match self.publisher.reply(&comment.id, &text).await {
                Ok(()) => sent += 1,
                Err(e) => warn!(comment_id = %comment.id, error = %e, "reply send failed"),
            }
        }

        sent
    }
}
