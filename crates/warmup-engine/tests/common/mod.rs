//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warmup_engine::{
    ActionPacing, ContentError, ContentGenerator, GeneratedPost, Item, ReplyContext, SocialClient,
    SocialError, WarmupConfig,
};
use warmup_queue::Clock;

/// Clock that follows tokio's (possibly paused) time from a fixed base.
pub struct TokioClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap_or(chrono::Duration::zero());
        self.base + elapsed
    }
}

pub fn t0() -> DateTime<Utc> {
    "2026-03-02T09:00:00Z".parse().unwrap()
}

/// Config with no inter-action pauses.
pub fn test_config() -> WarmupConfig {
    WarmupConfig {
        pacing: ActionPacing::immediate(),
        default_subreddits: vec!["rust".to_string()],
        ..WarmupConfig::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    Deny,
    Transient,
    /// 429 with a Retry-After of this many seconds.
    RateLimited(u64),
}

/// Calls the mock social client received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialCall {
    Fetch { account: String, community: String },
    Upvote { account: String, item: String },
    Reply { account: String, item: String, text: String },
    Post { account: String, community: String, title: String },
}

/// In-memory social network.
#[derive(Default)]
pub struct MockSocial {
    pool_size: usize,
    action_delay: Duration,
    fail_mode: Mutex<Option<FailMode>>,
    /// Successful actions allowed before `fail_mode` kicks in.
    fail_after: AtomicUsize,
    calls: Mutex<Vec<SocialCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSocial {
    pub fn new() -> Self {
        Self {
            pool_size: 25,
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Each action takes this long.
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn fail(&self, mode: FailMode, after: usize) {
        *self.fail_mode.lock().unwrap() = Some(mode);
        self.fail_after.store(after, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SocialCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Action calls (upvote, reply, post), excluding fetches.
    pub fn action_calls(&self) -> Vec<SocialCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, SocialCall::Fetch { .. }))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn act(&self, call: SocialCall) -> Result<(), SocialError> {
        self.calls.lock().unwrap().push(call);

        let mode = *self.fail_mode.lock().unwrap();
        if let Some(mode) = mode {
            let allowed = self.fail_after.load(Ordering::SeqCst);
            if allowed == 0 {
                return Err(match mode {
                    FailMode::Deny => SocialError::AccessDenied("account suspended".into()),
                    FailMode::Transient => SocialError::Transient("connection reset".into()),
                    FailMode::RateLimited(secs) => SocialError::RateLimited {
                        retry_after_secs: Some(secs),
                    },
                });
            }
            self.fail_after.store(allowed - 1, Ordering::SeqCst);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SocialClient for MockSocial {
    async fn fetch_top_items(
        &self,
        account_id: &str,
        community: &str,
        limit: usize,
    ) -> Result<Vec<Item>, SocialError> {
        self.calls.lock().unwrap().push(SocialCall::Fetch {
            account: account_id.to_string(),
            community: community.to_string(),
        });
        Ok((0..self.pool_size.min(limit))
            .map(|i| Item {
                id: format!("{}-{}", community, i),
                title: format!("Thread {}", i),
                body: "What do you all think?".to_string(),
                community: community.to_string(),
            })
            .collect())
    }

    async fn upvote(&self, account_id: &str, item: &Item) -> Result<(), SocialError> {
        self.act(SocialCall::Upvote {
            account: account_id.to_string(),
            item: item.id.clone(),
        })
        .await
    }

    async fn submit_reply(
        &self,
        account_id: &str,
        item: &Item,
        text: &str,
    ) -> Result<(), SocialError> {
        self.act(SocialCall::Reply {
            account: account_id.to_string(),
            item: item.id.clone(),
            text: text.to_string(),
        })
        .await
    }

    async fn submit_post(
        &self,
        account_id: &str,
        community: &str,
        title: &str,
        _text: &str,
    ) -> Result<(), SocialError> {
        self.act(SocialCall::Post {
            account: account_id.to_string(),
            community: community.to_string(),
            title: title.to_string(),
        })
        .await
    }
}

/// Content generator that echoes its input.
#[derive(Default)]
pub struct MockContent {
    pub reply_contexts: Mutex<Vec<ReplyContext>>,
    pub post_requests: Mutex<Vec<(String, String, String)>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ContentGenerator for MockContent {
    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, ContentError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ContentError::Generation("model overloaded".into()));
        }
        self.reply_contexts.lock().unwrap().push(context.clone());
        Ok(format!("Great point about {}", context.title))
    }

    async fn generate_post_content(
        &self,
        topic: &str,
        community: &str,
        tone: &str,
    ) -> Result<GeneratedPost, ContentError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ContentError::Generation("model overloaded".into()));
        }
        self.post_requests.lock().unwrap().push((
            topic.to_string(),
            community.to_string(),
            tone.to_string(),
        ));
        Ok(GeneratedPost {
            title: format!("Thoughts on {}", topic),
            content: "Been lurking a while, figured I'd share.".to_string(),
        })
    }
}
