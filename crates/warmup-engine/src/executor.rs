//! Action executor.
//!
//! Carries out one job's worth of a single action type against the social
//! network. Knows nothing about phases or statuses: the caller decides how
//! many actions to perform.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info};
use warmup_queue::WarmupAction;

use crate::config::{ActionPacing, WarmupConfig};
use crate::error::WarmupError;
use crate::jitter::JitterWindow;
use crate::social::{ContentGenerator, Item, ReplyContext, SocialClient};

/// What happened while executing a job.
///
/// `performed` counts actions that succeeded even when a later one failed,
/// so the caller can record partial progress before handling the error.
#[derive(Debug)]
pub struct ActionOutcome {
    pub performed: u32,
    pub error: Option<WarmupError>,
}

impl ActionOutcome {
    fn done(performed: u32) -> Self {
        Self {
            performed,
            error: None,
        }
    }

    fn failed(performed: u32, error: impl Into<WarmupError>) -> Self {
        Self {
            performed,
            error: Some(error.into()),
        }
    }
}

/// Performs upvotes, comments and posts for an account.
pub struct ActionExecutor {
    social: Arc<dyn SocialClient>,
    content: Arc<dyn ContentGenerator>,
    candidate_pool: usize,
    pacing: ActionPacing,
    post_tone: String,
}

impl ActionExecutor {
    pub fn new(
        social: Arc<dyn SocialClient>,
        content: Arc<dyn ContentGenerator>,
        config: &WarmupConfig,
    ) -> Self {
        Self {
            social,
            content,
            candidate_pool: config.candidate_pool,
            pacing: config.pacing,
            post_tone: config.post_tone.clone(),
        }
    }

    /// Perform up to `count` actions of type `action` in `community`.
    #[tracing::instrument(skip(self), fields(performed = tracing::field::Empty))]
    pub async fn execute(
        &self,
        account_id: &str,
        action: WarmupAction,
        community: &str,
        count: u32,
    ) -> ActionOutcome {
        if count == 0 {
            return ActionOutcome::done(0);
        }

        let outcome = match action {
            WarmupAction::Upvote => self.upvote(account_id, community, count).await,
            WarmupAction::Comment => self.comment(account_id, community, count).await,
            WarmupAction::Post => self.post(account_id, community).await,
        };
        tracing::Span::current().record("performed", outcome.performed);
        outcome
    }

    /// Fetch the candidate pool and pick `count` items at random.
    async fn candidates(
        &self,
        account_id: &str,
        community: &str,
        count: u32,
    ) -> Result<Vec<Item>, WarmupError> {
        let items = self
            .social
            .fetch_top_items(account_id, community, self.candidate_pool)
            .await?;

        let picked: Vec<Item> = {
            let mut rng = rand::thread_rng();
            items
                .choose_multiple(&mut rng, count as usize)
                .cloned()
                .collect()
        };

        debug!(
            account_id,
            community,
            pool = items.len(),
            picked = picked.len(),
            "selected candidates"
        );
        Ok(picked)
    }

    async fn upvote(&self, account_id: &str, community: &str, count: u32) -> ActionOutcome {
        let items = match self.candidates(account_id, community, count).await {
            Ok(items) => items,
            Err(e) => return ActionOutcome::failed(0, e),
        };

        let mut performed = 0;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                pause(self.pacing.upvote).await;
            }
            if let Err(e) = self.social.upvote(account_id, item).await {
                return ActionOutcome::failed(performed, e);
            }
            performed += 1;
        }

        info!(account_id, community, performed, "upvoted items");
        ActionOutcome::done(performed)
    }

    async fn comment(&self, account_id: &str, community: &str, count: u32) -> ActionOutcome {
        let items = match self.candidates(account_id, community, count).await {
            Ok(items) => items,
            Err(e) => return ActionOutcome::failed(0, e),
        };

        let mut performed = 0;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                pause(self.pacing.comment).await;
            }

            let reply = match self.content.generate_reply(&ReplyContext::from(item)).await {
                Ok(reply) => reply,
                Err(e) => return ActionOutcome::failed(performed, e),
            };
            if let Err(e) = self.social.submit_reply(account_id, item, &reply).await {
                return ActionOutcome::failed(performed, e);
            }
            performed += 1;
        }

        info!(account_id, community, performed, "submitted replies");
        ActionOutcome::done(performed)
    }

    async fn post(&self, account_id: &str, community: &str) -> ActionOutcome {
        // The community doubles as the topic.
        let post = match self
            .content
            .generate_post_content(community, community, &self.post_tone)
            .await
        {
            Ok(post) => post,
            Err(e) => return ActionOutcome::failed(0, e),
        };

        if let Err(e) = self
            .social
            .submit_post(account_id, community, &post.title, &post.content)
            .await
        {
            return ActionOutcome::failed(0, e);
        }

        info!(account_id, community, title = %post.title, "submitted post");
        ActionOutcome::done(1)
    }
}

async fn pause(window: JitterWindow) {
    let delay = window.draw();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
