//! External collaborators: the social network and the content generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A post or thread on the social network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub community: String,
}

/// Errors from the social network client.
#[derive(Debug, Error)]
pub enum SocialError {
    /// The platform refused the account (suspension, shadowban, revoked access).
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The platform asked us to slow down.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Network trouble or a server-side error.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Any other error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The gateway URL cannot carry the request path.
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),
}

impl SocialError {
    /// Whether this looks like an enforcement action against the account.
    ///
    /// Besides the typed variant, generic API errors that carry a 401/403
    /// status or mention "forbidden" count too.
    pub fn is_access_denied(&self) -> bool {
        match self {
            Self::AccessDenied(_) => true,
            Self::Api { status, message } => {
                matches!(status, 401 | 403) || message.to_lowercase().contains("forbidden")
            }
            Self::RateLimited { .. } | Self::Transient(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Operations the warm-up performs on the social network.
///
/// Every call acts on behalf of `account_id`.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Recent top items in a community.
    async fn fetch_top_items(
        &self,
        account_id: &str,
        community: &str,
        limit: usize,
    ) -> Result<Vec<Item>, SocialError>;

    async fn upvote(&self, account_id: &str, item: &Item) -> Result<(), SocialError>;

    async fn submit_reply(&self, account_id: &str, item: &Item, text: &str)
    -> Result<(), SocialError>;

    async fn submit_post(
        &self,
        account_id: &str,
        community: &str,
        title: &str,
        text: &str,
    ) -> Result<(), SocialError>;
}

/// Errors from the content generator. Always treated as transient.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content generation failed: {0}")]
    Generation(String),

    #[error("content generator returned empty text")]
    Empty,
}

/// What a reply is being written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyContext {
    pub title: String,
    pub body: String,
    pub community: String,
}

impl From<&Item> for ReplyContext {
    fn from(item: &Item) -> Self {
        Self {
            title: item.title.clone(),
            body: item.body.clone(),
            community: item.community.clone(),
        }
    }
}

/// A generated post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPost {
    pub title: String,
    pub content: String,
}

/// Text generation for replies and posts.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, ContentError>;

    async fn generate_post_content(
        &self,
        topic: &str,
        community: &str,
        tone: &str,
    ) -> Result<GeneratedPost, ContentError>;
}
