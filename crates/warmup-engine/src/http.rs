//! HTTP gateway adapters.
//!
//! The daemon does not talk to the social network directly. It talks JSON to
//! a gateway service that owns the platform credentials, and to a content
//! service that writes text. These adapters implement the collaborator traits
//! over that HTTP surface and translate status codes into typed errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::social::{
    ContentError, ContentGenerator, GeneratedPost, Item, ReplyContext, SocialClient, SocialError,
};

fn build_http() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build HTTP client")
}

/// `SocialClient` backed by the gateway's REST API.
pub struct HttpSocialClient {
    http: Client,
    base_url: String,
}

impl HttpSocialClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: build_http(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/accounts/{account_id}/{rest..}` with every segment escaped.
    fn account_url(&self, account_id: &str, rest: &[&str]) -> Result<Url, SocialError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SocialError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SocialError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("accounts")
            .push(account_id)
            .extend(rest);
        Ok(url)
    }

    /// Map a gateway response to a typed error, or pass it through.
    async fn check(response: Response) -> Result<Response, SocialError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(SocialError::RateLimited { retry_after_secs });
        }

        let text = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SocialError::AccessDenied(
                format!("gateway returned {}: {}", status, text),
            )),
            s if s.is_server_error() => Err(SocialError::Transient(format!(
                "gateway returned {}: {}",
                status, text
            ))),
            s => Err(SocialError::Api {
                status: s.as_u16(),
                message: text,
            }),
        }
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<(), SocialError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transient)?;
        Self::check(response).await?;
        Ok(())
    }
}

fn transient(e: reqwest::Error) -> SocialError {
    SocialError::Transient(e.to_string())
}

#[derive(Serialize)]
struct ItemRef<'a> {
    item_id: &'a str,
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    item_id: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct PostRequest<'a> {
    community: &'a str,
    title: &'a str,
    text: &'a str,
}

#[async_trait]
impl SocialClient for HttpSocialClient {
    async fn fetch_top_items(
        &self,
        account_id: &str,
        community: &str,
        limit: usize,
    ) -> Result<Vec<Item>, SocialError> {
        let url = self.account_url(account_id, &["communities", community, "top"])?;
        debug!(account_id, community, limit, "fetching top items");

        let response = self
            .http
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(transient)?;
        let response = Self::check(response).await?;
        response.json().await.map_err(transient)
    }

    async fn upvote(&self, account_id: &str, item: &Item) -> Result<(), SocialError> {
        let url = self.account_url(account_id, &["upvotes"])?;
        self.post_json(url, &ItemRef { item_id: &item.id }).await
    }

    async fn submit_reply(
        &self,
        account_id: &str,
        item: &Item,
        text: &str,
    ) -> Result<(), SocialError> {
        let url = self.account_url(account_id, &["replies"])?;
        self.post_json(
            url,
            &ReplyRequest {
                item_id: &item.id,
                text,
            },
        )
        .await
    }

    async fn submit_post(
        &self,
        account_id: &str,
        community: &str,
        title: &str,
        text: &str,
    ) -> Result<(), SocialError> {
        let url = self.account_url(account_id, &["posts"])?;
        self.post_json(
            url,
            &PostRequest {
                community,
                title,
                text,
            },
        )
        .await
    }
}

/// `ContentGenerator` backed by a text-generation service.
pub struct HttpContentGenerator {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ReplyResponse {
    text: String,
}

#[derive(Serialize)]
struct PostContentRequest<'a> {
    topic: &'a str,
    community: &'a str,
    tone: &'a str,
}

impl HttpContentGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: build_http(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ContentError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ContentError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ContentError::Generation(format!(
                "generator returned {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ContentError::Generation(e.to_string()))
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, ContentError> {
        let reply: ReplyResponse = self.call("replies", context).await?;
        let text = reply.text.trim();
        if text.is_empty() {
            return Err(ContentError::Empty);
        }
        Ok(text.to_string())
    }

    async fn generate_post_content(
        &self,
        topic: &str,
        community: &str,
        tone: &str,
    ) -> Result<GeneratedPost, ContentError> {
        let post: GeneratedPost = self
            .call(
                "posts",
                &PostContentRequest {
                    topic,
                    community,
                    tone,
                },
            )
            .await?;
        if post.title.trim().is_empty() || post.content.trim().is_empty() {
            return Err(ContentError::Empty);
        }
        Ok(post)
    }
}
