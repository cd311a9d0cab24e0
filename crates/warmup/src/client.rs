//! Control API client used by the CLI subcommands.

use std::time::Duration;

use miette::Result;
use reqwest::{Client, Method, Url};
use serde_json::Value;

pub struct ControlClient {
    http: Client,
    base_url: String,
}

impl ControlClient {
    pub fn new(base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get(&self, segments: &[&str]) -> Result<Value> {
        self.send(Method::GET, segments, None).await
    }

    pub async fn post(&self, segments: &[&str], body: Option<Value>) -> Result<Value> {
        self.send(Method::POST, segments, body).await
    }

    /// Daemon URL for `segments`, each one percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| miette::miette!("invalid control URL {}: {}", self.base_url, e))?;
        url.path_segments_mut()
            .map_err(|_| miette::miette!("invalid control URL {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, segments: &[&str], body: Option<Value>) -> Result<Value> {
        let url = self.url(segments)?;
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| miette::miette!("failed to reach daemon at {}: {}", self.base_url, e))?;

        let status = response.status();
        let json: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = json["error"].as_str().unwrap_or("no error message");
            return Err(miette::miette!("{} ({})", message, status));
        }
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_are_escaped() {
        let client = ControlClient::new("http://127.0.0.1:8790/");
        let url = client.url(&["accounts", "a/1 x", "start"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8790/accounts/a%2F1%20x/start");

        let url = client.url(&["stats"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8790/stats");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ControlClient::new("localhost").url(&["stats"]).is_err());
    }
}
