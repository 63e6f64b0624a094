use crate::client::SearchBackend;
use crate::config::BackendConfig;
use crate::error::{ExplorerError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the Sumo API
#[derive(Clone)]
pub struct SumoClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout_secs: u64,
}

impl SumoClient {
    /// Create a new client from backend configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                ExplorerError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            token: config.token.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ExplorerError::Timeout(format!(
                    "{} timed out after {} seconds",
                    what, self.timeout_secs
                ))
            } else if e.is_connect() {
                ExplorerError::Transport(format!("Failed to connect to Sumo: {}", e))
            } else {
                ExplorerError::Transport(format!("{} failed: {}", what, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| String::new());
            warn!(status = status.as_u16(), request = what, "Sumo request failed");
            return Err(ExplorerError::Http {
                status: status.as_u16(),
                body: if body.is_empty() {
                    "No response body".to_string()
                } else {
                    body
                },
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl SearchBackend for SumoClient {
    async fn search(&self, body: &Value) -> Result<Value> {
        debug!(url = %self.url("/search"), "POST search");
        let request = self.client.post(self.url("/search")).json(body);
        let response = self.send(request, "search").await?;
        Ok(response.json::<Value>().await?)
    }

    async fn open_snapshot(&self, keep_alive: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url("/pit"))
            .query(&[("keep-alive", keep_alive)]);
        let response = self.send(request, "open point-in-time").await?;
        let body = response.json::<Value>().await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExplorerError::protocol("point-in-time id"))
    }

    async fn close_snapshot(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.url("/pit")).query(&[("id", id)]);
        self.send(request, "close point-in-time").await?;
        Ok(())
    }

    async fn aggregate(&self, request: &Value) -> Result<Bytes> {
        let request = self.client.post(self.url("/aggregations")).json(request);
        let response = self.send(request, "aggregation").await?;
        Ok(response.bytes().await?)
    }

    async fn blob(&self, id: &str) -> Result<Bytes> {
        let request = self.client.get(self.url(&format!("/objects('{}')/blob", id)));
        let response = self.send(request, "blob download").await?;
        Ok(response.bytes().await?)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let request = self.client.get(self.url(path));
        let response = self.send(request, path).await?;
        Ok(response.json::<Value>().await?)
    }
}
