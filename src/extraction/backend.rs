use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::traits::SearchBackend;
use super::types::SearchRequest;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "http://localhost:5001/api/search";

/// Search service reached over HTTP; it fetches the sites and runs extraction itself
pub struct HttpSearchBackend {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpSearchBackend {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>> {
        info!("Requesting search of {} sites from {}", request.sites.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach search service at {}", self.endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Search service returned status: {}", status);
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("server error: {}", status));
            anyhow::bail!(message);
        }

        let records: Vec<Value> = response
            .json()
            .await
            .context("Search service response is not a JSON array")?;

        debug!("Search service returned {} records", records.len());
        Ok(records)
    }

    fn source_name(&self) -> &'static str {
        "search-service"
    }
}
