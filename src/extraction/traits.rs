use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::types::SearchRequest;

/// Turns raw scraped text into candidate records (unvalidated JSON objects)
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, text: &str, prompt: &str) -> Result<Vec<Value>>;

    /// Name of the extraction service, for logs
    fn source_name(&self) -> &'static str;
}

/// Service that fetches the configured sites and extracts candidates from them
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>>;

    fn source_name(&self) -> &'static str;
}
