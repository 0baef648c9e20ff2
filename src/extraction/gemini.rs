use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::traits::Extractor;
use super::types::candidate_schema;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Extraction through Gemini structured output
pub struct GeminiExtractor {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Content,
}

impl GeminiExtractor {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        })
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(&self, text: &str, prompt: &str) -> Result<Vec<Value>> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("Gemini API key is not configured");
        }

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: format!("{}\n\nAquí está el texto extraído:\n\n{}", prompt, text),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: candidate_schema(),
                temperature: 0.2,
            },
        };

        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        info!("Sending {} bytes of text to {} for extraction", text.len(), self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Failed to send Gemini request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini returned status: {}", status);
            if body.contains("API_KEY_INVALID") || body.contains("API key not valid") {
                anyhow::bail!("Gemini API key is not valid");
            }
            anyhow::bail!("Gemini API error {}: {}", status, body);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .context("Gemini response contained no candidates")?;

        let records = parse_records(&text)?;
        debug!("Gemini extracted {} records", records.len());
        Ok(records)
    }

    fn source_name(&self) -> &'static str {
        "Gemini"
    }
}

/// The model must answer with a JSON array of objects.
fn parse_records(text: &str) -> Result<Vec<Value>> {
    let value: Value =
        serde_json::from_str(text.trim()).context("Extraction output is not valid JSON")?;

    match value {
        Value::Array(records) => Ok(records),
        _ => anyhow::bail!("Extraction output is not a JSON array"),
    }
}
