// src/parser/client.rs
// HTTP client for the external linguistic parser collaborator.

use crate::parser::types::{CompactParseResult, ParsePhase, ParseSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Seam for the external parser, so the gateway can be exercised against a
/// scripted double in tests.
#[async_trait]
pub trait ParserClient: Send + Sync {
    async fn process(&self, text: &str, phase: ParsePhase) -> Result<CompactParseResult>;
}

/// Production client against the spaCy sidecar's `POST /process`.
pub struct HttpParserClient {
    client: Client,
    base_url: String,
    internal_key: String,
}

impl HttpParserClient {
    pub fn new(base_url: String, internal_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            internal_key,
        }
    }
}

#[async_trait]
impl ParserClient for HttpParserClient {
    async fn process(&self, text: &str, phase: ParsePhase) -> Result<CompactParseResult> {
        // Typing calls skip the dependency parse; it is the slow part and
        // only the finalize pass consumes it.
        let body = json!({
            "text": text,
            "wantTokens": true,
            "wantSents": true,
            "wantDeps": phase.is_finalize(),
        });

        let url = format!("{}/process", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&body);
        if !self.internal_key.is_empty() {
            request = request.header("x-internal-key", &self.internal_key);
        }

        let resp = request
            .send()
            .await
            .context("Parser request failed to send")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Parser returned status {}", resp.status()));
        }

        let mut parsed: CompactParseResult =
            resp.json().await.context("Parser response was not valid JSON")?;
        parsed.source = ParseSource::External;
        Ok(parsed)
    }
}
