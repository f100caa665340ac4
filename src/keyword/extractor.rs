//! Keyword extractors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::KeywordConfig;
use crate::error::{ReadkeyError, Result};
use crate::sanitize::{strip_html, truncate_chars};

/// Produces keywords for a content blob.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Extract keywords from `content`, making at most `retry` attempts.
    ///
    /// `None` means no result was obtained; callers store the item without
    /// keywords.
    async fn extract(&self, content: &str, lang: Option<&str>, retry: u32) -> Option<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Client for the external keyword service.
///
/// Posts a form `{size, lang, text}` and expects `{"keywords": [...]}`.
pub struct HttpKeywordExtractor {
    client: Client,
    endpoint: String,
    result_size: usize,
}

impl HttpKeywordExtractor {
    /// Create an extractor from the keyword configuration.
    pub fn new(config: &KeywordConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                ReadkeyError::Keyword(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            result_size: config.result_size,
        })
    }

    async fn request(&self, form: &[(&str, String)]) -> Result<Option<Vec<String>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| ReadkeyError::Keyword(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ReadkeyError::Keyword(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ReadkeyError::Keyword(format!("failed to read response: {}", e)))?;

        // A reachable service that answers garbage is not retried
        match serde_json::from_slice::<KeywordResponse>(&body) {
            Ok(parsed) => Ok(Some(parsed.keywords)),
            Err(e) => {
                warn!(endpoint = %self.endpoint, "Unreadable keyword response: {}", e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl KeywordExtractor for HttpKeywordExtractor {
    async fn extract(&self, content: &str, lang: Option<&str>, retry: u32) -> Option<Vec<String>> {
        let form = [
            ("size", self.result_size.to_string()),
            // Empty lets the service decide
            ("lang", lang.unwrap_or_default().to_string()),
            ("text", strip_html(content)),
        ];

        for attempt in 1..=retry {
            match self.request(&form).await {
                Ok(result) => return result,
                Err(e) => debug!(attempt, retry, "Keyword request failed: {}", e),
            }
        }

        if retry > 0 {
            warn!(endpoint = %self.endpoint, attempts = retry, "Keyword service unavailable");
        }
        None
    }
}

/// Offline extractor returning a short plain-text summary as the only keyword.
pub struct SummaryExtractor {
    size: usize,
}

impl SummaryExtractor {
    /// Create a summary extractor keeping `size` characters.
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

#[async_trait]
impl KeywordExtractor for SummaryExtractor {
    async fn extract(&self, content: &str, _lang: Option<&str>, _retry: u32) -> Option<Vec<String>> {
        let summary = truncate_chars(&strip_html(content), self.size);
        if summary.is_empty() {
            Some(Vec::new())
        } else {
            Some(vec![summary])
        }
    }
}

/// Extractor that never produces keywords.
pub struct DisabledExtractor;

#[async_trait]
impl KeywordExtractor for DisabledExtractor {
    async fn extract(&self, _content: &str, _lang: Option<&str>, _retry: u32) -> Option<Vec<String>> {
        None
    }
}
