use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::config::OracleConfig;
use crate::core::traits::Scorer;
use crate::core::{ScoringRequest, ScoringVerdict};
use crate::errors::OracleError;

/// HTTP client for the fraud prediction service.
pub struct OracleClient {
    url: String,
    client: Client,
    max_response_bytes: usize,
}

impl OracleClient {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Scorer for OracleClient {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringVerdict, OracleError> {
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        if let Some(len) = resp.content_length() {
            let len = usize::try_from(len).unwrap_or(usize::MAX);
            if len > self.max_response_bytes {
                return Err(OracleError::TooLarge {
                    size: len,
                    limit: self.max_response_bytes,
                });
            }
        }

        let body = resp.bytes().await?;
        if body.len() > self.max_response_bytes {
            return Err(OracleError::TooLarge {
                size: body.len(),
                limit: self.max_response_bytes,
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
