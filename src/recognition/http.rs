//! HTTP recognition client

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{RecognitionRequest, RecognitionResponse, Recognizer};
use crate::config::RecognitionSettings;
use crate::errors::RecognitionError;
use crate::vision::CapturePayload;

/// Posts capture payloads as JSON to a recognition endpoint
#[derive(Debug, Clone)]
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecognizer {
    /// Create a client for `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RecognitionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(endpoint, client))
    }

    pub fn from_settings(settings: &RecognitionSettings) -> Result<Self, RecognitionError> {
        Self::new(settings.endpoint.clone(), settings.timeout())
    }

    /// Use a preconfigured client
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(
        &self,
        payload: &CapturePayload,
    ) -> Result<RecognitionResponse, RecognitionError> {
        let request = RecognitionRequest::from_payload(payload);
        debug!(
            "Posting {}x{} capture ({} bytes) to {}",
            payload.width(),
            payload.height(),
            payload.jpeg.len(),
            self.endpoint
        );

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::Status(status.as_u16()));
        }

        response
            .json::<RecognitionResponse>()
            .await
            .map_err(|e| RecognitionError::Decode(e.to_string()))
    }
}
