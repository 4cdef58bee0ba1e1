//! Recognition Service Boundary
//!
//! The recognition service is opaque: it receives one JSON object holding a
//! base64 JPEG data URL under `image` and answers with an optional `plate`
//! string. Absent or empty text means nothing was recognized.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RecognitionError;
use crate::vision::CapturePayload;

pub use http::HttpRecognizer;

/// Request body sent to the service
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionRequest {
    /// `data:image/jpeg;base64,...`
    pub image: String,
}

impl RecognitionRequest {
    pub fn from_payload(payload: &CapturePayload) -> Self {
        Self {
            image: payload.to_data_url(),
        }
    }
}

/// Response body returned by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecognitionResponse {
    #[serde(default)]
    pub plate: Option<String>,
}

/// What a finished request means for the viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Plate text was recognized
    Recognized(String),
    /// The service found no text
    NoText,
    /// The request failed; carries the error description
    Failed(String),
}

impl RecognitionOutcome {
    pub fn from_result(result: Result<RecognitionResponse, RecognitionError>) -> Self {
        match result {
            Ok(response) => match response.plate {
                Some(text) if !text.is_empty() => RecognitionOutcome::Recognized(text),
                _ => RecognitionOutcome::NoText,
            },
            Err(e) => RecognitionOutcome::Failed(e.to_string()),
        }
    }
}

/// Anything that can turn a capture into plate text
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(
        &self,
        payload: &CapturePayload,
    ) -> Result<RecognitionResponse, RecognitionError>;
}
