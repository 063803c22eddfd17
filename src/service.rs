use crate::annotate::model::PixelBuffer;
use crate::error::{Result, RetouchError};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HTTP_CLIENT_TIMEOUT_SECS: u64 = 120;

/// A single edit/clean request. PNG payloads; absence of `mask` and
/// `instruction` is the "clean whole image" variant, presence is the
/// "inpaint region" variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub image: Vec<u8>,
    pub mask: Option<Vec<u8>>,
    pub instruction: Option<String>,
}

impl EditRequest {
    pub fn clean(image: Vec<u8>) -> Self {
        Self {
            image,
            mask: None,
            instruction: None,
        }
    }

    pub fn inpaint(image: Vec<u8>, mask: Vec<u8>, instruction: impl Into<String>) -> Self {
        Self {
            image,
            mask: Some(mask),
            instruction: Some(instruction.into()),
        }
    }
}

/// Seam to the remote image edit service. Tests substitute in-process
/// fakes; production uses [`HttpEditService`].
#[async_trait]
pub trait EditService: Send + Sync {
    async fn edit(&self, request: EditRequest) -> Result<PixelBuffer>;
}

#[derive(Debug, Serialize)]
struct EditPayload<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instruction: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    success: bool,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// JSON-over-HTTP implementation of the edit contract.
pub struct HttpEditService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEditService {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RetouchError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EditService for HttpEditService {
    async fn edit(&self, request: EditRequest) -> Result<PixelBuffer> {
        let payload = EditPayload {
            image: general_purpose::STANDARD.encode(&request.image),
            mask: request
                .mask
                .as_deref()
                .map(|mask| general_purpose::STANDARD.encode(mask)),
            instruction: request.instruction.as_deref(),
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            inpaint = payload.mask.is_some(),
            "sending edit request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RetouchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetouchError::Transport(format!(
                "edit service returned {status}"
            )));
        }

        let body: EditResponse = response
            .json()
            .await
            .map_err(|e| RetouchError::Decode(e.to_string()))?;

        if !body.success {
            return Err(RetouchError::Rejected(
                body.message
                    .unwrap_or_else(|| "edit service rejected the request".into()),
            ));
        }

        let encoded = body
            .image
            .ok_or_else(|| RetouchError::Decode("response missing image payload".into()))?;
        decode_image_payload(&encoded)
    }
}

/// Decodes a base64 PNG payload, tolerating a `data:` URL prefix.
pub fn decode_image_payload(data: &str) -> Result<PixelBuffer> {
    let encoded = data
        .rsplit_once("base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(data);
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| RetouchError::Decode(format!("invalid base64 image: {e}")))?;
    PixelBuffer::decode_png(&bytes)
}
