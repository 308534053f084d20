//! OpenAI Vision Provider Implementation
//!
//! Implements the AnalysisAdapter trait against OpenAI-compatible
//! chat-completion endpoints with image inputs.

use async_trait::async_trait;
#[cfg(feature = "ai-providers")]
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::VisionProviderConfig;
use crate::core::analysis::{AnalysisAdapter, AnalysisRequest};
use crate::core::catalog::ItemMetadata;
use crate::core::{CoreError, CoreResult};

/// Instructions sent as the system message with every analysis request.
///
/// The key list must stay aligned with the serde names of ItemMetadata.
#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
const CATALOG_SYSTEM_PROMPT: &str = "\
You are an experienced estate-sale cataloger. All photos in this request show \
ONE physical item from different angles. Identify the item and respond with a \
single JSON object using exactly these keys (omit any you cannot determine): \
category, title, maker, style, materials, markings, era, condition, \
valuationLow, valuationHigh, confidence, confidenceReason, reasoning, \
searchTerms, searchTermsBroad, salesBlurb, questions. \
valuationLow/valuationHigh are resale estimates in USD as numbers. \
confidence is 0.0-1.0. questions is an array of short strings asking for \
details a photo cannot show. Keep every text value concise. \
Respond with JSON only.";

// =============================================================================
// OpenAI Vision Provider
// =============================================================================

/// Vision analysis against an OpenAI-compatible chat-completion endpoint
pub struct OpenAIVisionAnalysis {
    #[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
    api_key: String,
    #[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
    base_url: String,
    #[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
    model: String,
    #[cfg(feature = "ai-providers")]
    client: reqwest::Client,
}

impl OpenAIVisionAnalysis {
    /// Default OpenAI API base URL
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Builds a provider from connection settings.
    ///
    /// Fails when no usable API key is configured or the HTTP client cannot
    /// be constructed.
    pub fn new(config: VisionProviderConfig) -> CoreResult<Self> {
        let api_key = match config.api_key {
            Some(key) if !key.is_empty() => key,
            _ => {
                return Err(CoreError::ValidationError(
                    "vision provider needs a non-empty API key".to_string(),
                ))
            }
        };

        let base_url = config
            .base_url
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());

        #[cfg(feature = "ai-providers")]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url,
            model: config.model,
            #[cfg(feature = "ai-providers")]
            client,
        })
    }
}

// =============================================================================
// Wire Format
// =============================================================================

// Struct and field names below follow the chat-completion JSON shape; only
// what this provider sends and reads is modeled.

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ReplyFormat,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct Message {
    role: String,
    content: MessageBody,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
#[serde(untagged)]
enum MessageBody {
    Text(String),
    Parts(Vec<Part>),
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Part {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct ImageRef {
    url: String,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct ReplyFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct ChatReply {
    choices: Vec<Choice>,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct ApiFailure {
    error: FailureDetail,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct FailureDetail {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

// =============================================================================
// Prompt Assembly and Response Parsing
// =============================================================================

#[cfg(feature = "ai-providers")]
fn build_user_parts(request: &AnalysisRequest) -> CoreResult<Vec<Part>> {
    let mut text = String::new();
    if !request.context_notes.is_empty() {
        text.push_str("Context from the operator: ");
        text.push_str(&request.context_notes);
        text.push('\n');
    }
    if !request.known_fields.is_empty() {
        let known = serde_json::to_string(&request.known_fields)?;
        text.push_str("Already known about this item (do not contradict): ");
        text.push_str(&known);
        text.push('\n');
    }
    if text.is_empty() {
        text.push_str("Identify this item.");
    }

    let mut parts = vec![Part::Text { text }];
    for bytes in &request.image_bytes {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        parts.push(Part::ImageUrl {
            image_url: ImageRef {
                url: format!("data:image/jpeg;base64,{encoded}"),
            },
        });
    }
    Ok(parts)
}

/// Turns a non-success HTTP reply into a readable failure message, decoding
/// the endpoint's error envelope when there is one.
#[cfg(feature = "ai-providers")]
fn describe_api_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiFailure>(body) {
        Ok(failure) => {
            let kind = failure.error.kind.as_deref().unwrap_or("unknown");
            format!("endpoint returned {status} ({kind}): {}", failure.error.message)
        }
        Err(_) => format!("endpoint returned {status}: {body}"),
    }
}

/// Parses the model's reply into metadata, tolerating code fences some
/// OpenAI-compatible endpoints wrap around JSON output.
#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
fn parse_metadata(content: &str) -> CoreResult<ItemMetadata> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_start_matches(['\r', '\n']))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| CoreError::AnalysisFailed(format!("unparseable analysis reply: {e}")))
}

// =============================================================================
// AnalysisAdapter Implementation
// =============================================================================

#[async_trait]
impl AnalysisAdapter for OpenAIVisionAnalysis {
    fn name(&self) -> &str {
        "openai"
    }

    #[cfg(feature = "ai-providers")]
    async fn analyze(&self, request: AnalysisRequest) -> CoreResult<ItemMetadata> {
        if request.image_count() == 0 {
            return Err(CoreError::AnalysisNoImages);
        }

        let chat = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: MessageBody::Text(CATALOG_SYSTEM_PROMPT.to_string()),
                },
                Message {
                    role: "user".to_string(),
                    content: MessageBody::Parts(build_user_parts(&request)?),
                },
            ],
            response_format: ReplyFormat {
                kind: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&chat)
            .send()
            .await
            .map_err(|e| CoreError::AnalysisFailed(format!("vision request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::AnalysisFailed(format!("could not read vision reply: {e}")))?;
        if !status.is_success() {
            return Err(CoreError::AnalysisFailed(describe_api_failure(
                status, &body,
            )));
        }

        let reply: ChatReply = serde_json::from_str(&body)
            .map_err(|e| CoreError::AnalysisFailed(format!("malformed vision reply: {e}")))?;
        let content = reply
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                CoreError::AnalysisFailed("vision reply carried no content".to_string())
            })?;

        parse_metadata(&content)
    }

    #[cfg(not(feature = "ai-providers"))]
    async fn analyze(&self, _request: AnalysisRequest) -> CoreResult<ItemMetadata> {
        Err(CoreError::AnalysisFailed(
            "built without the ai-providers feature; remote analysis is unavailable".to_string(),
        ))
    }
}
