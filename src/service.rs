//! Generation Backends
//!
//! The text and image backends are opaque request/response services. The
//! pipeline only sees the two traits below; `OpenAiClient` is the HTTP
//! implementation and is constructed once and passed down.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::PipelineConfig;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend rejected request: {0}")]
    Rejected(String),

    #[error("Backend response has no {0}")]
    MissingPayload(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

/// Text generation: one instruction pair in, raw response text out.
pub trait TextGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Image generation: one prompt in, one base64 encoded image out.
pub trait ImageGenerator {
    fn generate_image(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageGenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    quality: &'a str,
    size: &'a str,
    n: u32,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Blocking client for an OpenAI-compatible API.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    api_base: String,
    text_model: String,
    image_model: String,
    image_size: String,
    image_quality: String,
}

impl OpenAiClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, ServiceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            image_size: config.image_size.clone(),
            image_quality: config.image_quality.clone(),
        })
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::blocking::Response, ServiceError> {
        let url = format!("{}/{}", self.api_base, path);
        debug!(%url, "sending backend request");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        Ok(response)
    }
}

impl TextGenerator for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let body = ChatCompletionBody {
            model: &self.text_model,
            messages: vec![
                ChatMessage { role: Role::System, content: request.system.clone() },
                ChatMessage { role: Role::User, content: request.user.clone() },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let parsed: ChatCompletionResponse = self.post("chat/completions", &body)?.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ServiceError::MissingPayload("message content"))
    }
}

impl ImageGenerator for OpenAiClient {
    fn generate_image(&self, prompt: &str) -> Result<String, ServiceError> {
        let body = ImageGenerationBody {
            model: &self.image_model,
            prompt,
            quality: &self.image_quality,
            size: &self.image_size,
            n: 1,
        };

        let parsed: ImageGenerationResponse = self.post("images/generations", &body)?.json()?;
        if let Some(error) = parsed.error {
            return Err(ServiceError::Rejected(error.message));
        }
        parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or(ServiceError::MissingPayload("b64_json image data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_shape() {
        let body = ChatCompletionBody {
            model: "gpt-4.1-nano",
            messages: vec![ChatMessage { role: Role::System, content: "style".into() }],
            response_format: ResponseFormat { kind: "json_object" },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
    }

    #[test]
    fn test_image_response_without_payload() {
        let parsed: ImageGenerationResponse = serde_json::from_str(r#"{"data": [{}]}"#).unwrap();
        assert!(parsed.data[0].b64_json.is_none());

        let parsed: ImageGenerationResponse =
            serde_json::from_str(r#"{"error": {"message": "content policy"}}"#).unwrap();
        assert_eq!(parsed.error.unwrap().message, "content policy");
    }

    #[test]
    fn test_client_builds_from_config() {
        let config = PipelineConfig::new("sk-test");
        assert!(OpenAiClient::new(&config).is_ok());
    }
}
