//! Text-generation client.
//!
//! The orchestrator only sees the [`TextGenerator`] trait: one prompt in, one
//! piece of markdown out, or a classified [`GenerationError`]. The production
//! implementation, [`OpenAiClient`], talks to any OpenAI-compatible
//! chat-completions endpoint over a blocking reqwest client; rayon workers
//! each hold a call open, so there is no async runtime to manage.
//!
//! ## Error classes
//!
//! | Error | Cause | Retried |
//! |-------|-------|---------|
//! | `RateLimited` | HTTP 429 | yes |
//! | `Timeout` | client timeout, HTTP 408 | yes |
//! | `Server` | HTTP 5xx | yes |
//! | `Connection` | DNS, TLS, reset | yes |
//! | `Authentication` | HTTP 401/403, missing key | no |
//! | `Rejected` | any other 4xx | no |
//! | `MalformedResponse` | unexpected body | no |

use crate::config::GenerationConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable with an optional organization id.
pub const ORGANIZATION_ENV: &str = "OPENAI_ORGANIZATION";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("rate limited by the generation service")]
    RateLimited,
    #[error("generation request timed out")]
    Timeout,
    #[error("generation service error (HTTP {status})")]
    Server { status: u16 },
    #[error("cannot reach generation service: {0}")]
    Connection(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited,
            408 => Self::Timeout,
            401 | 403 => Self::Authentication(body),
            500..=599 => Self::Server { status },
            _ => Self::Rejected { status, body },
        }
    }

    /// Worth another attempt after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::Server { .. } | Self::Connection(_)
        )
    }

    /// Will fail the same way for every request in this run.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// One completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub prompt: String,
    pub max_tokens: u32,
    /// Choices requested; only the first is used.
    pub choices: u32,
}

impl CompletionRequest {
    pub fn new(config: &GenerationConfig, prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            prompt,
            max_tokens: config.max_tokens,
            choices: config.choices,
        }
    }
}

/// Something that turns a prompt into text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

// ============================================================================
// OpenAI-compatible client
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    n: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn from_request(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            n: request.choices,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Extract the first choice's text from a chat-completions response body.
fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::MalformedResponse("response has no content".into()))
}

/// Chat-completions client for OpenAI and compatible APIs.
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    organization: Option<String>,
}

impl OpenAiClient {
    /// Build a client, reading the key from the configured environment
    /// variable. A missing key is reported per call as an authentication
    /// failure, so fully cached runs work without one.
    pub fn from_env(config: &GenerationConfig) -> Result<Self, reqwest::Error> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        let organization = std::env::var(ORGANIZATION_ENV)
            .ok()
            .filter(|o| !o.is_empty());
        Self::new(config, api_key, organization)
    }

    pub fn new(
        config: &GenerationConfig,
        api_key: Option<String>,
        organization: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.api_base.trim_end_matches('/')
            ),
            api_key,
            api_key_env: config.api_key_env.clone(),
            organization,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TextGenerator for OpenAiClient {
    fn generate(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let Some(api_key) = &self.api_key else {
            return Err(GenerationError::Authentication(format!(
                "{} is not set",
                self.api_key_env
            )));
        };

        let mut call = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&ChatRequest::from_request(request));
        if let Some(org) = &self.organization {
            call = call.header("OpenAI-Organization", org);
        }

        let response = call.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(GenerationError::from_status(status.as_u16(), body));
        }
        parse_chat_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            &GenerationConfig::default(),
            "Explain concatenation in Go.".into(),
        )
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn status_classification() {
        assert_eq!(
            GenerationError::from_status(429, String::new()),
            GenerationError::RateLimited
        );
        assert_eq!(
            GenerationError::from_status(408, String::new()),
            GenerationError::Timeout
        );
        assert_eq!(
            GenerationError::from_status(503, String::new()),
            GenerationError::Server { status: 503 }
        );
        assert!(GenerationError::from_status(401, "bad key".into()).is_authentication());
        assert!(GenerationError::from_status(403, String::new()).is_authentication());
        assert_eq!(
            GenerationError::from_status(400, "bad".into()),
            GenerationError::Rejected {
                status: 400,
                body: "bad".into()
            }
        );
    }

    #[test]
    fn transient_errors() {
        assert!(GenerationError::RateLimited.is_transient());
        assert!(GenerationError::Timeout.is_transient());
        assert!(GenerationError::Server { status: 502 }.is_transient());
        assert!(GenerationError::Connection("reset".into()).is_transient());
    }

    #[test]
    fn fatal_errors() {
        assert!(!GenerationError::Authentication("x".into()).is_transient());
        assert!(
            !GenerationError::Rejected {
                status: 422,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!GenerationError::MalformedResponse("x".into()).is_transient());
    }

    // =========================================================================
    // Wire format
    // =========================================================================

    #[test]
    fn request_body_shape() {
        let req = request();
        let json = serde_json::to_value(ChatRequest::from_request(&req)).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["n"], 1);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "You are an eager teacher.");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Explain concatenation in Go.");
    }

    #[test]
    fn parse_response_takes_first_choice() {
        let body = r#"{"choices": [
            {"index": 0, "message": {"role": "assistant", "content": "first"}},
            {"index": 1, "message": {"role": "assistant", "content": "second"}}
        ]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "first");
    }

    #[test]
    fn parse_response_without_choices() {
        let result = parse_chat_response(r#"{"choices": []}"#);
        assert!(matches!(result, Err(GenerationError::MalformedResponse(_))));
    }

    #[test]
    fn parse_response_not_json() {
        let result = parse_chat_response("<html>bad gateway</html>");
        assert!(matches!(result, Err(GenerationError::MalformedResponse(_))));
    }

    // =========================================================================
    // Client
    // =========================================================================

    #[test]
    fn endpoint_joins_base_url() {
        let config = GenerationConfig {
            api_base: "http://localhost:8080/v1/".into(),
            ..GenerationConfig::default()
        };
        let client = OpenAiClient::new(&config, Some("k".into()), None).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn missing_key_is_authentication_failure() {
        let client = OpenAiClient::new(&GenerationConfig::default(), None, None).unwrap();
        let err = client.generate(&request()).unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
