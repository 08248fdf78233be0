//! Language model client that writes documentation for a source file.

use crate::error::LlmError;
use crate::markup;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Produces wiki-markup documentation for one file.
#[async_trait]
pub trait DocWriter: Send + Sync {
    async fn document(&self, file_content: &str, file_path: &str) -> Result<String, LlmError>;
}

/// OpenAI chat completions client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client. `base_url` defaults to the public OpenAI endpoint.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<String>,
    ) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("shipwright-docgen/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(OpenAiClient {
            http_client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl DocWriter for OpenAiClient {
    async fn document(&self, file_content: &str, file_path: &str) -> Result<String, LlmError> {
        let prompt = markup::user_prompt(file_content, file_path);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: markup::SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(file = %file_path, model = %self.model, "requesting documentation");
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Generate documentation for one file. Never fails: errors become an
/// error page body so the run can carry on with the next file.
///
/// Rate-limited calls are retried per `policy`; any other error is final.
pub async fn generate_documentation(
    writer: &dyn DocWriter,
    file_content: &str,
    file_path: &str,
    policy: &RetryPolicy,
) -> String {
    for attempt in 1..=policy.max_attempts {
        match writer.document(file_content, file_path).await {
            Ok(doc) => return doc,
            Err(LlmError::RateLimited(reason)) => {
                warn!(
                    file = %file_path,
                    attempt,
                    max_attempts = policy.max_attempts,
                    reason = %reason,
                    "rate limited by model API"
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
            Err(e) => {
                warn!(file = %file_path, error = %e, "model API call failed");
                return markup::error_body(file_path, &e.to_string());
            }
        }
    }

    warn!(file = %file_path, "giving up after repeated rate limiting");
    markup::retries_exhausted_body(file_path)
}
