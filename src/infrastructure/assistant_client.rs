use crate::infrastructure::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const CHAT_COMPLETIONS_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const MAX_CONTENT_LEN: usize = 4000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const FALLBACK_REPLY: &str =
    "I couldn't generate a response. Please try again with more context.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub max_tokens: u32,
    pub referer: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
}

#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn chat(&self, api_key: &str, request: ChatRequest) -> Result<ChatReply, AppError>;
}

/// Trim, bound, and re-validate the conversation before it leaves the app.
/// Roles are already whitelisted by construction; content is required and
/// clipped to keep oversized prompts from bouncing upstream.
pub fn sanitize_messages(messages: &[ChatMessage]) -> Result<Vec<ChatMessage>, AppError> {
    if messages.is_empty() {
        return Err(AppError::Validation(
            "messages must be a non-empty list".to_string(),
        ));
    }

    messages
        .iter()
        .map(|message| {
            let content = message.content.trim();
            if content.is_empty() {
                return Err(AppError::Validation(
                    "each message must have non-empty content".to_string(),
                ));
            }
            let content = if content.chars().count() > MAX_CONTENT_LEN {
                content.chars().take(MAX_CONTENT_LEN).collect()
            } else {
                content.to_string()
            };
            Ok(ChatMessage {
                role: message.role,
                content,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ChatCompletionPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceContent>,
    delta: Option<ChatChoiceContent>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorResponse {
    error: Option<UpstreamErrorDetail>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: Option<String>,
}

fn upstream_error_detail(body: &str) -> Option<String> {
    let parsed: UpstreamErrorResponse = serde_json::from_str(body).ok()?;
    parsed
        .error
        .and_then(|detail| detail.message)
        .or(parsed.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

/// Normalize upstream HTTP failures into the small set of user-facing
/// messages the UI shows verbatim.
fn map_status_error(status: reqwest::StatusCode, body: &str) -> AppError {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AppError::Assistant("Unauthorized: check the assistant API key.".to_string());
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AppError::Assistant("Rate limit exceeded: please wait and try again.".to_string());
    }
    if status.is_server_error() {
        return AppError::Assistant(
            "Assistant service is unavailable. Please try again later.".to_string(),
        );
    }
    let detail = upstream_error_detail(body).unwrap_or_else(|| "Unknown error".to_string());
    AppError::Assistant(format!(
        "Assistant request failed ({}): {detail}",
        status.as_u16()
    ))
}

fn extract_reply(body: &str) -> Result<ChatReply, AppError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|error| AppError::Assistant(format!("invalid assistant payload: {error}")))?;

    let content = parsed
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|choice| {
            choice
                .message
                .and_then(|message| message.content)
                .or_else(|| choice.delta.and_then(|delta| delta.content))
        })
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| FALLBACK_REPLY.to_string());

    Ok(ChatReply { content })
}

#[derive(Debug, Clone)]
pub struct ReqwestAssistantClient {
    client: Client,
    endpoint: Url,
}

impl ReqwestAssistantClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: Url::parse(CHAT_COMPLETIONS_ENDPOINT).expect("valid fixed endpoint"),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), AppError> {
        if value.trim().is_empty() {
            return Err(AppError::Assistant(format!("{field} must not be empty")));
        }
        Ok(())
    }
}

impl Default for ReqwestAssistantClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssistantClient for ReqwestAssistantClient {
    async fn chat(&self, api_key: &str, request: ChatRequest) -> Result<ChatReply, AppError> {
        Self::ensure_non_empty(api_key, "api key")?;
        let messages = sanitize_messages(&request.messages)?;

        let payload = ChatCompletionPayload {
            model: &request.model,
            messages: &messages,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .header("HTTP-Referer", &request.referer)
            .header("X-Title", &request.title)
            .json(&payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    AppError::Assistant(
                        "The assistant request timed out. Please try again.".to_string(),
                    )
                } else {
                    AppError::Assistant(format!("network error while contacting assistant: {error}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            if error.is_timeout() {
                AppError::Assistant("The assistant request timed out. Please try again.".to_string())
            } else {
                AppError::Assistant(format!("failed reading assistant response: {error}"))
            }
        })?;

        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        extract_reply(&body)
    }
}
