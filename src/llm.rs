use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::config::Config;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Error types for interactions with an OpenAI-compatible API
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM servers are currently busy. Please try again in a few moments.")]
    ServerBusy,

    #[error("Network connection failed: {message}")]
    NetworkError { message: String },

    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {message}")]
    ParseError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl LlmError {
    pub fn is_server_busy(&self) -> bool {
        matches!(self, LlmError::ServerBusy)
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, LlmError::NetworkError { .. })
    }

    fn is_retryable(&self) -> bool {
        self.is_server_busy() || self.is_network_error()
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LlmError::ServerBusy => {
                "🚫 The model servers are currently busy. Please try again in a few moments."
                    .to_string()
            }
            LlmError::NetworkError { .. } => {
                "🌐 Network connection failed. Please check your internet connection and try again."
                    .to_string()
            }
            LlmError::Timeout { seconds } => {
                format!(
                    "⏰ Request timed out after {} seconds. The server might be overloaded.",
                    seconds
                )
            }
            LlmError::ApiError { status, .. } => match *status {
                429 => {
                    "🚫 Rate limit exceeded. Please wait a moment before trying again.".to_string()
                }
                503 => "🚫 Service temporarily unavailable. Please try again later.".to_string(),
                502 | 504 => {
                    "🚫 Server gateway error. Please try again in a few moments.".to_string()
                }
                _ => format!("❌ API error ({}). Please try again later.", status),
            },
            LlmError::ParseError { .. } => {
                "⚠️ Failed to parse server response. Please try again.".to_string()
            }
            LlmError::ConfigError { message } => {
                format!("⚙️ Configuration error: {}", message)
            }
        }
    }
}

/// Message content: either a plain string or a list of typed parts (text, images).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Function specification advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

/// API request/response structures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_text("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_text("assistant", content)
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(MessageContent::Parts(parts)),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_text("tool", content)
        }
    }

    /// Concatenated text of the message, ignoring image parts.
    pub fn text(&self) -> String {
        match &self.content {
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

/// Client for an OpenAI-compatible chat/embedding API
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: Config,
}

impl fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl LlmClient {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self, LlmError> {
        config.validate().map_err(|e| LlmError::ConfigError {
            message: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("autonomous_engineer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Send chat messages and return the assistant's free-form text.
    pub async fn chat_text(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let message = self
            .with_retry(move || self.send_chat_once(messages, None))
            .await?;
        Ok(message.text())
    }

    /// Send chat messages together with callable function definitions and return the
    /// full assistant message, which may carry `tool_calls`.
    pub async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError> {
        self.with_retry(move || self.send_chat_once(messages, Some(tools)))
            .await
    }

    /// Embed a batch of texts. Vectors come back in input order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.with_retry(move || self.send_embeddings_once(inputs)).await
    }

    /// List the models exposed by the endpoint.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.with_retry(move || self.list_models_once()).await
    }

    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut attempts = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempts < MAX_ATTEMPTS - 1 => {
                    attempts += 1;
                    tracing::warn!(
                        "Request attempt {} failed: {}, retrying in {:?}",
                        attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_chat_once(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatMessage, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools: tools.filter(|t| !t.is_empty()),
        };

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_error_response(status, response).await);
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| LlmError::ParseError {
            message: format!("Failed to parse API response: {}", e),
        })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::ParseError {
                message: "No choices in API response".to_string(),
            })
    }

    async fn send_embeddings_once(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: inputs,
        };

        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_error_response(status, response).await);
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse embedding response: {}", e),
            })?;

        if parsed.data.len() != inputs.len() {
            return Err(LlmError::ParseError {
                message: format!(
                    "Expected {} embeddings, received {}",
                    inputs.len(),
                    parsed.data.len()
                ),
            });
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn list_models_once(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_error_response(status, response).await);
        }

        let list: ModelList = response.json().await.map_err(|e| LlmError::ParseError {
            message: format!("Failed to parse model list: {}", e),
        })?;
        Ok(list.data)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Map reqwest errors to our custom error types
    fn map_reqwest_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            return LlmError::Timeout {
                seconds: self.config.timeout,
            };
        }

        if error.is_connect() {
            return LlmError::NetworkError {
                message: "Failed to connect to server".to_string(),
            };
        }

        if error.is_request() {
            return LlmError::NetworkError {
                message: "Request failed".to_string(),
            };
        }

        let error_msg = error.to_string().to_lowercase();
        if error_msg.contains("dns") {
            return LlmError::NetworkError {
                message: "DNS resolution failed".to_string(),
            };
        }

        LlmError::NetworkError {
            message: format!("Request error: {}", error),
        }
    }

    /// Handle error responses from the server
    async fn handle_error_response(
        &self,
        status: StatusCode,
        response: reqwest::Response,
    ) -> LlmError {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::BAD_GATEWAY
            | StatusCode::GATEWAY_TIMEOUT => LlmError::ServerBusy,
            _ => LlmError::ApiError {
                status: status.as_u16(),
                message: error_text,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::json;
    use wiremock::ResponseTemplate;

    use crate::config::Config;

    pub fn config_for(base_url: &str) -> Config {
        Config {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            model: "test-model".to_string(),
            max_tokens: 256,
            temperature: 0.0,
            timeout: 5,
        }
    }

    /// A chat completion response whose single choice carries `content`.
    pub fn chat_response(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": content }
            }]
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::test_support::{chat_response, config_for};
    use super::*;

    #[tokio::test]
    async fn chat_text_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("test-key"))
            .and(body_partial_json(json!({ "model": "test-model" })))
            .respond_with(chat_response("hello there"))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let text = client.chat_text(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn tool_calls_are_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "read_file", "arguments": "{\"filepath\":\"a.txt\"}" }
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let message = client
            .chat_with_tools(&[ChatMessage::user("read a.txt")], &[])
            .await
            .unwrap();
        assert!(message.has_tool_calls());
        let call = &message.tool_calls.unwrap()[0];
        assert_eq!(call.function.name, "read_file");
        assert_eq!(call.function.arguments, "{\"filepath\":\"a.txt\"}");
    }

    #[tokio::test]
    async fn unauthorized_is_an_api_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let err = client.chat_text(&[ChatMessage::user("hi")]).await.unwrap_err();
        match err {
            LlmError::ApiError { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn busy_server_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let err = client.chat_text(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(err.is_server_busy());
    }

    #[tokio::test]
    async fn empty_choices_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let err = client.chat_text(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::ParseError { .. }));
    }

    #[tokio::test]
    async fn embeddings_are_ordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let vectors = client
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embedding_count_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [1.0] }]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let err = client
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ParseError { .. }));
    }

    #[tokio::test]
    async fn models_are_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    { "id": "deepseek-chat", "object": "model", "owned_by": "deepseek" },
                    { "id": "deepseek-reasoner", "object": "model", "owned_by": "deepseek" }
                ]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(config_for(&server.uri())).unwrap();
        let models = client.list_models().await.unwrap();
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["deepseek-chat", "deepseek-reasoner"]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config_for("http://localhost");
        cfg.api_key.clear();
        assert!(matches!(
            LlmClient::new(cfg),
            Err(LlmError::ConfigError { .. })
        ));
    }

    #[test]
    fn multipart_messages_serialize_with_typed_parts() {
        let msg = ChatMessage::user_parts(vec![
            ContentPart::Text { text: "what is this?".into() },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: "data:image/png;base64,AAAA".into() },
            },
        ]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "image_url");
        assert_eq!(value["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert!(value.get("tool_calls").is_none());
        assert_eq!(msg.text(), "what is this?");
    }
}
