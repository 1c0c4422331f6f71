use async_trait::async_trait;
use log::{ debug, info, warn };
use reqwest::{Client as HttpClient, StatusCode, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};

use super::{ event_stream, ChatClient, FragmentStream, StreamLine };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::ChatMessage;

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OpenAIMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
    #[serde(rename = "finish_reason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::InvalidApiKey(e.to_string()))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey { provider: config.llm_type })?;

        let model = config.completion_model
            .clone()
            .unwrap_or_else(|| "gpt-3.5-turbo".to_string());
        let base_url = config.base_url
            .clone()
            .unwrap_or_else(|| config.llm_type.default_chat_url().to_string());

        Self::new(api_key, model, base_url)
    }
}

/// Parses the data of one chat completions event. An `{"error": ..}` payload
/// sent mid-stream becomes an error.
pub fn parse_stream_data(data: &str) -> Result<StreamLine, LlmError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(StreamLine::default());
    }
    if data == "[DONE]" {
        return Ok(StreamLine { fragment: None, done: true });
    }

    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(stream_resp) => {
            let mut fragment: Option<String> = None;
            let mut done = false;
            for choice in stream_resp.choices {
                if let Some(content) = choice.delta.content {
                    fragment.get_or_insert_with(String::new).push_str(&content);
                }
                if choice.finish_reason.as_deref() == Some("stop") {
                    done = true;
                }
            }
            Ok(StreamLine { fragment, done })
        }
        Err(e) => {
            if let Ok(error_body) = serde_json::from_str::<OpenAIErrorBody>(data) {
                warn!("Completion stream reported an error: {}", error_body.error.message);
                return Err(LlmError::Remote(error_body.error.message));
            }
            debug!("JSON parse error: {} for data: {}", e, data);
            Ok(StreamLine::default())
        }
    }
}

fn remote_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body.trim()),
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LlmError> {
        let req = OpenAIChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(OpenAIMessage::from).collect(),
            stream: true,
        };

        info!("Requesting streamed completion: model={}, turns={}", self.model, messages.len());
        let resp = self.http.post(&self.base_url)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Failed to read error body for HTTP {}: {}", status, e);
                    String::new()
                }
            };
            return Err(LlmError::Remote(remote_error_message(status, &body)));
        }

        Ok(event_stream(resp.bytes_stream(), parse_stream_data))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
