pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    OpenAI,
    Groq,
}

impl LlmType {
    /// Chat completions endpoint used when no base URL is configured.
    pub fn default_chat_url(&self) -> &'static str {
        match self {
            LlmType::OpenAI => "https://api.openai.com/v1/chat/completions",
            LlmType::Groq => "https://api.groq.com/openai/v1/chat/completions",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::OpenAI => write!(f, "openai"),
            LlmType::Groq => write!(f, "groq"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmType::OpenAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::OpenAI,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

/// Failures of the remote completion service. The `Display` text is what ends
/// up in the conversation after the `Error: ` prefix, so variants carrying a
/// message print it verbatim.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0}")]
    Remote(String),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed event stream: {0}")]
    Stream(String),
    #[error("invalid API key format: {0}")]
    InvalidApiKey(String),
    #[error("{provider} API key is required")]
    MissingApiKey { provider: LlmType },
}
