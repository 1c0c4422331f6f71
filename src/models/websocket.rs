use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "clear")]
    Clear,
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "typing")]
    Typing,
    /// In-progress assistant text, including the trailing cursor glyph.
    #[serde(rename = "partial")] Partial {
        content: String,
    },
    #[serde(rename = "done")] Done {
        message: ChatMessage,
        timestamp: i64,
    },
    #[serde(rename = "cleared")]
    Cleared,
    #[serde(rename = "history")] History {
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
