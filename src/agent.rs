use crate::llm::chat::{ ChatClient, FragmentStream };
use crate::llm::LlmError;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::models::websocket::{ ClientMessage, ServerMessage };

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use log::{ info, warn, debug };
use std::sync::Arc;
use uuid::Uuid;

/// Appended to the in-progress reply while fragments are still arriving.
pub const CURSOR: char = '▌';

/// Sink for render instructions produced while handling a chat event.
#[async_trait]
pub trait ChatRenderer: Send {
    /// Returns false once the consumer is gone; streaming stops at that point.
    async fn render(&mut self, message: ServerMessage) -> bool;
}

#[async_trait]
impl ChatRenderer for Vec<ServerMessage> {
    async fn render(&mut self, message: ServerMessage) -> bool {
        self.push(message);
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Submit(String),
    Clear,
    History,
}

impl From<ClientMessage> for ChatEvent {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::Chat { content } => ChatEvent::Submit(content),
            ClientMessage::Clear => ChatEvent::Clear,
            ClientMessage::History => ChatEvent::History,
        }
    }
}

/// One user's chat: the conversation log plus the client it is relayed to.
/// Lives exactly as long as the connection that created it.
pub struct ChatSession {
    chat_client: Arc<dyn ChatClient>,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(chat_client: Arc<dyn ChatClient>) -> Self {
        Self {
            chat_client,
            conversation: Conversation::new(Uuid::new_v4().to_string()),
        }
    }

    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns false if the renderer went away while handling the event.
    pub async fn handle<R>(&mut self, event: ChatEvent, renderer: &mut R) -> bool
        where R: ChatRenderer + ?Sized
    {
        match event {
            ChatEvent::Submit(content) => {
                if content.trim().is_empty() {
                    return renderer.render(ServerMessage::Error {
                        message: "Message is empty".to_string(),
                    }).await;
                }
                self.submit(content, renderer).await;
                true
            }
            ChatEvent::Clear => {
                self.clear();
                renderer.render(ServerMessage::Cleared).await
            }
            ChatEvent::History => {
                renderer.render(ServerMessage::History {
                    messages: self.conversation.messages().to_vec(),
                }).await
            }
        }
    }

    /// Relays the conversation with `prompt` appended and stores the reply.
    /// Remote failures become the reply text instead of an error.
    pub async fn submit<R>(&mut self, prompt: String, renderer: &mut R) -> ChatMessage
        where R: ChatRenderer + ?Sized
    {
        self.conversation.push(ChatMessage::user(prompt));
        let mut attached = renderer.render(ServerMessage::Typing).await;

        let reply = if attached {
            match self.chat_client.stream_chat(self.conversation.messages()).await {
                Ok(stream) => {
                    let (result, still_attached) = consume_stream(stream, renderer).await;
                    attached = still_attached;
                    result
                }
                Err(e) => Err(e),
            }
        } else {
            Ok(String::new())
        };

        let content = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!("Completion failed for conversation {}: {}", self.conversation.id, e);
                format!("Error: {}", e)
            }
        };

        let message = ChatMessage::assistant(content);
        self.conversation.push(message.clone());
        info!(
            "Conversation {} now has {} turns",
            self.conversation.id,
            self.conversation.len()
        );

        if attached {
            renderer.render(ServerMessage::Done {
                message: message.clone(),
                timestamp: Utc::now().timestamp(),
            }).await;
        }
        message
    }

    pub fn clear(&mut self) {
        debug!("Clearing conversation {}", self.conversation.id);
        self.conversation.clear();
    }
}

/// Accumulates fragments, rendering the draft after each one. Stops early,
/// keeping what arrived so far, when the renderer detaches.
async fn consume_stream<R>(
    mut stream: FragmentStream,
    renderer: &mut R
) -> (Result<String, LlmError>, bool)
    where R: ChatRenderer + ?Sized
{
    let mut full_response = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(fragment) => {
                full_response.push_str(&fragment);
                let draft = format!("{}{}", full_response, CURSOR);
                if !renderer.render(ServerMessage::Partial { content: draft }).await {
                    return (Ok(full_response), false);
                }
            }
            Err(e) => return (Err(e), true),
        }
    }
    (Ok(full_response), true)
}
