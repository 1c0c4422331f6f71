use crate::agent::{ ChatRenderer, ChatSession };
use crate::llm::chat::ChatClient;
use crate::models::websocket::{ ClientMessage, ServerMessage };

use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use lazy_static::lazy_static;
use log::{ info, warn, error };
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap_or(NonZeroU32::MIN)));
}

/// Sends render instructions to one WebSocket client as JSON text frames.
struct WsRenderer<S> {
    peer: SocketAddr,
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> ChatRenderer for WsRenderer<S>
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    async fn render(&mut self, message: ServerMessage) -> bool {
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode message for {}: {}", self.peer, e);
                return true;
            }
        };
        match self.sink.send(Message::Text(json)).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Client {} went away: {}", self.peer, e);
                false
            }
        }
    }
}

pub async fn start_ws_server(
    addr: &str,
    chat_client: Arc<dyn ChatClient>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let client = Arc::clone(&chat_client);

        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => handle_connection(peer, ws, client).await,
                Err(e) => error!("Handshake failed for {}: {}", peer, e),
            }
        });
    }
}

/// Runs one chat session for the lifetime of the connection.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    chat_client: Arc<dyn ChatClient>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    let (tx, mut rx) = websocket.split();
    let mut renderer = WsRenderer { peer, sink: tx };
    let mut session = ChatSession::new(chat_client);
    info!("Assigned conversation ID {} to {}", session.id(), peer);

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            renderer.render(ServerMessage::Error {
                message: "Message too large".to_string(),
            }).await;
            break;
        }

        match message {
            Message::Text(text) => {
                let attached = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => session.handle(client_message.into(), &mut renderer).await,
                    Err(e) => {
                        warn!("Failed to parse message from {}: {}", peer, e);
                        renderer.render(ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        }).await
                    }
                };
                if !attached {
                    break;
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                if renderer.sink.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    info!(
        "WebSocket connection closed for {} (Conv ID: {}, {} turns)",
        peer,
        session.id(),
        session.conversation().len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::FragmentStream;
    use crate::llm::LlmError;
    use crate::models::chat::ChatMessage;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::protocol::Role;

    struct CannedClient;

    #[async_trait]
    impl ChatClient for CannedClient {
        async fn stream_chat(&self, _messages: &[ChatMessage]) -> Result<FragmentStream, LlmError> {
            let fragments: Vec<Result<String, LlmError>> = vec![Ok("Hel".into()), Ok("lo!".into())];
            Ok(Box::pin(futures::stream::iter(fragments)))
        }

        fn get_model(&self) -> String {
            "canned".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    async fn connect() -> (WebSocketStream<DuplexStream>, JoinHandle<()>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let session = tokio::spawn(async move {
            let ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
            handle_connection(peer, ws, Arc::new(CannedClient)).await;
        });
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (client, session)
    }

    async fn next_json(client: &mut WebSocketStream<DuplexStream>) -> serde_json::Value {
        loop {
            match client.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    async fn send_json(client: &mut WebSocketStream<DuplexStream>, value: serde_json::Value) {
        client.send(Message::Text(value.to_string())).await.unwrap();
    }

    async fn ends(session: JoinHandle<()>) {
        tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .expect("session did not end")
            .unwrap();
    }

    #[tokio::test]
    async fn chat_message_streams_partials_then_done() {
        let (mut client, _session) = connect().await;
        send_json(&mut client, serde_json::json!({ "type": "chat", "content": "Hi" })).await;

        assert_eq!(next_json(&mut client).await["type"], "typing");
        let partial = next_json(&mut client).await;
        assert_eq!(partial["type"], "partial");
        assert_eq!(partial["content"], "Hel▌");
        assert_eq!(next_json(&mut client).await["content"], "Hello!▌");
        let done = next_json(&mut client).await;
        assert_eq!(done["type"], "done");
        assert_eq!(done["message"]["role"], "assistant");
        assert_eq!(done["message"]["content"], "Hello!");

        send_json(&mut client, serde_json::json!({ "type": "history" })).await;
        let history = next_json(&mut client).await;
        assert_eq!(history["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unparsable_message_renders_error_and_keeps_session() {
        let (mut client, _session) = connect().await;
        client.send(Message::Text("{not json".into())).await.unwrap();

        let error = next_json(&mut client).await;
        assert_eq!(error["type"], "error");
        assert!(error["message"].as_str().unwrap().starts_with("Failed to parse message"));

        send_json(&mut client, serde_json::json!({ "type": "clear" })).await;
        assert_eq!(next_json(&mut client).await["type"], "cleared");
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let (mut client, _session) = connect().await;
        client.send(Message::Ping(vec![1, 2, 3])).await.unwrap();

        match client.next().await.unwrap().unwrap() {
            Message::Pong(data) => assert_eq!(data, vec![1, 2, 3]),
            other => panic!("expected pong, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_message_closes_connection() {
        let (mut client, session) = connect().await;
        client.send(Message::Text("x".repeat(MAX_MESSAGE_SIZE + 1))).await.unwrap();

        let error = next_json(&mut client).await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "Message too large");
        ends(session).await;
    }

    #[tokio::test]
    async fn close_frame_ends_session() {
        let (mut client, session) = connect().await;
        client.close(None).await.unwrap();
        ends(session).await;
    }
}
