pub mod openai;

use async_trait::async_trait;
use eventsource_stream::{ EventStreamError, Eventsource };
use futures::{ Stream, StreamExt };
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::openai::OpenAIChatClient;
use crate::models::chat::ChatMessage;

/// Lazy, finite, non-restartable sequence of completion fragments. Dropping it
/// cancels the underlying request.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the whole conversation and returns the streamed reply.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI | LlmType::Groq => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// What the data of one server-sent event contributed.
#[derive(Debug, Default, PartialEq)]
pub struct StreamLine {
    pub fragment: Option<String>,
    pub done: bool,
}

impl From<EventStreamError<reqwest::Error>> for LlmError {
    fn from(err: EventStreamError<reqwest::Error>) -> Self {
        match err {
            EventStreamError::Transport(e) => LlmError::Http(e),
            other => LlmError::Stream(other.to_string()),
        }
    }
}

/// Turns a chunked HTTP body into fragments, one `parse_data` call per
/// server-sent event. The stream ends after the first error or once
/// `parse_data` reports the end. No task is spawned: the body is only read
/// while the caller polls.
pub fn event_stream<S, B>(
    body: S,
    parse_data: fn(&str) -> Result<StreamLine, LlmError>
) -> FragmentStream
    where
        S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static
{
    let events = Box::pin(body.eventsource());

    Box::pin(
        futures::stream::unfold(Some(events), move |events| async move {
            let mut events = events?;
            loop {
                let line = match events.next().await? {
                    Ok(event) => parse_data(&event.data),
                    Err(e) => Err(LlmError::from(e)),
                };
                match line {
                    Ok(StreamLine { fragment, done }) => {
                        match (fragment.filter(|f| !f.is_empty()), done) {
                            (Some(fragment), false) => {
                                return Some((Ok(fragment), Some(events)));
                            }
                            (Some(fragment), true) => {
                                return Some((Ok(fragment), None));
                            }
                            (None, true) => {
                                return None;
                            }
                            (None, false) => {}
                        }
                    }
                    Err(e) => {
                        return Some((Err(e), None));
                    }
                }
            }
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_data(data: &str) -> Result<StreamLine, LlmError> {
        match data {
            "[DONE]" => Ok(StreamLine { fragment: None, done: true }),
            "fail" => Err(LlmError::Remote("overloaded".into())),
            text => Ok(StreamLine { fragment: Some(text.to_string()), done: false }),
        }
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send + 'static {
        let owned: Vec<Result<Vec<u8>, reqwest::Error>> = parts
            .iter()
            .map(|p| Ok(p.as_bytes().to_vec()))
            .collect();
        futures::stream::iter(owned)
    }

    async fn collect(stream: FragmentStream) -> Vec<Result<String, String>> {
        stream.map(|item| item.map_err(|e| e.to_string())).collect().await
    }

    #[tokio::test]
    async fn reassembles_events_split_across_chunks() {
        let body = chunks(&["data: He", "l\n\ndata: lo", "!\r\n\r\n", "data: [DONE]\n\n"]);
        assert_eq!(
            collect(event_stream(body, echo_data)).await,
            vec![Ok("Hel".to_string()), Ok("lo!".to_string())]
        );
    }

    #[tokio::test]
    async fn stops_at_done_marker() {
        let body = chunks(&["data: a\n\ndata: [DONE]\n\ndata: ignored\n\n"]);
        assert_eq!(collect(event_stream(body, echo_data)).await, vec![Ok("a".to_string())]);
    }

    #[tokio::test]
    async fn error_event_ends_the_stream() {
        let body = chunks(&["data: Hel\n\n", "data: fail\n\n", "data: never\n\n"]);
        assert_eq!(
            collect(event_stream(body, echo_data)).await,
            vec![Ok("Hel".to_string()), Err("overloaded".to_string())]
        );
    }

    #[tokio::test]
    async fn joins_multi_line_data_and_skips_comments() {
        let body = chunks(&[": keep-alive\n\n", "event: message\ndata: a\ndata: b\n\n"]);
        assert_eq!(collect(event_stream(body, echo_data)).await, vec![Ok("a\nb".to_string())]);
    }

    #[tokio::test]
    async fn skips_empty_fragments() {
        let body = chunks(&["data: \n\n", "data: z\n\n"]);
        assert_eq!(collect(event_stream(body, echo_data)).await, vec![Ok("z".to_string())]);
    }
}
