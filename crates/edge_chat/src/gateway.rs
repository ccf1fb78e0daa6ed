//! The Model Gateway seam.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;

use edge_core::{AgentConfig, ConversationTurn, OperationMode};

use crate::error::GatewayResult;
use crate::health::HealthReport;

/// Text appended to a stream that stopped on a timeout.
pub const TIMEOUT_SENTINEL: &str = "[timeout]";

/// Per-call settings for the completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub stream: bool,
    /// Ask the endpoint for `response_format: {"type": "json_object"}`
    pub json_response: bool,
}

impl CompletionOptions {
    /// Options for one operation mode of the agent.
    pub fn for_mode(config: &AgentConfig, mode: OperationMode) -> Self {
        let settings = config.mode(mode);
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: settings.max_tokens,
            connect_timeout: config.llm.connect_timeout(),
            read_timeout: settings.read_timeout(),
            stream: mode == OperationMode::ChatStream,
            json_response: mode.is_structured(),
        }
    }

    /// Upper bound for a blocking call.
    pub fn total_timeout(&self) -> Duration {
        self.connect_timeout + self.read_timeout
    }
}

/// One item of a streamed completion. Failures arrive inline, never as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    /// The endpoint stopped answering; the stream ends after this
    Timeout,
    /// Any other failure; the stream ends after this
    Error(String),
}

impl StreamEvent {
    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    /// Text as written to a plain-text response body.
    pub fn into_text(self) -> String {
        match self {
            Self::Content(text) => text,
            Self::Timeout => TIMEOUT_SENTINEL.to_string(),
            Self::Error(message) => format!("[error] {message}"),
        }
    }
}

/// Lazy sequence of stream events. Dropping it releases the connection.
pub type FragmentStream = BoxStream<'static, StreamEvent>;

/// A stream holding exactly one event.
pub fn single_event(event: StreamEvent) -> FragmentStream {
    stream::iter([event]).boxed()
}

/// Chat-completion backend.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send `messages` and wait for the whole reply text.
    async fn complete(
        &self,
        messages: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> GatewayResult<String>;

    /// Send `messages` and return the reply as it arrives.
    async fn stream(
        &self,
        messages: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> FragmentStream;

    /// Check that the endpoint answers. Never fails; problems are reported
    /// in the returned value.
    async fn probe(&self) -> HealthReport;

    /// Completion URL this gateway talks to.
    fn endpoint(&self) -> &str;
}
