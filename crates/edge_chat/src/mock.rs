//! Scripted model gateway for testing.
//!
//! Returns queued replies in order and captures every call so tests can
//! assert on the exact messages and options sent to the model.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;

use edge_core::ConversationTurn;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{CompletionOptions, FragmentStream, ModelGateway, StreamEvent};
use crate::health::{HealthReport, ProbeKind};

/// Endpoint reported by the mock.
pub const MOCK_ENDPOINT: &str = "mock://llm/v1/chat/completions";

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    /// `complete` or `stream`
    pub method: &'static str,
    pub messages: Vec<ConversationTurn>,
    pub options: CompletionOptions,
}

/// Mock gateway with scripted replies.
#[derive(Clone, Default)]
pub struct MockGateway {
    completions: Arc<RwLock<VecDeque<GatewayResult<String>>>>,
    streams: Arc<RwLock<VecDeque<Vec<StreamEvent>>>>,
    health: Arc<RwLock<Option<HealthReport>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful blocking reply.
    pub fn with_completion(self, text: impl Into<String>) -> Self {
        self.completions.write().push_back(Ok(text.into()));
        self
    }

    /// Queue a failing blocking reply.
    pub fn with_failure(self, error: GatewayError) -> Self {
        self.completions.write().push_back(Err(error));
        self
    }

    /// Queue the events of one streamed reply.
    pub fn with_stream(self, events: Vec<StreamEvent>) -> Self {
        self.streams.write().push_back(events);
        self
    }

    /// Report returned by `probe`.
    pub fn with_health(self, report: HealthReport) -> Self {
        *self.health.write() = Some(report);
        self
    }

    /// Sleep before answering each blocking call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = Some(delay);
        self
    }

    pub fn captured_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn last_call(&self) -> Option<CapturedCall> {
        self.captured_calls.read().last().cloned()
    }

    fn capture(&self, method: &'static str, messages: &[ConversationTurn], options: &CompletionOptions) {
        self.captured_calls.write().push(CapturedCall {
            method,
            messages: messages.to_vec(),
            options: options.clone(),
        });
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn complete(
        &self,
        messages: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> GatewayResult<String> {
        self.capture("complete", messages, options);
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.completions.write().pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Transport("no scripted completion left".to_string())))
    }

    async fn stream(
        &self,
        messages: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> FragmentStream {
        self.capture("stream", messages, options);
        let events = self.streams.write().pop_front().unwrap_or_default();
        stream::iter(events).boxed()
    }

    async fn probe(&self) -> HealthReport {
        let report = self.health.read().clone();
        report.unwrap_or_else(|| HealthReport::healthy(ProbeKind::Models, MOCK_ENDPOINT, 200, 0.0))
    }

    fn endpoint(&self) -> &str {
        MOCK_ENDPOINT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{AgentConfig, OperationMode};

    fn options() -> CompletionOptions {
        CompletionOptions::for_mode(&AgentConfig::default(), OperationMode::Chat)
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mock = MockGateway::new()
            .with_completion("first")
            .with_failure(GatewayError::Timeout("slow".into()));
        let messages = [ConversationTurn::user("hi")];

        assert_eq!(mock.complete(&messages, &options()).await.unwrap(), "first");
        assert!(mock.complete(&messages, &options()).await.unwrap_err().is_timeout());
        assert!(mock.complete(&messages, &options()).await.is_err());
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.last_call().unwrap().messages, messages.to_vec());
    }

    #[tokio::test]
    async fn test_scripted_stream() {
        let mock = MockGateway::new().with_stream(vec![
            StreamEvent::Content("a".into()),
            StreamEvent::Timeout,
        ]);
        let events: Vec<StreamEvent> = mock.stream(&[], &options()).await.collect().await;
        assert_eq!(events, vec![StreamEvent::Content("a".into()), StreamEvent::Timeout]);
        assert_eq!(mock.captured_calls()[0].method, "stream");
    }
}
