//! Agent operations: the orchestration behind every route.
//!
//! Each operation locks the conversation for its whole exchange: history is
//! read, the model is called and the new turns are appended under the same
//! per-conversation lock. Failed exchanges leave the history untouched.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, Instrument, Span};

use edge_chat::{
    CompletionOptions, ConversationStore, HealthReport, ModelGateway, StreamEvent,
};
use edge_context::{
    add_view_context, build_user_prompt, ContextEnricher, PromptComposer, ReferenceLibrary,
    TaskMode,
};
use edge_core::{
    AgentConfig, AgentRequest, ChatReply, ChatRequest, ConversationTurn, OperationMode,
    StructuredAgentResponse,
};
use edge_normalize::{NormalizeMode, ResponseNormalizer};

use crate::error::ApiResult;

/// Buffered text fragments between the model stream and the response body.
const STREAM_BUFFER: usize = 32;

/// Plain-text fragments of a streamed chat reply.
pub type TextStream = BoxStream<'static, String>;

/// Shared state behind the HTTP routes.
pub struct AgentService {
    config: AgentConfig,
    gateway: Arc<dyn ModelGateway>,
    store: ConversationStore,
    composer: PromptComposer,
    enricher: ContextEnricher,
}

impl AgentService {
    pub fn new(
        config: AgentConfig,
        gateway: Arc<dyn ModelGateway>,
        library: &ReferenceLibrary,
        enricher: ContextEnricher,
    ) -> Self {
        Self {
            config,
            gateway,
            store: ConversationStore::new(),
            composer: PromptComposer::new(library),
            enricher,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Effective configuration, as served by `/debug/llm-config`.
    pub fn config_snapshot(&self) -> ApiResult<Value> {
        let mut value = serde_json::to_value(&self.config)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "endpoint".to_string(),
                Value::String(self.gateway.endpoint().to_string()),
            );
            map.insert(
                "retrieval_active".to_string(),
                Value::Bool(self.enricher.retrieval_enabled()),
            );
        }
        Ok(value)
    }

    /// Stored turns of a conversation.
    pub async fn history(&self, conversation_id: &str) -> Vec<ConversationTurn> {
        self.store.snapshot(conversation_id).await
    }

    /// `/agent/ask`: structured patch answering a controller question.
    pub async fn ask(&self, request: AgentRequest) -> ApiResult<StructuredAgentResponse> {
        self.structured(OperationMode::Ask, request).await
    }

    /// `/agent/build_view`: structured patch adding views, tags and components.
    pub async fn build_view(&self, request: AgentRequest) -> ApiResult<StructuredAgentResponse> {
        self.structured(OperationMode::BuildView, request).await
    }

    async fn structured(
        &self,
        mode: OperationMode,
        request: AgentRequest,
    ) -> ApiResult<StructuredAgentResponse> {
        let conversation_id = request.conversation_key();
        let normalizer = ResponseNormalizer::new(match mode {
            OperationMode::BuildView => NormalizeMode::ViewBuilding,
            _ => NormalizeMode::Structured,
        });

        let mut context = request.context.clone().unwrap_or_default();
        if mode == OperationMode::BuildView {
            let relevant_docs = self.enricher.enrich(&request.prompt).await;
            let component_reference = self.enricher.component_reference(&request.prompt);
            add_view_context(&mut context, relevant_docs, component_reference);
        }
        let user_content = build_user_prompt(&request.prompt, &context);

        let handle = self.store.get_or_create(&conversation_id);
        let mut history = handle.lock().await;
        let messages = self
            .composer
            .messages(TaskMode::from(mode), &history.to_vec(), user_content);
        let options = CompletionOptions::for_mode(&self.config, mode);

        let started = Instant::now();
        let raw = self.gateway.complete(&messages, &options).await?;
        let normalized = normalizer.normalize(&raw)?;

        let assistant = normalized.response.to_compact_json()?;
        history.record_exchange(
            request.prompt,
            assistant,
            self.config.mode(mode).history_cap,
        );

        info!(
            conversation_id = %conversation_id,
            mode = mode.as_str(),
            device_id = %request.device_id,
            repaired = normalized.repaired,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Structured request completed"
        );
        Ok(normalized.response)
    }

    /// `/chat`: free-form reply.
    pub async fn chat(&self, request: ChatRequest) -> ApiResult<ChatReply> {
        let conversation_id = request.conversation_key();
        let mode = OperationMode::Chat;

        let handle = self.store.get_or_create(&conversation_id);
        let mut history = handle.lock().await;
        let messages = self
            .composer
            .messages(TaskMode::Chat, &history.to_vec(), request.prompt.clone());
        let options = CompletionOptions::for_mode(&self.config, mode);

        let started = Instant::now();
        let reply = self.gateway.complete(&messages, &options).await?;
        let reply = reply.trim().to_string();
        history.record_exchange(request.prompt, reply.clone(), self.config.mode(mode).history_cap);

        info!(
            conversation_id = %conversation_id,
            mode = mode.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chat request completed"
        );
        Ok(ChatReply { reply })
    }

    /// `/chat/stream`: reply fragments as they arrive.
    ///
    /// Failures show up inline as `[timeout]` or `[error] ...` fragments.
    /// The model stream is pumped by a background task that stops when the
    /// client goes away; whatever content arrived by then is recorded.
    pub fn chat_stream(self: Arc<Self>, request: ChatRequest) -> TextStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(
            async move { self.pump_stream(request, tx).await }.instrument(Span::current()),
        );
        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|fragment| (fragment, rx))
        })
        .boxed()
    }

    async fn pump_stream(&self, request: ChatRequest, tx: mpsc::Sender<String>) {
        let conversation_id = request.conversation_key();
        let mode = OperationMode::ChatStream;

        let handle = self.store.get_or_create(&conversation_id);
        let mut history = handle.lock().await;
        let messages = self
            .composer
            .messages(TaskMode::Chat, &history.to_vec(), request.prompt.clone());
        let options = CompletionOptions::for_mode(&self.config, mode);

        let started = Instant::now();
        let mut events = self.gateway.stream(&messages, &options).await;
        let mut accumulated = String::new();
        let mut disconnected = false;

        loop {
            let event = tokio::select! {
                event = events.next() => event,
                _ = tx.closed() => {
                    disconnected = true;
                    None
                }
            };
            let Some(event) = event else {
                break;
            };
            if let StreamEvent::Content(text) = &event {
                accumulated.push_str(text);
            }
            if tx.send(event.into_text()).await.is_err() {
                disconnected = true;
                break;
            }
        }
        drop(events);

        if disconnected {
            debug!(conversation_id = %conversation_id, "Stream client disconnected");
        }
        if accumulated.is_empty() {
            debug!(conversation_id = %conversation_id, "No streamed content to record");
            return;
        }

        let chars = accumulated.chars().count();
        history.record_exchange(request.prompt, accumulated, self.config.mode(mode).history_cap);
        info!(
            conversation_id = %conversation_id,
            mode = mode.as_str(),
            chars,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Streamed chat completed"
        );
        // tx drops here, after the exchange is recorded, ending the body.
    }

    /// `/health/llm`: probe the completion endpoint.
    pub async fn health(&self) -> HealthReport {
        self.gateway.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_chat::{GatewayError, MockGateway};
    use edge_core::Role;

    const REPLY: &str = r#"{"message": "ok", "steps": [], "proposed_changes": {}}"#;

    fn service(gateway: MockGateway) -> Arc<AgentService> {
        let config = AgentConfig::default();
        let library = Arc::new(ReferenceLibrary::empty());
        let enricher = ContextEnricher::new(library.clone(), &config.rag);
        Arc::new(AgentService::new(config, Arc::new(gateway), &library, enricher))
    }

    fn ask_request(prompt: &str) -> AgentRequest {
        AgentRequest {
            device_id: "plc-1".to_string(),
            prompt: prompt.to_string(),
            context: None,
            conversation_id: None,
        }
    }

    #[tokio::test]
    async fn test_ask_records_prompt_and_canonical_reply() {
        let gateway = MockGateway::new().with_completion(REPLY);
        let service = service(gateway.clone());

        let response = service.ask(ask_request("what is tag 3?")).await.unwrap();
        assert_eq!(response.message, "ok");

        let history = service.history("plc-1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ConversationTurn::user("what is tag 3?"));
        assert_eq!(
            history[1].content,
            r#"{"message":"ok","steps":[],"proposed_changes":{"hmi":{}}}"#
        );

        let call = gateway.last_call().unwrap();
        assert!(call.options.json_response);
        assert_eq!(call.options.max_tokens, 2048);
        assert_eq!(call.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_history() {
        let gateway = MockGateway::new()
            .with_completion("I cannot help with that.")
            .with_failure(GatewayError::Timeout("read".into()));
        let service = service(gateway);

        assert!(service.ask(ask_request("q")).await.is_err());
        assert!(service.ask(ask_request("q")).await.is_err());
        assert!(service.history("plc-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_history_capped_per_mode() {
        let mut gateway = MockGateway::new();
        for _ in 0..6 {
            gateway = gateway.with_completion(REPLY);
        }
        let service = service(gateway);
        for i in 0..6 {
            service.ask(ask_request(&format!("q{i}"))).await.unwrap();
        }
        let history = service.history("plc-1").await;
        assert_eq!(history.len(), 8);
        assert_eq!(history[0].content, "q2");
    }

    #[tokio::test]
    async fn test_chat_trims_reply() {
        let service = service(MockGateway::new().with_completion("  hello \n"));
        let reply = service
            .chat(ChatRequest {
                prompt: "hi".into(),
                conversation_id: None,
            })
            .await
            .unwrap();
        assert_eq!(reply.reply, "hello");
        assert_eq!(service.history(ChatRequest::DEFAULT_CONVERSATION).await.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_without_content_records_nothing() {
        let gateway = MockGateway::new().with_stream(vec![StreamEvent::Error("refused".into())]);
        let service = service(gateway);
        let fragments: Vec<String> = service
            .clone()
            .chat_stream(ChatRequest {
                prompt: "hi".into(),
                conversation_id: Some("s".into()),
            })
            .collect()
            .await;
        assert_eq!(fragments, vec!["[error] refused".to_string()]);
        assert!(service.history("s").await.is_empty());
    }

    #[tokio::test]
    async fn test_config_snapshot_names_endpoint() {
        let service = service(MockGateway::new());
        let snapshot = service.config_snapshot().unwrap();
        assert_eq!(snapshot["endpoint"], "mock://llm/v1/chat/completions");
        assert_eq!(snapshot["retrieval_active"], false);
        assert_eq!(snapshot["llm"]["model"], service.config().llm.model.as_str());
    }
}
