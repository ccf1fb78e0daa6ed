//! HTTP gateway for OpenAI-style chat-completion endpoints.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use edge_core::{ConversationTurn, LlmSettings};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{single_event, CompletionOptions, FragmentStream, ModelGateway, StreamEvent};
use crate::health::{models_url, HealthReport, ProbeKind};
use crate::sse::{envelope_content, SseDecoder};

/// Read timeout for health probe requests.
const PROBE_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    api_url: String,
    /// Model used by the completion fallback of the health probe
    probe_model: String,
    connect_timeout: Duration,
}

impl HttpGateway {
    pub fn new(
        api_url: impl Into<String>,
        probe_model: impl Into<String>,
        connect_timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            probe_model: probe_model.into(),
            connect_timeout,
        })
    }

    pub fn from_settings(settings: &LlmSettings) -> GatewayResult<Self> {
        Self::new(&settings.api_url, &settings.model, settings.connect_timeout())
    }

    fn request_body<'a>(
        messages: &'a [ConversationTurn],
        options: &'a CompletionOptions,
        stream: bool,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &options.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
            response_format: options
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        }
    }

    async fn probe_models(&self, url: &str, started: Instant) -> Option<HealthReport> {
        let response = self
            .client
            .get(url)
            .timeout(self.connect_timeout + PROBE_READ_TIMEOUT)
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => Some(HealthReport::healthy(
                ProbeKind::Models,
                url,
                response.status().as_u16(),
                started.elapsed().as_secs_f64(),
            )),
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Model listing unavailable");
                None
            }
            Err(e) => {
                debug!(error = %e, "Model listing request failed");
                None
            }
        }
    }

    async fn probe_completion(&self, started: Instant) -> HealthReport {
        let messages = [ConversationTurn::user("ping")];
        let request = ChatCompletionRequest {
            model: &self.probe_model,
            messages: &messages,
            temperature: 0.0,
            max_tokens: 1,
            stream: false,
            response_format: None,
        };
        let result = self
            .client
            .post(&self.api_url)
            .timeout(self.connect_timeout + PROBE_READ_TIMEOUT)
            .json(&request)
            .send()
            .await;
        let elapsed = || started.elapsed().as_secs_f64();
        match result {
            Ok(response) if response.status().is_success() => HealthReport::healthy(
                ProbeKind::Completion,
                &self.api_url,
                response.status().as_u16(),
                elapsed(),
            ),
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                let error = GatewayError::bad_status(status, &body).to_string();
                HealthReport::unhealthy(ProbeKind::Completion, &self.api_url, Some(status), error, elapsed())
            }
            Err(e) => HealthReport::unhealthy(
                ProbeKind::Completion,
                &self.api_url,
                None,
                GatewayError::from(e).to_string(),
                elapsed(),
            ),
        }
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn complete(
        &self,
        messages: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> GatewayResult<String> {
        let started = Instant::now();
        let request = Self::request_body(messages, options, false);
        debug!(url = %self.api_url, model = %options.model, messages = messages.len(), "Calling LLM");

        let response = self
            .client
            .post(&self.api_url)
            .timeout(options.total_timeout())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "LLM call failed");
                GatewayError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "LLM returned an error status");
            return Err(GatewayError::bad_status(status.as_u16(), &body));
        }

        let envelope: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::MalformedEnvelope(format!("invalid JSON body: {e}")))?;
        let content = envelope
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::MalformedEnvelope("missing choices[0].message.content".to_string())
            })?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = content.len(),
            "LLM call completed"
        );
        Ok(content.to_string())
    }

    async fn stream(
        &self,
        messages: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> FragmentStream {
        let request = Self::request_body(messages, options, true);
        debug!(url = %self.api_url, model = %options.model, "Opening LLM stream");

        let send = self.client.post(&self.api_url).json(&request).send();
        let response = match tokio::time::timeout(options.total_timeout(), send).await {
            Err(_) => return single_event(StreamEvent::Timeout),
            Ok(Err(e)) if e.is_timeout() => return single_event(StreamEvent::Timeout),
            Ok(Err(e)) => return single_event(StreamEvent::Error(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let body = match tokio::time::timeout(options.read_timeout, response.text()).await {
                Ok(Ok(body)) => body,
                _ => String::new(),
            };
            let error = GatewayError::bad_status(status.as_u16(), &body);
            return single_event(StreamEvent::Error(error.to_string()));
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));

        if is_sse {
            sse_events(response, options.read_timeout)
        } else {
            debug!("LLM answered a stream request with a plain body");
            whole_body_events(response, options.read_timeout)
        }
    }

    async fn probe(&self) -> HealthReport {
        let started = Instant::now();
        if let Some(url) = models_url(&self.api_url) {
            if let Some(report) = self.probe_models(&url, started).await {
                return report;
            }
        }
        self.probe_completion(started).await
    }

    fn endpoint(&self) -> &str {
        &self.api_url
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
    read_timeout: Duration,
}

/// Events from an SSE body. Each chunk must arrive within `read_timeout`.
fn sse_events(response: reqwest::Response, read_timeout: Duration) -> FragmentStream {
    let state = SseState {
        body: response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        read_timeout,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }
            match tokio::time::timeout(state.read_timeout, state.body.next()).await {
                Err(_) => {
                    warn!("LLM stream read timed out");
                    state.finished = true;
                    state.pending.push_back(StreamEvent::Timeout);
                }
                Ok(None) => {
                    state.finished = true;
                    let tail = state.decoder.finish();
                    state.pending.extend(tail);
                }
                Ok(Some(Err(e))) => {
                    state.finished = true;
                    state.pending.push_back(if e.is_timeout() {
                        StreamEvent::Timeout
                    } else {
                        StreamEvent::Error(e.to_string())
                    });
                }
                Ok(Some(Ok(chunk))) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                    if state.decoder.is_done() {
                        state.finished = true;
                    }
                }
            }
        }
    })
    .boxed()
}

/// Single event from a non-SSE body: the envelope content if there is one,
/// the raw text otherwise.
fn whole_body_events(response: reqwest::Response, read_timeout: Duration) -> FragmentStream {
    stream::once(async move {
        match tokio::time::timeout(read_timeout, response.text()).await {
            Err(_) => Some(StreamEvent::Timeout),
            Ok(Err(e)) if e.is_timeout() => Some(StreamEvent::Timeout),
            Ok(Err(e)) => Some(StreamEvent::Error(e.to_string())),
            Ok(Ok(body)) => {
                let text = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|envelope| envelope_content(&envelope).map(str::to_string))
                    .unwrap_or(body);
                (!text.is_empty()).then_some(StreamEvent::Content(text))
            }
        }
    })
    .filter_map(|event| async move { event })
    .boxed()
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{AgentConfig, OperationMode};
    use serde_json::json;

    #[test]
    fn test_request_body_structured() {
        let config = AgentConfig::default();
        let options = CompletionOptions::for_mode(&config, OperationMode::Ask);
        let messages = vec![
            ConversationTurn::system("sys"),
            ConversationTurn::user("hello"),
        ];
        let body = serde_json::to_value(HttpGateway::request_body(&messages, &options, false)).unwrap();
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "sys"}));
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        assert_eq!(body["max_tokens"], 2048);
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_request_body_stream() {
        let config = AgentConfig::default();
        let options = CompletionOptions::for_mode(&config, OperationMode::ChatStream);
        let body = serde_json::to_value(HttpGateway::request_body(&[], &options, true)).unwrap();
        assert_eq!(body["stream"], true);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_from_settings() {
        let config = AgentConfig::default();
        let gateway = HttpGateway::from_settings(&config.llm).unwrap();
        assert_eq!(gateway.endpoint(), config.llm.api_url);
    }
}
