//! # edge_chat - Conversation Store and Model Gateway
//!
//! - [`ConversationStore`]: per-conversation bounded history, serialized per id
//! - [`ModelGateway`]: blocking and streamed chat completions, health probe
//! - [`HttpGateway`]: reqwest implementation for OpenAI-style endpoints,
//!   with SSE and plain-body stream handling
//! - [`MockGateway`]: scripted gateway for tests

pub mod error;
pub mod gateway;
pub mod health;
pub mod llm;
pub mod mock;
pub mod sse;
pub mod store;

pub use error::{GatewayError, GatewayErrorKind, GatewayResult};
pub use gateway::{
    single_event, CompletionOptions, FragmentStream, ModelGateway, StreamEvent, TIMEOUT_SENTINEL,
};
pub use health::{models_url, HealthReport, ProbeKind};
pub use llm::HttpGateway;
pub use mock::{CapturedCall, MockGateway};
pub use sse::SseDecoder;
pub use store::{ConversationStore, History, HistoryHandle};
