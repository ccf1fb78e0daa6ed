//! # edge_core
//!
//! Shared data model and configuration for the edge agent.
//!
//! The agent turns a natural-language request into a structured patch
//! against an industrial-controller configuration (HMI views, tags,
//! components). This crate holds the types every other crate agrees on:
//!
//! - **Turns**: role-tagged messages exchanged with the model
//! - **Response contract**: the `StructuredAgentResponse` returned to callers
//! - **Requests**: the bodies accepted by the HTTP surface
//! - **Configuration**: per-mode timeouts, token budgets and history caps

pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod turn;

pub use config::{
    AgentConfig, LlmSettings, ModeSettings, OperationMode, ReferenceSettings, RetrievalSettings,
};
pub use error::{ConfigError, ConfigResult};
pub use request::{AgentRequest, ChatReply, ChatRequest};
pub use response::{AgentStep, HmiPatch, ProposedChanges, StructuredAgentResponse, TagSet};
pub use turn::{ConversationTurn, Role};
