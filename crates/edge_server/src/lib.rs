//! # edge_server - HTTP front end
//!
//! | Route | Operation |
//! |---|---|
//! | `POST /agent/ask` | [`AgentService::ask`] |
//! | `POST /agent/build_view` | [`AgentService::build_view`] |
//! | `POST /chat` | [`AgentService::chat`] |
//! | `POST /chat/stream` | [`AgentService::chat_stream`] |
//! | `GET /health/llm` | [`AgentService::health`] |
//! | `GET /debug/llm-config` | [`AgentService::config_snapshot`] |

pub mod error;
pub mod routes;
pub mod service;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use routes::router;
pub use service::{AgentService, TextStream};
