//! Request and reply bodies accepted by the HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `/agent/ask` and `/agent/build_view`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub device_id: String,
    pub prompt: String,
    /// Current views, tags and controller configuration, passed through to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl AgentRequest {
    /// Conversation key: the caller's id, or the device id when absent.
    pub fn conversation_key(&self) -> String {
        self.conversation_id
            .clone()
            .unwrap_or_else(|| self.device_id.clone())
    }
}

/// Body of `/chat` and `/chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    pub const DEFAULT_CONVERSATION: &'static str = "default";

    pub fn conversation_key(&self) -> String {
        self.conversation_id
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_CONVERSATION.to_string())
    }
}

/// Reply of `/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_key_defaults_to_device() {
        let request: AgentRequest =
            serde_json::from_str(r#"{"device_id": "plc-7", "prompt": "hi"}"#).unwrap();
        assert_eq!(request.conversation_key(), "plc-7");
        assert!(request.context.is_none());

        let request = AgentRequest {
            conversation_id: Some("conv-1".to_string()),
            ..request
        };
        assert_eq!(request.conversation_key(), "conv-1");
    }

    #[test]
    fn test_chat_key_default() {
        let request: ChatRequest = serde_json::from_str(r#"{"prompt": "hello"}"#).unwrap();
        assert_eq!(request.conversation_key(), ChatRequest::DEFAULT_CONVERSATION);
    }
}
