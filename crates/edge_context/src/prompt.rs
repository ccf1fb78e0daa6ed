//! Prompt Composer.
//!
//! System prompts are built once from the reference library and shared
//! read-only by every request.

use serde_json::{json, Map, Value};

use edge_core::{ConversationTurn, OperationMode};

use crate::references::ReferenceLibrary;
use crate::schema::HMI_SCHEMA_DOC;

/// Banner placed above the controller documentation.
pub const DOCS_BANNER: &str = "=== CONTROLLER DOCS ===";

const STRUCTURED_INSTRUCTIONS: &str = r#"You are an assistant for the Duro industrial controller.

Answer with one JSON object and nothing else, in this shape:
{
  "message": string,
  "steps": [ { "title": string, "details": string } ],
  "proposed_changes": {
    "hmi": { "views": [ ... ], "general": { ... } },
    "tags_to_add": { "<tagName>": { ... } }
  }
}

Rules:
- No prose, no markdown fences, only the JSON object.
- Base every answer on the controller documentation below. If it does not
  cover the question, say so in "message" and propose no changes.
"#;

const VIEW_INSTRUCTIONS: &str = r#"You edit HMI views and tags for the Duro controller.

The user message is a JSON object with "user_request" and "device_context".
device_context may hold:
- controller_config: the current configuration; treat its ids and names as authoritative
- relevant_docs: documentation excerpts for this request
- component_reference: exact shapes of the component types involved

Answer with a single JSON object (never an array) and nothing else:
{
  "message": string,
  "steps": [ { "title": string, "details": string } ],
  "proposed_changes": {
    "hmi": { "views": [ ... ], "general": { "viewsTree": [ ... ] } },
    "tags_to_add": { "<tagName>": { ... } },
    "component_to_add": [ ... ]
  }
}

Guidelines:
- Keep the patch minimal: include only views, tags and components that change.
- Use only fields from the schema or the component reference.
- Leave out sections you do not need, or give them as empty objects.
- When unsure, make the smaller change and explain it in "message".
"#;

const CHAT_INSTRUCTIONS: &str = "You are a helpful assistant for the Duro industrial controller \
and its HMI editor. Answer in concise plain text.";

/// Which instructions a request gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    /// Structured patch answering a controller question
    StructuredPatch,
    /// Structured patch adding views, tags and components
    ViewBuilding,
    /// Free-form conversation
    Chat,
}

impl From<OperationMode> for TaskMode {
    fn from(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Ask => Self::StructuredPatch,
            OperationMode::BuildView => Self::ViewBuilding,
            OperationMode::Chat | OperationMode::ChatStream => Self::Chat,
        }
    }
}

/// Precomputed system prompts.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    structured: String,
    view: String,
    chat: String,
}

impl PromptComposer {
    pub fn new(library: &ReferenceLibrary) -> Self {
        let mut structured = STRUCTURED_INSTRUCTIONS.to_string();
        if !library.controller_docs().is_empty() {
            structured.push_str("\n\n");
            structured.push_str(DOCS_BANNER);
            structured.push_str("\n\n");
            structured.push_str(&library.controller_docs().join("\n\n---\n\n"));
        }

        let view = format!("{VIEW_INSTRUCTIONS}\nSchema:\n{HMI_SCHEMA_DOC}");

        Self {
            structured,
            view,
            chat: CHAT_INSTRUCTIONS.to_string(),
        }
    }

    pub fn system_prompt(&self, mode: TaskMode) -> &str {
        match mode {
            TaskMode::StructuredPatch => &self.structured,
            TaskMode::ViewBuilding => &self.view,
            TaskMode::Chat => &self.chat,
        }
    }

    /// System turn, prior history, then the new user turn.
    pub fn messages(
        &self,
        mode: TaskMode,
        history: &[ConversationTurn],
        user_content: impl Into<String>,
    ) -> Vec<ConversationTurn> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ConversationTurn::system(self.system_prompt(mode)));
        messages.extend(history.iter().cloned());
        messages.push(ConversationTurn::user(user_content));
        messages
    }
}

/// Pretty-printed `{"user_request", "device_context"}` envelope.
pub fn build_user_prompt(prompt: &str, context: &Map<String, Value>) -> String {
    let payload = json!({
        "user_request": prompt,
        "device_context": context,
    });
    format!("{payload:#}")
}

/// Add enrichment to a view-building context. Keys the caller already set
/// are left alone, empty texts are skipped.
pub fn add_view_context(
    context: &mut Map<String, Value>,
    relevant_docs: String,
    component_reference: String,
) {
    for (key, text) in [
        ("relevant_docs", relevant_docs),
        ("component_reference", component_reference),
    ] {
        if !text.is_empty() && !context.contains_key(key) {
            context.insert(key.to_string(), Value::String(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::Role;

    fn library_with_docs() -> ReferenceLibrary {
        ReferenceLibrary::new(
            vec!["Doc one".to_string(), "Doc two".to_string()],
            None,
            Default::default(),
        )
    }

    #[test]
    fn test_structured_prompt_embeds_docs() {
        let composer = PromptComposer::new(&library_with_docs());
        let prompt = composer.system_prompt(TaskMode::StructuredPatch);
        assert!(prompt.contains("=== CONTROLLER DOCS ===\n\nDoc one\n\n---\n\nDoc two"));
        assert!(!composer.system_prompt(TaskMode::Chat).contains(DOCS_BANNER));
    }

    #[test]
    fn test_view_prompt_embeds_schema() {
        let composer = PromptComposer::new(&ReferenceLibrary::empty());
        let prompt = composer.system_prompt(TaskMode::ViewBuilding);
        assert!(prompt.contains("\"viewsTree\""));
        assert!(prompt.contains("component_reference"));
    }

    #[test]
    fn test_user_prompt_envelope() {
        let mut context = Map::new();
        context.insert("controller_config".into(), json!({"hmi": {}}));
        let text = build_user_prompt("add a button", &context);
        assert!(text.contains('\n'));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"user_request": "add a button", "device_context": {"controller_config": {"hmi": {}}}})
        );
    }

    #[test]
    fn test_add_view_context_keeps_caller_keys() {
        let mut context = Map::new();
        context.insert("relevant_docs".into(), json!("mine"));
        add_view_context(&mut context, "retrieved".into(), "COMPONENT: button".into());
        assert_eq!(context["relevant_docs"], json!("mine"));
        assert_eq!(context["component_reference"], json!("COMPONENT: button"));

        let mut empty = Map::new();
        add_view_context(&mut empty, String::new(), String::new());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_messages_order() {
        let composer = PromptComposer::new(&ReferenceLibrary::empty());
        let history = vec![ConversationTurn::user("q1"), ConversationTurn::assistant("a1")];
        let messages = composer.messages(TaskMode::Chat, &history, "q2");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[3].content, "q2");
    }

    #[test]
    fn test_task_mode_from_operation() {
        assert_eq!(TaskMode::from(OperationMode::BuildView), TaskMode::ViewBuilding);
        assert_eq!(TaskMode::from(OperationMode::ChatStream), TaskMode::Chat);
    }
}
