//! Agent configuration.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then environment variables.
//!
//! ```yaml
//! llm:
//!   api_url: http://127.0.0.1:8080/v1/chat/completions
//!   model: mlx-community/Meta-Llama-3-8B-Instruct-4bit
//! build_view:
//!   history_cap: 5        # read timeout and max tokens keep the build_view defaults
//! rag:
//!   enabled: false
//! ```

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// The named operations the agent serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    Ask,
    BuildView,
    Chat,
    ChatStream,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::BuildView => "build_view",
            Self::Chat => "chat",
            Self::ChatStream => "chat_stream",
        }
    }

    /// Environment variable prefix for this mode's settings.
    fn env_prefix(&self) -> &'static str {
        match self {
            Self::Ask => "AGENT",
            Self::BuildView => "VIEW",
            Self::Chat => "CHAT",
            Self::ChatStream => "STREAM",
        }
    }

    /// Whether the model must answer with a JSON object.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Ask | Self::BuildView)
    }
}

/// Completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub api_url: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080/v1/chat/completions".to_string(),
            model: "mlx-community/Meta-Llama-3-8B-Instruct-4bit".to_string(),
            connect_timeout_secs: 10,
            temperature: 0.1,
        }
    }
}

impl LlmSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Per-operation limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeSettings {
    pub read_timeout_secs: u64,
    pub max_tokens: u32,
    /// Maximum number of stored turns for a conversation in this mode
    pub history_cap: usize,
}

impl ModeSettings {
    pub fn new(read_timeout_secs: u64, max_tokens: u32, history_cap: usize) -> Self {
        Self {
            read_timeout_secs,
            max_tokens,
            history_cap,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Vector-retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub collection: String,
    pub top_k: usize,
    /// Character budget for the formatted retrieval block
    pub max_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:8090".to_string(),
            collection: "durusai_docs".to_string(),
            top_k: 15,
            max_chars: 3500,
        }
    }
}

/// Locations of the static reference documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReferenceSettings {
    pub docs_dir: PathBuf,
    pub hmi_layout_doc: PathBuf,
    pub component_reference: PathBuf,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            hmi_layout_doc: PathBuf::from("ai_reference/hmi_config_layout_description.txt"),
            component_reference: PathBuf::from("ai_reference/hmi_components_reference.txt"),
        }
    }
}

/// A mode section as written in a config file. Absent fields keep the
/// defaults of that mode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ModeOverrides {
    read_timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
    history_cap: Option<usize>,
}

impl ModeOverrides {
    fn apply(self, base: &mut ModeSettings) {
        if let Some(secs) = self.read_timeout_secs {
            base.read_timeout_secs = secs;
        }
        if let Some(tokens) = self.max_tokens {
            base.max_tokens = tokens;
        }
        if let Some(cap) = self.history_cap {
            base.history_cap = cap;
        }
    }
}

/// Shape of the YAML file, overlaid onto [`AgentConfig::default`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentConfigFile {
    llm: LlmSettings,
    ask: ModeOverrides,
    build_view: ModeOverrides,
    chat: ModeOverrides,
    chat_stream: ModeOverrides,
    rag: RetrievalSettings,
    references: ReferenceSettings,
}

impl From<AgentConfigFile> for AgentConfig {
    fn from(file: AgentConfigFile) -> Self {
        let mut config = AgentConfig {
            llm: file.llm,
            rag: file.rag,
            references: file.references,
            ..AgentConfig::default()
        };
        file.ask.apply(&mut config.ask);
        file.build_view.apply(&mut config.build_view);
        file.chat.apply(&mut config.chat);
        file.chat_stream.apply(&mut config.chat_stream);
        config
    }
}

/// Full agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "AgentConfigFile")]
pub struct AgentConfig {
    pub llm: LlmSettings,
    pub ask: ModeSettings,
    pub build_view: ModeSettings,
    pub chat: ModeSettings,
    pub chat_stream: ModeSettings,
    pub rag: RetrievalSettings,
    pub references: ReferenceSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            ask: ModeSettings::new(240, 2048, 8),
            build_view: ModeSettings::new(300, 4096, 20),
            chat: ModeSettings::new(120, 1024, 30),
            chat_stream: ModeSettings::new(120, 1024, 40),
            rag: RetrievalSettings::default(),
            references: ReferenceSettings::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration: defaults, then the YAML file if given, then the
    /// process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        debug!("Loading config from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(yaml).map_err(ConfigError::from)
    }

    /// Override fields from environment-style variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LLM_API_URL") {
            self.llm.api_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(secs) = parse_var(&lookup, "LLM_CONNECT_TIMEOUT")? {
            self.llm.connect_timeout_secs = secs;
        }
        if let Some(temperature) = parse_var(&lookup, "LLM_TEMPERATURE")? {
            self.llm.temperature = temperature;
        }

        for mode in [
            OperationMode::Ask,
            OperationMode::BuildView,
            OperationMode::Chat,
            OperationMode::ChatStream,
        ] {
            let prefix = mode.env_prefix();
            let settings = self.mode_mut(mode);
            if let Some(secs) = parse_var(&lookup, &format!("{}_READ_TIMEOUT", prefix))? {
                settings.read_timeout_secs = secs;
            }
            if let Some(tokens) = parse_var(&lookup, &format!("{}_MAX_TOKENS", prefix))? {
                settings.max_tokens = tokens;
            }
            if let Some(cap) = parse_var(&lookup, &format!("{}_HISTORY_MAX", prefix))? {
                settings.history_cap = cap;
            }
        }

        if let Some(flag) = lookup("RAG_ENABLED") {
            self.rag.enabled = flag.trim() == "1";
        }
        if let Some(endpoint) = lookup("RAG_ENDPOINT") {
            self.rag.endpoint = endpoint;
        }
        if let Some(collection) = lookup("RAG_COLLECTION").or_else(|| lookup("QDRANT_COLLECTION")) {
            self.rag.collection = collection;
        }
        if let Some(top_k) = parse_var(&lookup, "RAG_TOP_K")? {
            self.rag.top_k = top_k;
        }
        if let Some(max_chars) = parse_var(&lookup, "RAG_MAX_CHARS")? {
            self.rag.max_chars = max_chars;
        }

        if let Some(dir) = lookup("DOCS_DIR") {
            self.references.docs_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("HMI_DOC_PATH") {
            self.references.hmi_layout_doc = PathBuf::from(path);
        }
        if let Some(path) = lookup("HMI_COMPONENTS_PATH") {
            self.references.component_reference = PathBuf::from(path);
        }

        Ok(())
    }

    /// Settings for one operation mode.
    pub fn mode(&self, mode: OperationMode) -> &ModeSettings {
        match mode {
            OperationMode::Ask => &self.ask,
            OperationMode::BuildView => &self.build_view,
            OperationMode::Chat => &self.chat,
            OperationMode::ChatStream => &self.chat_stream,
        }
    }

    fn mode_mut(&mut self, mode: OperationMode) -> &mut ModeSettings {
        match mode {
            OperationMode::Ask => &mut self.ask,
            OperationMode::BuildView => &mut self.build_view,
            OperationMode::Chat => &mut self.chat,
            OperationMode::ChatStream => &mut self.chat_stream,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                variable: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_mode_caps() {
        let config = AgentConfig::default();
        assert_eq!(config.mode(OperationMode::Ask).history_cap, 8);
        assert_eq!(config.mode(OperationMode::BuildView).history_cap, 20);
        assert_eq!(config.mode(OperationMode::Chat).history_cap, 30);
        assert_eq!(config.mode(OperationMode::ChatStream).history_cap, 40);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AgentConfig::default();
        config
            .apply_env(env(&[
                ("LLM_API_URL", "http://llm:9000/v1/chat/completions"),
                ("VIEW_MAX_TOKENS", "8192"),
                ("CHAT_HISTORY_MAX", "12"),
                ("RAG_ENABLED", "0"),
                ("QDRANT_COLLECTION", "legacy"),
            ]))
            .unwrap();

        assert_eq!(config.llm.api_url, "http://llm:9000/v1/chat/completions");
        assert_eq!(config.build_view.max_tokens, 8192);
        assert_eq!(config.chat.history_cap, 12);
        assert!(!config.rag.enabled);
        assert_eq!(config.rag.collection, "legacy");
    }

    #[test]
    fn test_rag_collection_prefers_primary_name() {
        let mut config = AgentConfig::default();
        config
            .apply_env(env(&[("RAG_COLLECTION", "primary"), ("QDRANT_COLLECTION", "legacy")]))
            .unwrap();
        assert_eq!(config.rag.collection, "primary");
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let mut config = AgentConfig::default();
        let err = config
            .apply_env(env(&[("AGENT_READ_TIMEOUT", "soon")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { variable, .. } => assert_eq!(variable, "AGENT_READ_TIMEOUT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_yaml_partial_file() {
        let config = AgentConfig::from_yaml_str(
            "llm:\n  model: tiny\nbuild_view:\n  history_cap: 5\n",
        )
        .unwrap();
        assert_eq!(config.llm.model, "tiny");
        assert_eq!(config.build_view.history_cap, 5);
        // Sibling fields keep the build_view defaults, not another mode's
        assert_eq!(config.build_view.read_timeout_secs, 300);
        assert_eq!(config.build_view.max_tokens, 4096);
        // Untouched sections keep their defaults
        assert_eq!(config.llm.connect_timeout_secs, 10);
        assert_eq!(config.rag.top_k, 15);
        assert_eq!(config.ask, AgentConfig::default().ask);
    }

    #[test]
    fn test_yaml_partial_mode_sections_keep_own_defaults() {
        let config = AgentConfig::from_yaml_str(
            "chat:\n  max_tokens: 512\nchat_stream:\n  read_timeout_secs: 60\nask: {}\n",
        )
        .unwrap();
        assert_eq!(config.chat, ModeSettings::new(120, 512, 30));
        assert_eq!(config.chat_stream, ModeSettings::new(60, 1024, 40));
        assert_eq!(config.ask, ModeSettings::new(240, 2048, 8));
        assert_eq!(config.build_view, ModeSettings::new(300, 4096, 20));
    }

    #[test]
    fn test_module_doc_example() {
        let config = AgentConfig::from_yaml_str(
            "llm:\n  api_url: http://127.0.0.1:8080/v1/chat/completions\n  model: mlx-community/Meta-Llama-3-8B-Instruct-4bit\n\
build_view:\n  history_cap: 5\n\
rag:\n  enabled: false\n",
        )
        .unwrap();
        assert_eq!(config.build_view, ModeSettings::new(300, 4096, 5));
        assert!(!config.rag.enabled);
    }

    #[test]
    fn test_serialized_config_reads_back() {
        let mut config = AgentConfig::default();
        config.chat.history_cap = 3;
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(AgentConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("agent.yaml");
        fs::write(&path, "rag:\n  max_chars: 100\n").unwrap();
        let config = AgentConfig::from_file(&path).unwrap();
        assert_eq!(config.rag.max_chars, 100);

        let missing = AgentConfig::from_file(&temp.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::NotFound(_))));
    }
}
