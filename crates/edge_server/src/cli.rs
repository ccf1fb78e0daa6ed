//! Command-line flags of the `edge-agent` binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// edge-agent - natural-language HMI patches for the Duro controller
#[derive(Parser, Debug)]
#[command(name = "edge-agent")]
#[command(version, about = "Edge agent - natural-language HMI patches for the Duro controller")]
#[command(long_about = r#"
Serves the edge agent HTTP API in front of a local chat-completion model.

ROUTES:
  POST /agent/ask         → structured patch for a controller question
  POST /agent/build_view  → structured patch adding views, tags and components
  POST /chat              → free-form reply
  POST /chat/stream       → free-form reply as plain-text fragments
  GET  /health/llm        → probe the model endpoint
  GET  /debug/llm-config  → effective configuration

Settings come from the defaults, then --config, then the environment
(LLM_API_URL, LLM_MODEL_NAME, VIEW_MAX_TOKENS, RAG_ENABLED, ...).
"#)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "EDGE_AGENT_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}
