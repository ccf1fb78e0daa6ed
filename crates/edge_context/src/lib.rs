//! # edge_context - Prompt Composer and Context Enricher
//!
//! Everything the agent tells the model besides the user's own words:
//!
//! - [`ReferenceLibrary`]: controller docs, HMI layout description and
//!   component snippets, loaded once at startup
//! - [`PromptComposer`]: system prompts per task mode and message assembly
//! - [`ContextEnricher`]: retrieved passages, keyword fallback sections and
//!   component references for view building
//! - [`Retriever`]: seam over the vector retrieval service

pub mod enricher;
pub mod error;
pub mod prompt;
pub mod references;
pub mod retriever;
pub mod schema;

pub use enricher::{format_passages, ContextEnricher, MAX_SNIPPETS};
pub use error::{ContextError, ContextResult, RetrievalError, RetrievalResult};
pub use prompt::{add_view_context, build_user_prompt, PromptComposer, TaskMode, DOCS_BANNER};
pub use references::{parse_component_snippets, LayoutDoc, ReferenceLibrary};
pub use retriever::{HttpRetriever, RetrievedPassage, Retriever};
pub use schema::HMI_SCHEMA_DOC;
