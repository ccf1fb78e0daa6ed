//! Context Enricher.
//!
//! Supplementary text for a user request from two independent sources:
//! passages from the retrieval service, and keyword-triggered sections of
//! the HMI layout description. A third helper picks component-shape
//! snippets for view building.

use std::sync::Arc;

use tracing::{debug, warn};

use edge_core::{AgentConfig, RetrievalSettings};

use crate::error::{ContextResult, RetrievalResult};
use crate::references::ReferenceLibrary;
use crate::retriever::{HttpRetriever, RetrievedPassage, Retriever};

/// Most component snippets added to one prompt.
pub const MAX_SNIPPETS: usize = 3;

/// Prompt keywords and the component snippet they select.
const SNIPPET_ROUTES: &[(&[&str], &str)] = &[
    (&["button"], "button"),
    (&["label", "text"], "label"),
    (&["numeric", "number input", "keypad"], "numericinput"),
    (&["keyboard"], "keyboard"),
    (&["nested", "embedded view", "subview"], "nested"),
];

/// Layout sections injected when the request mentions a keyword.
struct FallbackRule {
    trigger: &'static str,
    /// Heading keywords tried first, then the trigger alone
    heading: &'static [&'static str],
    title: &'static str,
}

const FALLBACK_RULES: &[FallbackRule] = &[
    FallbackRule {
        trigger: "view",
        heading: &["view", "schema"],
        title: "View Schema",
    },
    FallbackRule {
        trigger: "label",
        heading: &["label", "component"],
        title: "Label Component",
    },
    FallbackRule {
        trigger: "button",
        heading: &["button", "component"],
        title: "Button Component",
    },
];

/// Attributed block of retrieved passages within `max_chars` characters.
///
/// Passages are added best first; the first one that does not fit is cut
/// to the remaining budget and nothing after it is considered.
pub fn format_passages(passages: &[RetrievedPassage], max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut total = 0;

    for (i, passage) in passages.iter().enumerate() {
        let header = match passage.score {
            Some(score) => format!("[Source {}] score={:.3} path={}", i + 1, score, passage.source_path()),
            None => format!("[Source {}] path={}", i + 1, passage.source_path()),
        };
        let block = format!("{}\n{}\n", header, passage.text.trim());
        let len = block.chars().count();

        if total + len > max_chars {
            let remaining = max_chars.saturating_sub(total);
            if remaining > 0 {
                parts.push(block.chars().take(remaining).collect());
            }
            break;
        }
        parts.push(block);
        total += len;
    }

    parts.join("\n---\n").trim().to_string()
}

/// Enricher over the loaded reference library and an optional retriever.
#[derive(Clone)]
pub struct ContextEnricher {
    library: Arc<ReferenceLibrary>,
    retriever: Option<Arc<dyn Retriever>>,
    top_k: usize,
    max_chars: usize,
}

impl ContextEnricher {
    /// Enricher without vector retrieval.
    pub fn new(library: Arc<ReferenceLibrary>, settings: &RetrievalSettings) -> Self {
        Self {
            library,
            retriever: None,
            top_k: settings.top_k,
            max_chars: settings.max_chars,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Enricher as configured: the HTTP retriever is attached when retrieval is enabled.
    pub fn from_config(config: &AgentConfig, library: Arc<ReferenceLibrary>) -> ContextResult<Self> {
        let enricher = Self::new(library, &config.rag);
        if !config.rag.enabled {
            debug!("Vector retrieval disabled");
            return Ok(enricher);
        }
        let retriever = HttpRetriever::from_settings(&config.rag)?;
        Ok(enricher.with_retriever(Arc::new(retriever)))
    }

    pub fn retrieval_enabled(&self) -> bool {
        self.retriever.is_some()
    }

    /// Formatted retrieval results for `query`; empty without a retriever.
    pub async fn retrieval_context(&self, query: &str) -> RetrievalResult<String> {
        let Some(retriever) = &self.retriever else {
            return Ok(String::new());
        };
        let passages = retriever.retrieve(query, self.top_k).await?;
        Ok(format_passages(&passages, self.max_chars))
    }

    /// Layout sections for the HMI keywords found in `query`.
    pub fn keyword_fallback(&self, query: &str) -> String {
        let Some(layout) = self.library.layout() else {
            return String::new();
        };
        let query = query.to_lowercase();

        let parts: Vec<String> = FALLBACK_RULES
            .iter()
            .filter(|rule| query.contains(rule.trigger))
            .filter_map(|rule| {
                layout
                    .section(rule.heading)
                    .or_else(|| layout.section(&[rule.trigger]))
                    .map(|section| format!("[Fallback] {}\n{}", rule.title, section))
            })
            .collect();

        if parts.is_empty() {
            return String::new();
        }
        format!(
            "[Source fallback] path={}\n{}",
            layout.path().display(),
            parts.join("\n---\n")
        )
    }

    /// Retrieved passages plus keyword fallback. Retrieval failures are
    /// logged and leave only the fallback.
    pub async fn enrich(&self, text: &str) -> String {
        let retrieved = match self.retrieval_context(text).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                warn!(error = %e, "Retrieval failed, continuing without retrieved context");
                String::new()
            }
        };
        let fallback = self.keyword_fallback(text);

        [retrieved, fallback]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Component snippets matching keywords in `prompt`, at most
    /// [`MAX_SNIPPETS`], separated by blank lines.
    pub fn component_reference(&self, prompt: &str) -> String {
        let prompt = prompt.to_lowercase();
        let mut chosen: Vec<&str> = Vec::new();

        for (keywords, name) in SNIPPET_ROUTES {
            if !keywords.iter().any(|k| prompt.contains(k)) {
                continue;
            }
            if let Some(snippet) = self.library.component_snippet(name) {
                if !chosen.contains(&snippet) {
                    chosen.push(snippet);
                }
            }
        }

        chosen.truncate(MAX_SNIPPETS);
        chosen.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetrievalError;
    use crate::references::{parse_component_snippets, LayoutDoc};
    use crate::retriever::MockRetriever;

    const LAYOUT: &str = "HMI layout\n\
View Schema\nViews hold components.\n\
Label Component\nLabels show text.\n\
Button Component\nButtons write tags.\n";

    const COMPONENTS: &str = "COMPONENT: button\nB\n\
COMPONENT: label\nL\n\
COMPONENT: numericInput\nN\n\
COMPONENT: keyboard\nK\n\
COMPONENT: nested\nV\n";

    fn library() -> Arc<ReferenceLibrary> {
        Arc::new(ReferenceLibrary::new(
            Vec::new(),
            Some(LayoutDoc::new("ai_reference/layout.txt", LAYOUT).unwrap()),
            parse_component_snippets(COMPONENTS),
        ))
    }

    fn settings(max_chars: usize) -> RetrievalSettings {
        RetrievalSettings {
            max_chars,
            top_k: 2,
            ..RetrievalSettings::default()
        }
    }

    #[test]
    fn test_format_passages() {
        let passages = vec![
            RetrievedPassage::new("  first passage \n", Some(0.91234), Some("docs/a.txt")),
            RetrievedPassage::new("second", None, None),
        ];
        assert_eq!(
            format_passages(&passages, 1000),
            "[Source 1] score=0.912 path=docs/a.txt\nfirst passage\n\n---\n[Source 2] path=unknown\nsecond"
        );
    }

    #[test]
    fn test_format_passages_budget_truncates_and_stops() {
        let passages = vec![
            RetrievedPassage::new("aaaa", None, Some("p")),
            RetrievedPassage::new("bbbbbbbbbbbbbbbbbbbb", None, Some("p")),
            RetrievedPassage::new("c", None, Some("p")),
        ];
        // first block is "[Source 1] path=p\naaaa\n" = 23 chars
        let out = format_passages(&passages, 30);
        assert_eq!(out, "[Source 1] path=p\naaaa\n\n---\n[Source");
        assert!(!out.contains("[Source 3]"));
        assert_eq!(format_passages(&passages, 0), "");
    }

    #[test]
    fn test_format_passages_counts_chars() {
        let passages = vec![RetrievedPassage::new("ééééé", None, Some("p"))];
        let out = format_passages(&passages, 20);
        assert_eq!(out.chars().count(), 20);
    }

    #[test]
    fn test_keyword_fallback() {
        let enricher = ContextEnricher::new(library(), &settings(100));
        let out = enricher.keyword_fallback("Add a Button and a label to the main view");
        assert!(out.starts_with("[Source fallback] path=ai_reference/layout.txt\n"));
        let view = out.find("[Fallback] View Schema\nView Schema").unwrap();
        let label = out.find("[Fallback] Label Component\nLabel Component").unwrap();
        let button = out.find("[Fallback] Button Component\nButton Component").unwrap();
        assert!(view < label && label < button);
        assert_eq!(out.matches("\n---\n").count(), 2);

        assert_eq!(enricher.keyword_fallback("set the pump speed"), "");
    }

    #[test]
    fn test_component_reference_routing() {
        let enricher = ContextEnricher::new(library(), &settings(100));
        assert_eq!(enricher.component_reference("a BUTTON with text"), "COMPONENT: button\nB\n\nCOMPONENT: label\nL");
        assert_eq!(
            enricher.component_reference("button, label, keypad, keyboard and a subview"),
            "COMPONENT: button\nB\n\nCOMPONENT: label\nL\n\nCOMPONENT: numericInput\nN"
        );
        assert_eq!(enricher.component_reference("change the alarm limits"), "");
    }

    #[tokio::test]
    async fn test_enrich_combines_sources() {
        let mut retriever = MockRetriever::new();
        retriever.expect_retrieve().times(1).returning(|_, top_k| {
            assert_eq!(top_k, 2);
            Ok(vec![RetrievedPassage::new("retrieved", Some(0.5), Some("docs/x.txt"))])
        });
        let enricher = ContextEnricher::new(library(), &settings(1000)).with_retriever(Arc::new(retriever));

        let out = enricher.enrich("new view").await;
        assert!(out.starts_with("[Source 1] score=0.500 path=docs/x.txt\nretrieved"));
        assert!(out.contains("\n\n[Source fallback]"));
    }

    #[tokio::test]
    async fn test_enrich_retrieval_failure_degrades() {
        let mut retriever = MockRetriever::new();
        retriever
            .expect_retrieve()
            .returning(|_, _| Err(RetrievalError::Decode("bad body".into())));
        let enricher = ContextEnricher::new(library(), &settings(1000)).with_retriever(Arc::new(retriever));

        assert!(enricher.retrieval_context("x").await.is_err());
        assert_eq!(enricher.enrich("pump speed").await, "");
        assert!(enricher.enrich("a label").await.starts_with("[Source fallback]"));
    }

    #[tokio::test]
    async fn test_no_retriever() {
        let enricher = ContextEnricher::new(Arc::new(ReferenceLibrary::empty()), &settings(1000));
        assert!(!enricher.retrieval_enabled());
        assert_eq!(enricher.enrich("a button on a view").await, "");
    }
}
