//! Static reference material, loaded once at startup.
//!
//! - controller documentation: every `*.txt` under the docs directory
//! - HMI layout description: sliced by heading for keyword fallback
//! - component reference: `COMPONENT:` blocks keyed by component name

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};

use edge_core::ReferenceSettings;

use crate::error::{ContextError, ContextResult};

/// Heading lines of the layout description, e.g. `Button Component` or `View Schema`.
pub const HEADING_PATTERN: &str = r"(?m)^[ \t]*[A-Z][A-Za-z \t]+(?:Component|Schema)\b.*$";

/// Longest section taken from the layout description.
pub const MAX_SECTION_CHARS: usize = 1000;

const COMPONENT_MARKER: &str = "COMPONENT:";

/// Layout description with its heading positions.
#[derive(Debug, Clone)]
pub struct LayoutDoc {
    path: PathBuf,
    text: String,
    headings: Vec<Range<usize>>,
}

impl LayoutDoc {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> ContextResult<Self> {
        let text = text.into();
        let pattern = Regex::new(HEADING_PATTERN)?;
        let headings = pattern.find_iter(&text).map(|m| m.range()).collect();
        Ok(Self {
            path: path.into(),
            text,
            headings,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Section under the first heading containing every keyword
    /// (case-insensitive), up to the next heading. Capped at
    /// [`MAX_SECTION_CHARS`].
    pub fn section(&self, keywords: &[&str]) -> Option<String> {
        if keywords.is_empty() {
            return None;
        }
        let index = self.headings.iter().position(|heading| {
            let line = self.text[heading.clone()].to_lowercase();
            keywords.iter().all(|k| line.contains(k))
        })?;
        let start = self.headings[index].start;
        let end = self
            .headings
            .get(index + 1)
            .map_or(self.text.len(), |next| next.start);
        let section = self.text[start..end].trim();
        Some(section.chars().take(MAX_SECTION_CHARS).collect())
    }
}

/// Everything the prompt composer and enricher read.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    controller_docs: Vec<String>,
    layout: Option<LayoutDoc>,
    component_snippets: BTreeMap<String, String>,
}

impl ReferenceLibrary {
    /// A library with nothing loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        controller_docs: Vec<String>,
        layout: Option<LayoutDoc>,
        component_snippets: BTreeMap<String, String>,
    ) -> Self {
        Self {
            controller_docs,
            layout,
            component_snippets,
        }
    }

    /// Load all reference files named by `settings`. Missing files leave
    /// their part empty.
    pub fn load(settings: &ReferenceSettings) -> ContextResult<Self> {
        let controller_docs = load_docs_dir(&settings.docs_dir)?;

        let layout = match read_optional(&settings.hmi_layout_doc)? {
            Some(text) => Some(LayoutDoc::new(&settings.hmi_layout_doc, text)?),
            None => None,
        };

        let component_snippets = read_optional(&settings.component_reference)?
            .map(|text| parse_component_snippets(&text))
            .unwrap_or_default();

        info!(
            docs = controller_docs.len(),
            layout = layout.is_some(),
            components = ?component_snippets.keys().collect::<Vec<_>>(),
            "Loaded reference library"
        );

        Ok(Self::new(controller_docs, layout, component_snippets))
    }

    pub fn controller_docs(&self) -> &[String] {
        &self.controller_docs
    }

    pub fn layout(&self) -> Option<&LayoutDoc> {
        self.layout.as_ref()
    }

    pub fn component_snippet(&self, name: &str) -> Option<&str> {
        self.component_snippets.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.component_snippets.keys().map(String::as_str)
    }
}

fn load_docs_dir(dir: &Path) -> ContextResult<Vec<String>> {
    let pattern = dir.join("*.txt");
    let mut paths: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable docs entry: {}", e);
                None
            }
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        warn!("No controller docs found in {:?}", dir);
    }

    paths
        .iter()
        .map(|path| {
            debug!("Loading controller doc {:?}", path);
            fs::read_to_string(path).map_err(|source| ContextError::Read {
                path: path.clone(),
                source,
            })
        })
        .collect()
}

fn read_optional(path: &Path) -> ContextResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Reference file not found: {:?}", path);
            Ok(None)
        }
        Err(source) => Err(ContextError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Split a component reference into named blocks.
///
/// A line starting with `COMPONENT:` opens a block named by the first word
/// after the marker, lower-cased. The block keeps its marker line and runs
/// until the next marker. Text before the first marker is ignored.
pub fn parse_component_snippets(text: &str) -> BTreeMap<String, String> {
    let mut snippets = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(COMPONENT_MARKER) {
            if let Some((name, block)) = current.take() {
                snippets.insert(name, block.join("\n").trim().to_string());
            }
            current = rest
                .split_whitespace()
                .next()
                .map(|name| (name.to_lowercase(), vec![line]));
        } else if let Some((_, block)) = current.as_mut() {
            block.push(line);
        }
    }
    if let Some((name, block)) = current {
        snippets.insert(name, block.join("\n").trim().to_string());
    }

    snippets
}
