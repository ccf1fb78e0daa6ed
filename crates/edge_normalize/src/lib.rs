//! # edge_normalize - Response Normalizer
//!
//! Turns free-text model output into a [`StructuredAgentResponse`] or a
//! classified [`NormalizeError`].
//!
//! ## Pipeline
//!
//! ```text
//! raw text
//!   │ strip control tokens
//!   ▼
//! first '{' .. last '}' ──────────────▶ NoJsonObjectFound
//!   │ parse ──fail──▶ repair + parse ──▶ UnrepairableJson
//!   ▼
//! unwrap array / check object ───────▶ ListWithoutObject | TopLevelNotObject
//!   │ defaults (+ key migration in view mode)
//!   ▼
//! contract validation ───────────────▶ ContractViolation
//!   │
//!   ▼
//! StructuredAgentResponse
//! ```

pub mod error;
pub mod repair;
pub mod sanitize;

mod contract;
mod shape;

pub use error::{NormalizeError, NormalizeResult};
pub use repair::repair_json;
pub use sanitize::{extract_json_candidate, strip_control_tokens, CONTROL_TOKENS};

use serde_json::Value;
use tracing::{debug, info};

use edge_core::StructuredAgentResponse;

/// Which contract shape the reply is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// `/agent/ask`: structured patch, no key migration
    Structured,
    /// `/agent/build_view`: key migration and collection defaults
    ViewBuilding,
}

/// A normalized reply and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub response: StructuredAgentResponse,
    /// The JSON only parsed after the repair pass
    pub repaired: bool,
}

/// Stateless normalizer for one contract mode.
#[derive(Debug, Clone, Copy)]
pub struct ResponseNormalizer {
    mode: NormalizeMode,
}

impl ResponseNormalizer {
    pub fn new(mode: NormalizeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> NormalizeMode {
        self.mode
    }

    /// Run the whole pipeline over raw model output.
    pub fn normalize(&self, raw: &str) -> NormalizeResult<Normalized> {
        let result = self.run(raw);
        match &result {
            Ok(normalized) if normalized.repaired => {
                info!(mode = ?self.mode, repaired = true, "Model reply required JSON repair");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(mode = ?self.mode, stage = e.stage(), raw = %raw, "Normalization failed");
            }
        }
        result
    }

    fn run(&self, raw: &str) -> NormalizeResult<Normalized> {
        let stripped = strip_control_tokens(raw);
        let candidate = extract_json_candidate(&stripped)?;
        let (value, repaired) = parse_candidate(candidate)?;

        let mut reply = shape::unwrap_top_level(value)?;
        shape::apply_defaults(&mut reply);
        if self.mode == NormalizeMode::ViewBuilding {
            shape::migrate_view_keys(&mut reply);
        }

        let response = contract::validate(reply)?;
        Ok(Normalized { response, repaired })
    }
}

fn parse_candidate(candidate: &str) -> NormalizeResult<(Value, bool)> {
    match serde_json::from_str(candidate) {
        Ok(value) => Ok((value, false)),
        Err(first) => {
            debug!(error = %first, "Initial parse failed, attempting repair");
            let fixed = repair_json(candidate);
            serde_json::from_str(&fixed)
                .map(|value| (value, true))
                .map_err(|e| NormalizeError::UnrepairableJson {
                    reason: e.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_reply_not_repaired() {
        let normalizer = ResponseNormalizer::new(NormalizeMode::Structured);
        let out = normalizer
            .normalize(r#"{"message": "ok", "steps": [], "proposed_changes": {"hmi": {}}}"#)
            .unwrap();
        assert!(!out.repaired);
        assert_eq!(out.response.message, "ok");
    }

    #[test]
    fn test_repaired_flag() {
        let normalizer = ResponseNormalizer::new(NormalizeMode::Structured);
        let out = normalizer.normalize(r#"{"message": "ok", "steps": [],}"#).unwrap();
        assert!(out.repaired);
    }

    #[test]
    fn test_stage_of_failure() {
        let normalizer = ResponseNormalizer::new(NormalizeMode::Structured);
        let err = normalizer.normalize("I cannot help with that.").unwrap_err();
        assert_eq!(err.stage(), "no_json_object");
    }
}
