//! Health probe results for the completion endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which request answered the probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// `GET /v1/models`
    Models,
    /// A one-token completion request
    Completion,
}

/// Outcome of [`crate::ModelGateway::probe`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub ok: bool,
    pub probe: ProbeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub elapsed_sec: f64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn healthy(probe: ProbeKind, url: impl Into<String>, status: u16, elapsed_sec: f64) -> Self {
        Self {
            ok: true,
            probe,
            status: Some(status),
            elapsed_sec,
            url: url.into(),
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(
        probe: ProbeKind,
        url: impl Into<String>,
        status: Option<u16>,
        error: impl Into<String>,
        elapsed_sec: f64,
    ) -> Self {
        Self {
            ok: false,
            probe,
            status,
            elapsed_sec,
            url: url.into(),
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }
}

/// Model-listing URL on the same host as the completion URL.
///
/// `http://host:8080/v1/chat/completions?x=1` becomes `http://host:8080/v1/models`.
pub fn models_url(api_url: &str) -> Option<String> {
    let mut url = reqwest::Url::parse(api_url).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    url.set_path("/v1/models");
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}
