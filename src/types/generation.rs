//! Generation settings forwarded to providers.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Sampling settings controlling text generation.
///
/// ```
/// use colloquy::types::GenerationSettings;
///
/// let settings = GenerationSettings::builder().temperature(0.2).max_tokens(512).build();
/// assert_eq!(settings.max_tokens, Some(512));
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}
