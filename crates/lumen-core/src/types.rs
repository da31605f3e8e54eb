//! Wire types for the labeling endpoint.
//!
//! These mirror the JSON contract: an [`InferenceRequest`] comes in, and a
//! [`ResponseEnvelope`] (or an [`ErrorBody`]) goes out.

use serde::{Deserialize, Serialize};

use crate::config::DefaultsConfig;

/// Value of `model.type` in every response.
pub const MODEL_TYPE_LABELS: &str = "labels";

/// Inbound labeling request.
///
/// Only `images[0]` is processed; the rest of the list is accepted and
/// ignored. Threshold fields left out (or sent as `null`) fall back to the
/// configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Opaque correlation id, echoed in the response
    pub id: String,

    /// Base64 image payloads, optionally data-URI prefixed
    pub images: Vec<String>,

    /// Caller credential
    #[serde(default)]
    pub token: Option<String>,

    /// Minimum confidence for general tags
    #[serde(default)]
    pub general_threshold: Option<f32>,

    /// Minimum confidence for character tags
    #[serde(default)]
    pub character_threshold: Option<f32>,

    /// Use the max-cut threshold for general tags instead of the fixed one
    #[serde(default)]
    pub general_mcut_enabled: Option<bool>,

    /// Use the max-cut threshold for character tags instead of the fixed one
    #[serde(default)]
    pub character_mcut_enabled: Option<bool>,
}

impl InferenceRequest {
    /// Build a request for a single image with every option defaulted.
    pub fn single(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            images: vec![image.into()],
            token: None,
            general_threshold: None,
            character_threshold: None,
            general_mcut_enabled: None,
            character_mcut_enabled: None,
        }
    }

    /// Resolve the engine thresholds for this request.
    pub fn thresholds(&self, defaults: &DefaultsConfig) -> Thresholds {
        Thresholds {
            general: self.general_threshold.unwrap_or(defaults.general_threshold),
            character: self
                .character_threshold
                .unwrap_or(defaults.character_threshold),
            general_mcut: self.general_mcut_enabled.unwrap_or(false),
            character_mcut: self.character_mcut_enabled.unwrap_or(false),
        }
    }
}

/// Tag selection settings handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub general: f32,
    pub character: f32,
    pub general_mcut: bool,
    pub character_mcut: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        InferenceRequest::single("", "").thresholds(&DefaultsConfig::default())
    }
}

/// Which engine mapping a tag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    General,
    Character,
}

impl TagSource {
    /// Rank class reported alongside each tag.
    pub fn priority(self) -> u8 {
        match self {
            TagSource::General => 0,
            TagSource::Character => 1,
        }
    }
}

/// One ranked label in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEntry {
    pub name: String,
    pub source: TagSource,
    /// Confidence as reported by the engine (not clamped)
    pub confidence: f32,
    /// 0 for general tags, 1 for character tags
    pub priority: u8,
}

impl TagEntry {
    /// Create an entry, deriving `priority` from `source`.
    pub fn new(name: impl Into<String>, source: TagSource, confidence: f32) -> Self {
        Self {
            name: name.into(),
            source,
            confidence,
            priority: source.priority(),
        }
    }
}

/// Static description of the model that produced a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl ModelDescriptor {
    /// A `labels` descriptor with the given model name.
    pub fn labels(name: impl Into<String>) -> Self {
        Self {
            kind: MODEL_TYPE_LABELS.to_string(),
            name: name.into(),
        }
    }
}

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelResult {
    pub labels: Vec<TagEntry>,
}

/// Successful response to a labeling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub code: u16,
    pub model: ModelDescriptor,
    pub result: LabelResult,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
