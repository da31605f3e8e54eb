//! Lumen Core - request pipeline for the Lumen image labeling service.
//!
//! Lumen takes a base64-encoded image and returns a ranked list of tags from
//! a WD-style tagger. This crate holds everything except the HTTP transport.
//!
//! # Architecture
//!
//! ```text
//! InferenceRequest → Payload → Image → TaggerEngine → Merge/Rank → ResponseEnvelope
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lumen_core::{Config, InferenceRequest, LabelService, WdTagger};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let tagger = Arc::new(WdTagger::new(config.model.clone(), &config.repo_dir()));
//!     let service = LabelService::from_config(tagger, &config);
//!
//!     let request = InferenceRequest::single("req-1", "data:image/png;base64,iVBORw0KG...");
//!     match service.label(request).await {
//!         Ok(envelope) => println!("{:?}", envelope.result.labels),
//!         Err(e) => eprintln!("{e}"),
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod payload;
pub mod pipeline;
pub mod service;
pub mod types;

// Re-exports for convenient access
pub use auth::{AllowAll, TokenVerifier};
pub use config::Config;
pub use engine::{TagScores, TaggerEngine, TaggerOutput, WdTagger};
pub use error::{
    ConfigError, EngineError, EngineResult, LabelError, PayloadError, PipelineError,
};
pub use merge::merge;
pub use payload::decode_payload;
pub use service::{LabelService, Stage};
pub use types::{
    ErrorBody, InferenceRequest, LabelResult, ModelDescriptor, ResponseEnvelope, TagEntry,
    TagSource, Thresholds,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
