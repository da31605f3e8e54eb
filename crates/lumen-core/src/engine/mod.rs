//! Tagger inference engines.
//!
//! [`TaggerEngine`] is the boundary between the request pipeline and the
//! model. The service holds one engine for the whole process, shared as an
//! `Arc<dyn TaggerEngine>`; implementations handle their own loading and
//! must be safe to call from concurrent requests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lumen_core::engine::{TaggerEngine, WdTagger};
//!
//! let config = Config::load()?;
//! let tagger = WdTagger::new(config.model.clone(), &config.repo_dir());
//! tagger.load().await?;
//! let output = tagger.infer(image, Thresholds::default()).await?;
//! ```

pub mod download;
pub mod labels;
pub(crate) mod preprocess;
pub(crate) mod session;
pub mod wd;

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::EngineResult;
use crate::types::Thresholds;

pub use wd::WdTagger;

/// Tag name to confidence pairs, in the order the engine reports them.
/// Names are unique within one mapping.
pub type TagScores = Vec<(String, f32)>;

/// Everything one inference produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggerOutput {
    /// Rating label scores (general, sensitive, questionable, explicit)
    pub ratings: TagScores,
    /// Every general label with its score, unfiltered
    pub general_raw: TagScores,
    /// Character tags that passed the character threshold
    pub character: TagScores,
    /// General tags that passed the general threshold
    pub general: TagScores,
}

/// An image tagging model.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the service needs `Arc<dyn TaggerEngine>`).
#[async_trait]
pub trait TaggerEngine: Send + Sync {
    /// Location of the model weights, for startup logging.
    fn model_path(&self) -> &Path;

    /// Tag one image.
    async fn infer(&self, image: DynamicImage, thresholds: Thresholds)
        -> EngineResult<TaggerOutput>;
}
