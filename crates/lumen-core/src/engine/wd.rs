//! WD-style ONNX tagger.
//!
//! The model is loaded lazily behind a `OnceCell`: either at startup via
//! [`WdTagger::load`] or on the first request. A failed load is not cached,
//! so a later request retries it (for example once the network is back).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use tokio::sync::OnceCell;

use crate::config::ModelConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::Thresholds;

use super::download::{ensure_model_files, ModelFiles};
use super::labels::LabelSet;
use super::preprocess::preprocess;
use super::session::TaggerSession;
use super::{TaggerEngine, TaggerOutput};

/// A loaded session together with its vocabulary.
struct LoadedTagger {
    session: TaggerSession,
    labels: LabelSet,
}

/// Tagger backed by `model.onnx` + `selected_tags.csv` from a WD-style repo.
pub struct WdTagger {
    config: ModelConfig,
    files: ModelFiles,
    model_path: PathBuf,
    client: reqwest::Client,
    loaded: OnceCell<Arc<LoadedTagger>>,
}

impl WdTagger {
    /// Create an unloaded tagger whose files live in `repo_dir`.
    pub fn new(config: ModelConfig, repo_dir: &Path) -> Self {
        let files = ModelFiles::new(repo_dir);
        Self {
            model_path: files.model_path(),
            config,
            files,
            client: reqwest::Client::new(),
            loaded: OnceCell::new(),
        }
    }

    /// Load the model now, downloading missing files if allowed.
    pub async fn load(&self) -> EngineResult<()> {
        self.get_or_load().await.map(|_| ())
    }

    /// Whether the model has been loaded successfully.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    async fn get_or_load(&self) -> EngineResult<Arc<LoadedTagger>> {
        self.loaded
            .get_or_try_init(|| self.init())
            .await
            .map(Arc::clone)
    }

    async fn init(&self) -> EngineResult<Arc<LoadedTagger>> {
        ensure_model_files(&self.config, &self.files, &self.client).await?;

        let model_path = self.files.model_path();
        let labels_path = self.files.labels_path();
        tracing::info!("Loading tagger model from {:?}", model_path);

        let loaded = tokio::task::spawn_blocking(move || -> EngineResult<LoadedTagger> {
            let labels = LabelSet::load(&labels_path)?;
            let session = TaggerSession::load(&model_path)?;
            Ok(LoadedTagger { session, labels })
        })
        .await
        .map_err(|e| EngineError::Internal(format!("Model load task failed: {e}")))??;

        tracing::info!("Tagger model loaded ({} labels)", loaded.labels.len());
        Ok(Arc::new(loaded))
    }
}

#[async_trait]
impl TaggerEngine for WdTagger {
    fn model_path(&self) -> &Path {
        &self.model_path
    }

    async fn infer(
        &self,
        image: DynamicImage,
        thresholds: Thresholds,
    ) -> EngineResult<TaggerOutput> {
        let model = self.get_or_load().await?;
        let image_size = self.config.image_size;

        tokio::task::spawn_blocking(move || {
            let tensor = preprocess(&image, image_size)
                .ok_or_else(|| EngineError::Inference("Image has no pixels".to_string()))?;
            let probs = model.session.run(&tensor)?;
            if probs.len() != model.labels.len() {
                return Err(EngineError::Inference(format!(
                    "Model produced {} scores for {} labels",
                    probs.len(),
                    model.labels.len()
                )));
            }
            Ok(model.labels.select(&probs, &thresholds))
        })
        .await
        .map_err(|e| EngineError::Internal(format!("Inference task failed: {e}")))?
    }
}
