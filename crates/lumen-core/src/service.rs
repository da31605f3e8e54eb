//! Request orchestration - wires the labeling stages together.
//!
//! ```text
//! Received → Validated → Decoded → Loaded → Inferred → Merged → Responded
//! ```
//!
//! Any stage can fail; the error is folded into one [`LabelError`] kind and
//! logged with the last stage that completed.

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;

use crate::auth::{AllowAll, TokenVerifier};
use crate::config::{Config, DefaultsConfig, LimitsConfig};
use crate::engine::TaggerEngine;
use crate::error::LabelError;
use crate::merge::merge;
use crate::payload::decode_payload;
use crate::pipeline::decode::{format_to_string, ImageLoader};
use crate::types::{InferenceRequest, LabelResult, ModelDescriptor, ResponseEnvelope};

/// Status code reported in successful envelopes.
pub const CODE_OK: u16 = 200;

/// Progress of a request through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Decoded,
    Loaded,
    Inferred,
    Merged,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Decoded => "decoded",
            Stage::Loaded => "loaded",
            Stage::Inferred => "inferred",
            Stage::Merged => "merged",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Labels images with a shared tagger engine.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct LabelService {
    engine: Arc<dyn TaggerEngine>,
    verifier: Arc<dyn TokenVerifier>,
    model_name: String,
    defaults: DefaultsConfig,
    loader: ImageLoader,
}

impl LabelService {
    /// Create a service that accepts every caller and uses stock thresholds.
    pub fn new(engine: Arc<dyn TaggerEngine>, model_name: impl Into<String>) -> Self {
        Self {
            engine,
            verifier: Arc::new(AllowAll),
            model_name: model_name.into(),
            defaults: DefaultsConfig::default(),
            loader: ImageLoader::default(),
        }
    }

    /// Create a service using the model name, thresholds and limits from `config`.
    pub fn from_config(engine: Arc<dyn TaggerEngine>, config: &Config) -> Self {
        Self::new(engine, config.model.name.clone())
            .with_defaults(config.defaults.clone())
            .with_limits(&config.limits)
    }

    /// Replace the token verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replace the thresholds used when a request omits them.
    pub fn with_defaults(mut self, defaults: DefaultsConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replace the input limits.
    pub fn with_limits(mut self, limits: &LimitsConfig) -> Self {
        self.loader = ImageLoader::new(limits);
        self
    }

    /// Model name reported in responses.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Label the first image of `request`.
    pub async fn label(&self, request: InferenceRequest) -> Result<ResponseEnvelope, LabelError> {
        let span = tracing::info_span!("label", id = %request.id);
        async move {
            let start = std::time::Instant::now();
            let mut stage = Stage::Received;
            let result = self.run(request, &mut stage).await;

            match &result {
                Ok(envelope) => tracing::debug!(
                    "Labeled in {:?} ({} labels)",
                    start.elapsed(),
                    envelope.result.labels.len()
                ),
                Err(LabelError::EngineUnavailable(message)) => {
                    tracing::error!("Inference error after {stage}: {message}")
                }
                Err(LabelError::Internal(message)) => {
                    tracing::error!("Unexpected error after {stage}: {message}")
                }
                Err(err) => tracing::debug!("Rejected after {stage}: {err}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: InferenceRequest,
        stage: &mut Stage,
    ) -> Result<ResponseEnvelope, LabelError> {
        if !self.verifier.verify(request.token.as_deref()) {
            return Err(LabelError::Unauthorized);
        }
        let Some(payload) = request.images.first() else {
            return Err(LabelError::BadRequest("No images provided".to_string()));
        };
        if request.images.len() > 1 {
            tracing::debug!(
                "Ignoring {} extra image(s); only the first is labeled",
                request.images.len() - 1
            );
        }
        *stage = Stage::Validated;

        let bytes = decode_payload(payload)?;
        *stage = Stage::Decoded;

        let decoded = self.loader.load(&bytes)?;
        drop(bytes);
        tracing::trace!(
            "  Loaded {} {}x{}",
            format_to_string(decoded.format),
            decoded.width,
            decoded.height
        );
        *stage = Stage::Loaded;

        let thresholds = request.thresholds(&self.defaults);
        let output = self.engine.infer(decoded.image, thresholds).await?;
        *stage = Stage::Inferred;

        let labels = merge(&output.general, &output.character);
        *stage = Stage::Merged;

        let envelope = ResponseEnvelope {
            id: request.id,
            code: CODE_OK,
            model: ModelDescriptor::labels(self.model_name.clone()),
            result: LabelResult { labels },
        };
        *stage = Stage::Responded;
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{TagScores, TaggerOutput};
    use crate::error::{EngineError, EngineResult};
    use crate::types::{TagEntry, TagSource, Thresholds};
    use async_trait::async_trait;
    use base64::Engine as _;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Engine returning canned output and recording what it was asked.
    struct FakeEngine {
        output: fn() -> EngineResult<TaggerOutput>,
        calls: AtomicUsize,
        seen: Mutex<Option<Thresholds>>,
    }

    impl FakeEngine {
        fn new(output: fn() -> EngineResult<TaggerOutput>) -> Arc<Self> {
            Arc::new(Self {
                output,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaggerEngine for FakeEngine {
        fn model_path(&self) -> &Path {
            Path::new("/dev/null/model.onnx")
        }

        async fn infer(
            &self,
            _image: DynamicImage,
            thresholds: Thresholds,
        ) -> EngineResult<TaggerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(thresholds);
            (self.output)()
        }
    }

    struct DenyAll;

    impl TokenVerifier for DenyAll {
        fn verify(&self, _token: Option<&str>) -> bool {
            false
        }
    }

    fn scores(pairs: &[(&str, f32)]) -> TagScores {
        pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    fn cat_and_sky() -> EngineResult<TaggerOutput> {
        Ok(TaggerOutput {
            general: scores(&[("sky", 0.4), ("cat", 0.9)]),
            ..TaggerOutput::default()
        })
    }

    fn download_failure() -> EngineResult<TaggerOutput> {
        Err(EngineError::Download {
            url: "https://huggingface.co/x/resolve/main/model.onnx".to_string(),
            message: "connection reset".to_string(),
        })
    }

    fn png_data_uri() -> String {
        png_data_uri_sized(3, 3)
    }

    fn png_data_uri_sized(width: u32, height: u32) -> String {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buffer = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buffer.into_inner())
        )
    }

    fn service(engine: Arc<FakeEngine>) -> LabelService {
        LabelService::new(engine, "vit")
    }

    #[tokio::test]
    async fn test_label_general_only() {
        let engine = FakeEngine::new(cat_and_sky);
        let mut request = InferenceRequest::single("a1", png_data_uri());
        request.general_threshold = Some(0.6);

        let envelope = service(engine.clone()).label(request).await.unwrap();
        assert_eq!(envelope.id, "a1");
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.model, ModelDescriptor::labels("vit"));
        assert_eq!(
            envelope.result.labels,
            vec![
                TagEntry::new("cat", TagSource::General, 0.9),
                TagEntry::new("sky", TagSource::General, 0.4),
            ]
        );
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_thresholds_are_forwarded() {
        let engine = FakeEngine::new(cat_and_sky);
        let mut request = InferenceRequest::single("t", png_data_uri());
        request.character_threshold = Some(0.7);
        request.general_mcut_enabled = Some(true);

        service(engine.clone()).label(request).await.unwrap();
        let seen = engine.seen.lock().unwrap().unwrap();
        assert_eq!(seen.general, 0.6);
        assert_eq!(seen.character, 0.7);
        assert!(seen.general_mcut);
        assert!(!seen.character_mcut);
    }

    #[tokio::test]
    async fn test_configured_defaults_apply() {
        let engine = FakeEngine::new(cat_and_sky);
        let defaults = DefaultsConfig {
            general_threshold: 0.35,
            character_threshold: 0.9,
        };
        service(engine.clone())
            .with_defaults(defaults)
            .label(InferenceRequest::single("d", png_data_uri()))
            .await
            .unwrap();
        let seen = engine.seen.lock().unwrap().unwrap();
        assert_eq!(seen.general, 0.35);
        assert_eq!(seen.character, 0.9);
    }

    #[tokio::test]
    async fn test_empty_images_is_bad_request() {
        let engine = FakeEngine::new(cat_and_sky);
        let mut request = InferenceRequest::single("e", "");
        request.images.clear();

        let err = service(engine.clone()).label(request).await.unwrap_err();
        assert!(matches!(err, LabelError::BadRequest(ref m) if m == "No images provided"));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let engine = FakeEngine::new(cat_and_sky);
        let err = service(engine.clone())
            .with_verifier(Arc::new(DenyAll))
            .label(InferenceRequest::single("u", png_data_uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::Unauthorized));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_base64_skips_engine() {
        let engine = FakeEngine::new(cat_and_sky);
        let err = service(engine.clone())
            .label(InferenceRequest::single("m", "not_base64!!"))
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::BadRequest(_)));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_header_is_bad_request() {
        let engine = FakeEngine::new(cat_and_sky);
        let err = service(engine.clone())
            .label(InferenceRequest::single("h", "data:image/png,aGVsbG8="))
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::BadRequest(ref m) if m == "Invalid base64 header"));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_image_bytes_are_bad_request() {
        let engine = FakeEngine::new(cat_and_sky);
        // Valid base64 of "hello world"
        let err = service(engine.clone())
            .label(InferenceRequest::single("n", "aGVsbG8gd29ybGQ"))
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::BadRequest(_)));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_image_skips_engine() {
        let engine = FakeEngine::new(cat_and_sky);
        let err = service(engine.clone())
            .label(InferenceRequest::single("tall", png_data_uri_sized(1, 100_000)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, LabelError::BadRequest(ref m) if m.starts_with("Image too large: 1x100000")),
            "{err:?}"
        );
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_configured_limits_apply() {
        let engine = FakeEngine::new(cat_and_sky);
        let mut config = Config::default();
        config.limits.max_image_dimension = 2;

        let err = LabelService::from_config(engine.clone(), &config)
            .label(InferenceRequest::single("l", png_data_uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::BadRequest(_)));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_only_first_image_is_used() {
        let engine = FakeEngine::new(cat_and_sky);
        let mut request = InferenceRequest::single("f", png_data_uri());
        request.images.push("not_base64!!".to_string());

        let envelope = service(engine.clone()).label(request).await.unwrap();
        assert_eq!(envelope.result.labels.len(), 2);
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_engine_download_failure_is_unavailable() {
        let engine = FakeEngine::new(download_failure);
        let err = service(engine)
            .label(InferenceRequest::single("x", png_data_uri()))
            .await
            .unwrap_err();
        let expected = download_failure().unwrap_err().to_string();
        assert!(matches!(err, LabelError::EngineUnavailable(ref m) if *m == expected));
    }

    #[tokio::test]
    async fn test_engine_inference_failure_is_internal() {
        let engine = FakeEngine::new(|| Err(EngineError::Inference("shape".to_string())));
        let err = service(engine)
            .label(InferenceRequest::single("i", png_data_uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::Internal(_)));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Received.to_string(), "received");
        assert_eq!(Stage::Responded.to_string(), "responded");
    }
}
