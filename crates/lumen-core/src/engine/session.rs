//! ONNX Runtime session management for tagger models.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::error::{EngineError, EngineResult};

/// Wraps an ONNX Runtime session for a WD-style tagger.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`; concurrent
/// requests queue on it.
pub struct TaggerSession {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
}

impl TaggerSession {
    /// Load a tagger model from an ONNX file.
    pub fn load(model_path: &Path) -> EngineResult<Self> {
        let session = Session::builder()
            .map_err(|e| {
                EngineError::NotLoaded(format!("Failed to create ONNX session builder: {e}"))
            })?
            .commit_from_file(model_path)
            .map_err(|e| {
                EngineError::NotLoaded(format!(
                    "Failed to load ONNX model {}: {e}",
                    model_path.display()
                ))
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input".to_string());

        tracing::debug!(
            "Loaded tagger model from {:?} (input: {:?}, outputs: {:?})",
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    /// Run the model on a preprocessed NHWC tensor.
    ///
    /// Returns the per-label probabilities of the single image in the batch.
    pub fn run(&self, preprocessed: &Array4<f32>) -> EngineResult<Vec<f32>> {
        let shape: Vec<i64> = preprocessed.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = preprocessed.iter().copied().collect();

        let input_value = Value::from_array((shape, flat_data))
            .map_err(|e| EngineError::Inference(format!("Failed to create input tensor: {e}")))?;

        let inputs = ort::inputs![self.input_name.as_str() => input_value];

        let mut session = self
            .session
            .lock()
            .map_err(|e| EngineError::Internal(format!("Session lock poisoned: {e}")))?;

        let outputs = session
            .run(inputs)
            .map_err(|e| EngineError::Inference(format!("ONNX inference failed: {e}")))?;

        // Taggers have a single output: sigmoid probabilities, shape [1, N].
        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| EngineError::Inference("Model produced no outputs".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::Inference(format!("Failed to extract output tensor: {e}")))?;

        match shape.len() {
            1 => Ok(data.to_vec()),
            2 => {
                let width = shape[1] as usize;
                data.get(..width).map(<[f32]>::to_vec).ok_or_else(|| {
                    EngineError::Inference(format!("Output shorter than its shape {:?}", shape))
                })
            }
            _ => Err(EngineError::Inference(format!(
                "Unexpected output shape: {:?}",
                shape
            ))),
        }
    }
}
