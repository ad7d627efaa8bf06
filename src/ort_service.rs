use crate::model_service::{check_score, InferenceError, ModelService};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

pub struct OrtModelService {
    session: Mutex<Session>,
    output_name: String,
    model_path: PathBuf,
}

impl OrtModelService {
    pub fn new(model_path: &Path, intra_threads: Option<usize>) -> Result<Self, InferenceError> {
        let mut builder =
            Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(threads) = intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        let session = builder.commit_from_file(model_path)?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or(InferenceError::NoOutputs)?;

        tracing::debug!(
            "Created ONNX session for {:?} with output {}",
            model_path,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            model_path: model_path.to_path_buf(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, input: &Array<f32, Ix4>) -> Result<f32, InferenceError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Poisoned(e.to_string()))?;

        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (_shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        let score = data.first().copied().ok_or(InferenceError::EmptyOutput)?;

        tracing::debug!("Raw model output {:.6}", score);

        check_score(score)
    }
}
