//! Gradient-weighted class activation maps for the classifier.
//!
//! ONNX Runtime cannot differentiate a graph, so the gradients come from an
//! explainability export of the classifier: the same network with two extra
//! outputs, the feature maps of a named backbone layer and the gradient of
//! the class score with respect to them. See [`OrtGradCamModel`].

mod ort_gradcam;
mod overlay;

use ndarray::{s, Array2, Array3, Array4, Axis};
use thiserror::Error;

pub use ort_gradcam::{OrtGradCamModel, CLASS_INDEX_INPUT};
pub use overlay::{jet_colormap, overlay_heatmap, save_and_display_gradcam, save_overlay};

pub const DEFAULT_ALPHA: f32 = 0.4;

const EPSILON: f32 = 1e-8;

#[derive(Error, Debug)]
pub enum GradCamError {
    #[error("Layer `{0}` not found in model outputs")]
    LayerNotFound(String),
    #[error("No gradient available for layer `{0}`")]
    DisconnectedGradient(String),
    #[error("Class index {0} is not supported by this model")]
    UnsupportedClassIndex(usize),
    #[error("Activation shape {activations:?} does not match gradient shape {gradients:?}")]
    ShapeMismatch {
        activations: Vec<usize>,
        gradients: Vec<usize>,
    },
    #[error("Model has no image input")]
    MissingInput,
    #[error("Heatmap is empty")]
    EmptyHeatmap,
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convolutional layer addressed by the sub-network that contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRef {
    pub backbone: String,
    pub layer: String,
}

impl LayerRef {
    pub fn new(backbone: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            backbone: backbone.into(),
            layer: layer.into(),
        }
    }

    pub fn output_name(&self) -> String {
        format!("{}/{}", self.backbone, self.layer)
    }

    pub fn gradient_name(&self) -> String {
        format!("{}/{}/grad", self.backbone, self.layer)
    }
}

pub trait GradCamModel {
    /// Runs one forward pass and returns the `(H, W, C)` feature maps of
    /// `layer` together with the gradient of the selected class score with
    /// respect to them. `None` selects the first output unit.
    fn activations_and_gradients(
        &self,
        input: &Array4<f32>,
        layer: &LayerRef,
        class_index: Option<usize>,
    ) -> Result<(Array3<f32>, Array3<f32>), GradCamError>;
}

/// Pools gradients into per-channel weights, weight-sums the feature maps,
/// clips at zero and normalizes by the maximum.
pub fn compute_heatmap(
    activations: &Array3<f32>,
    gradients: &Array3<f32>,
) -> Result<Array2<f32>, GradCamError> {
    if activations.shape() != gradients.shape() {
        return Err(GradCamError::ShapeMismatch {
            activations: activations.shape().to_vec(),
            gradients: gradients.shape().to_vec(),
        });
    }
    if gradients.iter().any(|g| !g.is_finite()) {
        return Err(GradCamError::DisconnectedGradient(
            "non-finite gradient values".to_string(),
        ));
    }

    let pooled = gradients
        .mean_axis(Axis(0))
        .and_then(|g| g.mean_axis(Axis(0)))
        .ok_or(GradCamError::EmptyHeatmap)?;

    let (height, width, _) = activations.dim();
    let mut heatmap = Array2::from_shape_fn((height, width), |(y, x)| {
        activations.slice(s![y, x, ..]).dot(&pooled)
    });

    heatmap.mapv_inplace(|v| v.max(0.0));
    let max = heatmap.fold(0.0f32, |acc, &v| acc.max(v));
    heatmap.mapv_inplace(|v| v / (max + EPSILON));

    Ok(heatmap)
}

/// Computes the Grad-CAM heatmap for one preprocessed image. Returns `None`
/// when the layer is missing, the gradient is unavailable or the model
/// fails; the cause is logged.
pub fn make_gradcam_heatmap<M: GradCamModel + ?Sized>(
    model: &M,
    input: &Array4<f32>,
    layer: &LayerRef,
    class_index: Option<usize>,
) -> Option<Array2<f32>> {
    let heatmap = model
        .activations_and_gradients(input, layer, class_index)
        .and_then(|(activations, gradients)| compute_heatmap(&activations, &gradients));

    match heatmap {
        Ok(heatmap) => {
            tracing::debug!("Computed {:?} heatmap for {}", heatmap.dim(), layer.output_name());
            Some(heatmap)
        }
        Err(e) => {
            tracing::error!("Grad-CAM failed for {}: {}", layer.output_name(), e);
            None
        }
    }
}
