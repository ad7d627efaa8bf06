use super::{GradCamError, GradCamModel, LayerRef};
use ndarray::{Array3, ArrayD, Axis, Ix4};
use ort::{
    session::Session,
    value::{DynValue, Tensor, TensorRef},
};
use std::{path::Path, sync::Mutex};

/// Optional graph input selecting which output unit the gradient is taken of.
pub const CLASS_INDEX_INPUT: &str = "class_index";

pub struct OrtGradCamModel {
    session: Mutex<Session>,
    input_name: String,
}

impl OrtGradCamModel {
    pub fn new(model_path: &Path) -> Result<Self, GradCamError> {
        let session = Session::builder()?.commit_from_file(model_path)?;

        let input_name = session
            .inputs
            .iter()
            .map(|i| i.name.clone())
            .find(|name| name != CLASS_INDEX_INPUT)
            .ok_or(GradCamError::MissingInput)?;

        tracing::debug!(
            "Explainability graph {:?} exposes outputs {:?}",
            model_path,
            session.outputs.iter().map(|o| &o.name).collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }
}

impl GradCamModel for OrtGradCamModel {
    fn activations_and_gradients(
        &self,
        input: &ndarray::Array4<f32>,
        layer: &LayerRef,
        class_index: Option<usize>,
    ) -> Result<(Array3<f32>, Array3<f32>), GradCamError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| GradCamError::Poisoned(e.to_string()))?;

        let output_name = layer.output_name();
        let gradient_name = layer.gradient_name();
        let has_output = |name: &str| session.outputs.iter().any(|o| o.name == name);
        if !has_output(&output_name) {
            return Err(GradCamError::LayerNotFound(output_name));
        }
        if !has_output(&gradient_name) {
            return Err(GradCamError::DisconnectedGradient(output_name));
        }

        let accepts_class_index = session
            .inputs
            .iter()
            .any(|i| i.name == CLASS_INDEX_INPUT);
        let class_index = class_index.unwrap_or(0);
        if !accepts_class_index && class_index != 0 {
            return Err(GradCamError::UnsupportedClassIndex(class_index));
        }

        let input = input.as_standard_layout();
        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let outputs = if accepts_class_index {
            let class_tensor = Tensor::from_array(ndarray::arr1(&[class_index as i64]))?;
            session.run(ort::inputs![
                self.input_name.as_str() => tensor_ref,
                CLASS_INDEX_INPUT => class_tensor
            ])?
        } else {
            session.run(ort::inputs![self.input_name.as_str() => tensor_ref])?
        };

        let activations = first_feature_map(&outputs[output_name.as_str()])?;
        let gradients = first_feature_map(&outputs[gradient_name.as_str()])?;

        Ok((activations, gradients))
    }
}

// `(1, H, W, C)` output to `(H, W, C)`.
fn first_feature_map(value: &DynValue) -> Result<Array3<f32>, GradCamError> {
    let (shape, data) = value.try_extract_tensor::<f32>()?;
    let array = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())?
        .into_dimensionality::<Ix4>()?;
    if array.len_of(Axis(0)) == 0 {
        return Err(GradCamError::EmptyHeatmap);
    }

    Ok(array.index_axis_move(Axis(0), 0))
}
