use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use tb_classifier::{
    config::{self, GradCamConfig, LogLevel},
    gradcam::{make_gradcam_heatmap, save_overlay, LayerRef, OrtGradCamModel},
    preprocessing::load_rgb,
    telemetry,
};

/// Renders a Grad-CAM overlay for one chest X-ray.
#[derive(Parser, Debug)]
#[command(name = "gradcam", version)]
struct Args {
    /// Explainability export of the classifier (ONNX)
    #[arg(long)]
    model: PathBuf,

    /// Source image
    #[arg(long)]
    image: PathBuf,

    #[arg(long, default_value = "gradcam_output.jpg")]
    output: PathBuf,

    /// Backbone sub-network containing the target layer
    #[arg(long)]
    backbone: Option<String>,

    /// Convolutional layer whose activations are explained
    #[arg(long)]
    layer: Option<String>,

    #[arg(long)]
    alpha: Option<f32>,

    #[arg(long)]
    class_index: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_tracing(&LogLevel::Info);

    let defaults = match config::get_configuration() {
        Ok(config) => config.gradcam,
        Err(e) => {
            tracing::warn!("Using built-in Grad-CAM defaults: {}", e);
            GradCamConfig::default()
        }
    };

    let layer = LayerRef::new(
        args.backbone.unwrap_or(defaults.backbone),
        args.layer.unwrap_or(defaults.layer),
    );
    let alpha = args.alpha.unwrap_or(defaults.alpha);

    let model = match OrtGradCamModel::new(&args.model) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!("Failed to load {}: {}", args.model.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let (image, input) = match load_rgb(&args.image) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", args.image.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let Some(heatmap) = make_gradcam_heatmap(&model, &input, &layer, args.class_index) else {
        return ExitCode::FAILURE;
    };

    match save_overlay(&image, &heatmap, &args.output, alpha) {
        Some(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
    }
}
