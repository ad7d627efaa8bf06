use super::GradCamError;
use image::{imageops::FilterType, GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Maps an intensity in `[0, 1]` to the jet palette (dark blue to dark red).
pub fn jet_colormap(value: f32) -> [u8; 3] {
    let v = if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let channel = |offset: f32| {
        let c = (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };

    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Stretches `heatmap` over `image` and blends it in with weight `alpha`.
pub fn overlay_heatmap(
    image: &RgbImage,
    heatmap: &Array2<f32>,
    alpha: f32,
) -> Result<RgbImage, GradCamError> {
    let (rows, cols) = heatmap.dim();
    if rows == 0 || cols == 0 || image.width() == 0 || image.height() == 0 {
        return Err(GradCamError::EmptyHeatmap);
    }

    let heat = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = heatmap[[y as usize, x as usize]].clamp(0.0, 1.0);
        Luma([(v * 255.0).round() as u8])
    });
    let heat = image::imageops::resize(&heat, image.width(), image.height(), FilterType::Triangle);

    let alpha = alpha.clamp(0.0, 1.0);
    let composite = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let color = jet_colormap(heat.get_pixel(x, y).0[0] as f32 / 255.0);
        let base = image.get_pixel(x, y).0;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let blended = alpha * color[c] as f32 + (1.0 - alpha) * base[c] as f32;
            out[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    });

    Ok(composite)
}

/// Renders the heatmap over the image at `image_path`, writes it to
/// `output_path` and returns the absolute path written. Returns `None` and
/// logs on failure.
pub fn save_and_display_gradcam(
    image_path: &Path,
    heatmap: &Array2<f32>,
    output_path: &Path,
    alpha: f32,
) -> Option<PathBuf> {
    match image::open(image_path) {
        Ok(image) => save_overlay(&image.to_rgb8(), heatmap, output_path, alpha),
        Err(e) => {
            tracing::error!("Failed to open {}: {}", image_path.display(), e);
            None
        }
    }
}

/// Same as [`save_and_display_gradcam`] for an image that is already decoded.
pub fn save_overlay(
    image: &RgbImage,
    heatmap: &Array2<f32>,
    output_path: &Path,
    alpha: f32,
) -> Option<PathBuf> {
    match render_to_file(image, heatmap, output_path, alpha) {
        Ok(path) => {
            tracing::info!("Grad-CAM overlay written to {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::error!(
                "Failed to write Grad-CAM overlay to {}: {}",
                output_path.display(),
                e
            );
            None
        }
    }
}

fn render_to_file(
    image: &RgbImage,
    heatmap: &Array2<f32>,
    output_path: &Path,
    alpha: f32,
) -> Result<PathBuf, GradCamError> {
    let composite = overlay_heatmap(image, heatmap, alpha)?;
    composite.save(output_path)?;

    Ok(std::fs::canonicalize(output_path)?)
}
