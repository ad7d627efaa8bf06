use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, Ix4};
use std::path::Path;
use thiserror::Error;

pub const IMAGE_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Empty image payload")]
    Empty,
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Error reading image: {0}")]
    Io(#[from] std::io::Error),
}

/// Decodes an encoded image into the classifier's `(1, 224, 224, 3)` input,
/// with intensities scaled to `[0, 1]`.
pub fn preprocess(image_data: &[u8]) -> Result<Array<f32, Ix4>, PreprocessError> {
    let img = decode_rgb(image_data)?;
    Ok(to_input_tensor(&img))
}

/// Reads an image file and returns both the original RGB image and the
/// classifier input built from it.
pub fn load_rgb(path: &Path) -> Result<(RgbImage, Array<f32, Ix4>), PreprocessError> {
    let image_data = std::fs::read(path)?;
    let img = decode_rgb(&image_data)?;
    let input = to_input_tensor(&img);
    Ok((img, input))
}

fn decode_rgb(image_data: &[u8]) -> Result<RgbImage, PreprocessError> {
    if image_data.is_empty() {
        return Err(PreprocessError::Empty);
    }

    let original_img = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()?
        .decode()?;

    Ok(original_img.to_rgb8())
}

fn to_input_tensor(img: &RgbImage) -> Array<f32, Ix4> {
    let resized = image::imageops::resize(img, IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom);

    let size = IMAGE_SIZE as usize;
    let mut input = Array::zeros((1, size, size, CHANNELS));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }

    input
}
