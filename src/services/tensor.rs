//! Conversions between image buffers and rten tensors

use crate::error::EnhanceError;
use image::{Rgb, RgbImage};
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use std::path::Path;

/// Load a model file, failing early with a readable message if it is missing
pub fn load_model(path: &Path, what: &str) -> Result<Model, EnhanceError> {
    if !path.is_file() {
        return Err(EnhanceError::Initialization(format!(
            "{} model not found at {}",
            what,
            path.display()
        )));
    }

    tracing::info!("Loading {} model from {}", what, path.display());
    Model::load_file(path).map_err(|e| {
        EnhanceError::Initialization(format!("Failed to load {} model: {}", what, e))
    })
}

/// Build a `[1, 3, H, W]` tensor, mapping every RGB pixel to three channel values
pub fn image_to_tensor<F>(image: &RgbImage, map: F) -> NdTensor<f32, 4>
where
    F: Fn([u8; 3]) -> [f32; 3],
{
    let (width, height) = image.dimensions();
    let mut tensor = NdTensor::zeros([1, 3, height as usize, width as usize]);
    for (x, y, pixel) in image.enumerate_pixels() {
        let values = map(pixel.0);
        for (c, value) in values.into_iter().enumerate() {
            tensor[[0, c, y as usize, x as usize]] = value;
        }
    }
    tensor
}

/// Read a `[1, 3, H, W]` tensor back into an image
pub fn tensor_to_image<F>(
    tensor: &NdTensor<f32, 4>,
    service: &'static str,
    map: F,
) -> Result<RgbImage, EnhanceError>
where
    F: Fn(f32) -> u8,
{
    let [batch, channels, height, width] = tensor.shape();
    if batch != 1 || channels != 3 {
        return Err(EnhanceError::service(
            service,
            format!("unexpected output shape {:?}", [batch, channels, height, width]),
        ));
    }

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            map(tensor[[0, 0, y, x]]),
            map(tensor[[0, 1, y, x]]),
            map(tensor[[0, 2, y, x]]),
        ])
    }))
}

/// Run a single-input, single-output model
pub fn run<const N: usize>(
    model: &Model,
    input: NdTensor<f32, 4>,
    service: &'static str,
) -> Result<NdTensor<f32, N>, EnhanceError> {
    let output = model
        .run_one(input.view().into(), None)
        .map_err(|e| EnhanceError::service(service, e))?;
    output
        .try_into()
        .map_err(|e| EnhanceError::service(service, format!("unexpected output: {}", e)))
}

/// `[0, 1]` float to byte
pub fn unit_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
