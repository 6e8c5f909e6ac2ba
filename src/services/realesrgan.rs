//! Real-ESRGAN super-resolution
//!
//! Runs a fixed 4x model through rten. Large inputs can be split into
//! overlapping tiles; other output scales are reached by resampling the 4x result.

use super::tensor;
use super::tiling::{self, TileOptions};
use crate::config::Config;
use crate::error::EnhanceError;
use crate::service::ImageService;
use image::RgbImage;
use rten::Model;

pub const MODEL_FILENAME: &str = "realesr-general-x4v3.rten";
pub const NATIVE_SCALE: u32 = 4;

const NAME: &str = "realesrgan";

pub struct RealEsrganService {
    model: Model,
    tiling: TileOptions,
}

impl RealEsrganService {
    pub fn new(config: &Config) -> Result<Self, EnhanceError> {
        let model = tensor::load_model(&config.model_path(MODEL_FILENAME), "super-resolution")?;

        tracing::info!(
            "Real-ESRGAN ready (tile: {}, tile_pad: {}, pre_pad: {})",
            config.tile,
            config.tile_pad,
            config.pre_pad
        );

        Ok(Self {
            model,
            tiling: TileOptions {
                tile: config.tile,
                tile_pad: config.tile_pad,
                pre_pad: config.pre_pad,
            },
        })
    }

    fn infer(&self, image: &RgbImage) -> Result<RgbImage, EnhanceError> {
        let input = tensor::image_to_tensor(image, |[r, g, b]| {
            [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
        });
        let output = tensor::run::<4>(&self.model, input, NAME)?;
        tensor::tensor_to_image(&output, NAME, tensor::unit_to_u8)
    }
}

impl ImageService for RealEsrganService {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Real-ESRGAN general x4v3 super-resolution"
    }

    fn native_scale(&self) -> u32 {
        NATIVE_SCALE
    }

    fn enhance(&self, image: &RgbImage, scale: u32) -> Result<RgbImage, EnhanceError> {
        tiling::upscale(image, scale, NATIVE_SCALE, self.tiling, |patch| {
            self.infer(patch)
        })
    }
}
