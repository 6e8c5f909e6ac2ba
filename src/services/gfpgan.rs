//! GFPGAN face restoration
//!
//! Faces are detected with RetinaFace, aligned to a 512x512 template,
//! restored one by one and pasted back into a background upscaled by the
//! configured upsampler.

use super::restore::{self, FaceRestoreOptions, DETECTION_THRESHOLD};
use super::retinaface::{self, FaceDetector};
use super::tensor;
use crate::config::Config;
use crate::error::EnhanceError;
use crate::service::ImageService;
use image::RgbImage;
use rten::Model;
use std::sync::Arc;

pub const MODEL_FILENAME: &str = "GFPGANv1.4.rten";

const NAME: &str = "gfpgan";

pub struct GfpganService {
    restorer: Model,
    detector: FaceDetector,
    bg_upsampler: Option<Arc<dyn ImageService>>,
    options: FaceRestoreOptions,
}

impl GfpganService {
    pub fn new(
        config: &Config,
        bg_upsampler: Option<Arc<dyn ImageService>>,
        options: FaceRestoreOptions,
    ) -> Result<Self, EnhanceError> {
        let restorer = tensor::load_model(&config.model_path(MODEL_FILENAME), "face restoration")?;
        let detector = FaceDetector::new(
            &config.model_path(retinaface::MODEL_FILENAME),
            DETECTION_THRESHOLD,
        )?;

        Ok(Self {
            restorer,
            detector,
            bg_upsampler,
            options,
        })
    }

    fn restore_face(&self, crop: &RgbImage) -> Result<RgbImage, EnhanceError> {
        let input = tensor::image_to_tensor(crop, |[r, g, b]| {
            [r, g, b].map(|v| v as f32 / 255.0 * 2.0 - 1.0)
        });
        let output = tensor::run::<4>(&self.restorer, input, NAME)?;
        tensor::tensor_to_image(&output, NAME, |v| tensor::unit_to_u8((v + 1.0) / 2.0))
    }
}

impl ImageService for GfpganService {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "GFPGAN v1.4 face restoration with RetinaFace detection"
    }

    fn native_scale(&self) -> u32 {
        1
    }

    fn enhance(&self, image: &RgbImage, scale: u32) -> Result<RgbImage, EnhanceError> {
        restore::restore_faces(
            image,
            scale,
            self.options,
            self.bg_upsampler.as_deref(),
            |img| self.detector.detect(img),
            |crop| self.restore_face(crop),
        )
    }
}
