//! RetinaFace (ResNet-50) face detector
//!
//! The model takes a BGR image with the channel means subtracted and returns
//! decoded detections in input pixel coordinates, as rows of
//! `x1, y1, x2, y2, score, lx0, ly0, .. lx4, ly4`.

use super::face::FaceDetection;
use super::tensor;
use crate::error::EnhanceError;
use image::RgbImage;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use std::path::Path;

pub const MODEL_FILENAME: &str = "retinaface_resnet50.rten";

/// Per-channel means in B, G, R order
const MEAN_BGR: [f32; 3] = [104.0, 117.0, 123.0];
const ROW_LEN: usize = 15;
const NAME: &str = "face detection";

pub struct FaceDetector {
    model: Model,
    score_threshold: f32,
}

impl FaceDetector {
    pub fn new(path: &Path, score_threshold: f32) -> Result<Self, EnhanceError> {
        let model = tensor::load_model(path, "face detection")?;
        Ok(Self {
            model,
            score_threshold,
        })
    }

    /// Detections scoring at least the threshold, in image coordinates
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<FaceDetection>, EnhanceError> {
        let input = tensor::image_to_tensor(image, |[r, g, b]| {
            [
                b as f32 - MEAN_BGR[0],
                g as f32 - MEAN_BGR[1],
                r as f32 - MEAN_BGR[2],
            ]
        });
        let output: NdTensor<f32, 2> = tensor::run(&self.model, input, NAME)?;
        parse_detections(&output, self.score_threshold)
    }
}

fn parse_detections(
    output: &NdTensor<f32, 2>,
    score_threshold: f32,
) -> Result<Vec<FaceDetection>, EnhanceError> {
    let [rows, cols] = output.shape();
    if cols < ROW_LEN {
        return Err(EnhanceError::service(
            NAME,
            format!("expected {} values per detection, got {}", ROW_LEN, cols),
        ));
    }

    let detections = (0..rows)
        .filter(|&i| output[[i, 4]] >= score_threshold)
        .map(|i| {
            let v = |j: usize| output[[i, j]];
            FaceDetection {
                bbox: [v(0), v(1), v(2), v(3)],
                score: v(4),
                landmarks: std::array::from_fn(|k| [v(5 + 2 * k), v(6 + 2 * k)]),
            }
        })
        .collect();
    Ok(detections)
}
