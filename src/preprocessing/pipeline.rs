use crate::error::EnhanceError;
use image::RgbImage;
use serde::Serialize;
use std::time::Instant;

use super::steps;

/// Timing information for a single pre-filter step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of the pre-filter including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreFilterResult {
    /// Blended image (not serialized)
    #[serde(skip)]
    pub image: RgbImage,
    /// Total pre-filter time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Edge / Gaussian / bilateral pre-filter with fixed blend weights
#[derive(Debug, Clone, Copy, Default)]
pub struct PreFilter;

impl PreFilter {
    pub fn new() -> Self {
        Self
    }

    /// Filter an image. The output always has the input's dimensions.
    pub fn process(&self, image: &RgbImage) -> Result<PreFilterResult, EnhanceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EnhanceError::Preprocessing(format!(
                "Empty image ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let start = Instant::now();
        let mut timings = Vec::new();

        let edges = self.run_step("edges", &mut timings, || steps::edges::apply(image))?;
        let gaussian = self.run_step("gaussian", &mut timings, || steps::gaussian::apply(image))?;
        let bilateral =
            self.run_step("bilateral", &mut timings, || steps::bilateral::apply(image))?;
        let blended = self.run_step("blend", &mut timings, || {
            steps::blend::combine(&bilateral, &gaussian, &edges)
        })?;

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Pre-filter finished in {}ms ({}x{})",
            total_time_ms,
            blended.width(),
            blended.height()
        );

        Ok(PreFilterResult {
            image: blended,
            total_time_ms,
            steps: timings,
        })
    }

    fn run_step<F>(
        &self,
        name: &str,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<RgbImage, EnhanceError>
    where
        F: FnOnce() -> Result<RgbImage, EnhanceError>,
    {
        let step_start = Instant::now();
        let result = step_fn()?;
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}
