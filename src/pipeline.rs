//! Enhancement stage: pre-filter, super-resolution, then face restoration

use crate::error::EnhanceError;
use crate::preprocessing::PreFilter;
use crate::service::ImageService;
use image::RgbImage;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Scale requested from the super-resolution service
pub const SUPER_RESOLUTION_SCALE: u32 = 4;
/// Upscale requested from the face-restoration service
pub const FACE_UPSCALE: u32 = 10;

/// Progress reported once super-resolution has finished
pub const PROGRESS_AFTER_SUPER_RESOLUTION: u8 = 50;
/// Progress reported once face restoration has finished
pub const PROGRESS_COMPLETE: u8 = 100;

/// Shared flag used to stop an enhancement between stages
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), EnhanceError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(EnhanceError::Cancelled),
        _ => Ok(()),
    }
}

/// The fixed enhancement sequence over two model services
#[derive(Clone)]
pub struct EnhancementPipeline {
    prefilter: PreFilter,
    super_resolution: Arc<dyn ImageService>,
    face_restoration: Arc<dyn ImageService>,
}

impl EnhancementPipeline {
    pub fn new(
        super_resolution: Arc<dyn ImageService>,
        face_restoration: Arc<dyn ImageService>,
    ) -> Self {
        Self {
            prefilter: PreFilter::new(),
            super_resolution,
            face_restoration,
        }
    }

    pub fn super_resolution(&self) -> &Arc<dyn ImageService> {
        &self.super_resolution
    }

    pub fn face_restoration(&self) -> &Arc<dyn ImageService> {
        &self.face_restoration
    }

    /// Load an image file and enhance it
    pub fn enhance_path<F>(
        &self,
        path: &Path,
        progress: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<RgbImage, EnhanceError>
    where
        F: FnMut(u8),
    {
        let image = load_rgb(path)?;
        self.run(&image, progress, cancel)
    }

    /// Run pre-filter, super-resolution and face restoration in sequence.
    ///
    /// `progress` receives 50 after super-resolution and 100 at the end.
    /// Either service failing aborts the run without a partial image.
    pub fn run<F>(
        &self,
        image: &RgbImage,
        mut progress: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<RgbImage, EnhanceError>
    where
        F: FnMut(u8),
    {
        let start = Instant::now();

        check_cancelled(cancel)?;
        let filtered = self.prefilter.process(image)?;

        check_cancelled(cancel)?;
        let upscaled = self
            .super_resolution
            .enhance(&filtered.image, SUPER_RESOLUTION_SCALE)?;
        tracing::info!(
            "{} produced {}x{}",
            self.super_resolution.name(),
            upscaled.width(),
            upscaled.height()
        );
        progress(PROGRESS_AFTER_SUPER_RESOLUTION);

        check_cancelled(cancel)?;
        let restored = self.face_restoration.enhance(&upscaled, FACE_UPSCALE)?;
        progress(PROGRESS_COMPLETE);

        tracing::info!(
            "Enhanced {}x{} -> {}x{} in {}ms",
            image.width(),
            image.height(),
            restored.width(),
            restored.height(),
            start.elapsed().as_millis()
        );

        Ok(restored)
    }
}

/// Decode an image file into a 3-channel buffer
pub fn load_rgb(path: &Path) -> Result<RgbImage, EnhanceError> {
    let image = image::open(path)
        .map_err(|e| EnhanceError::ImageLoad(format!("{}: {}", path.display(), e)))?;
    let rgb = image.into_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(EnhanceError::ImageLoad(format!(
            "{}: image is empty",
            path.display()
        )));
    }
    Ok(rgb)
}
