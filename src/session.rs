//! The load / enhance / save actions behind the user interface
//!
//! A `Session` owns what the interface needs between actions: the path of the
//! uploaded image and the last successfully enhanced image. Every action
//! catches its own failures, reports them through a [`Notifier`] and leaves
//! the session usable.

use crate::error::EnhanceError;
use crate::job::EnhancementJob;
use crate::pipeline::{load_rgb, EnhancementPipeline};
use crate::preview;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension given to save paths that have none
pub const DEFAULT_SAVE_EXTENSION: &str = "jpg";
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

const ERROR_TITLE: &str = "Error";
const SUCCESS_TITLE: &str = "Success";

/// Receives user-facing messages, typically shown as modal dialogs
pub trait Notifier: Send + Sync {
    fn error(&self, title: &str, message: &str);
    fn info(&self, title: &str, message: &str);
}

/// Notifier that writes messages to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, title: &str, message: &str) {
        tracing::error!("{}: {}", title, message);
    }

    fn info(&self, title: &str, message: &str) {
        tracing::info!("{}: {}", title, message);
    }
}

pub struct Session {
    pipeline: Arc<EnhancementPipeline>,
    notifier: Arc<dyn Notifier>,
    jpeg_quality: u8,
    uploaded_image_path: Option<PathBuf>,
    upgraded_image: Option<RgbImage>,
}

impl Session {
    pub fn new(pipeline: Arc<EnhancementPipeline>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pipeline,
            notifier,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            uploaded_image_path: None,
            upgraded_image: None,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn uploaded_image_path(&self) -> Option<&Path> {
        self.uploaded_image_path.as_deref()
    }

    pub fn upgraded_image(&self) -> Option<&RgbImage> {
        self.upgraded_image.as_ref()
    }

    /// Saving is only possible after a successful enhancement
    pub fn can_save(&self) -> bool {
        self.upgraded_image.is_some()
    }

    /// Remember `path` as the image to enhance and return its display preview
    pub fn load_image(&mut self, path: &Path) -> Option<RgbImage> {
        match load_rgb(path) {
            Ok(image) => Some(self.accept_upload(path, &image)),
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    /// Record `image`, already decoded from `path`, as the uploaded image
    /// and return its display preview
    pub fn accept_upload(&mut self, path: &Path, image: &RgbImage) -> RgbImage {
        tracing::info!(
            "Loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        self.uploaded_image_path = Some(path.to_path_buf());
        preview::load_preview(image)
    }

    /// Enhance the uploaded image at full resolution, blocking until done
    pub fn enhance<F>(&mut self, progress: F) -> Option<&RgbImage>
    where
        F: FnMut(u8),
    {
        let result = match &self.uploaded_image_path {
            Some(path) => self.pipeline.enhance_path(path, progress, None),
            None => Err(EnhanceError::NothingUploaded),
        };
        self.store(result)
    }

    /// Start enhancing the uploaded image in the background.
    ///
    /// Must be called from within a tokio runtime. Hand the finished job to
    /// [`Session::finish`] to keep its result.
    pub fn spawn_enhancement(&self) -> Option<EnhancementJob> {
        let path = self.require_upload()?;
        match load_rgb(path) {
            Ok(image) => Some(EnhancementJob::spawn(self.pipeline.clone(), image)),
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    /// Start enhancing the decoded pixels of the uploaded image without
    /// reading the file again
    pub fn spawn_enhancement_of(&self, image: RgbImage) -> Option<EnhancementJob> {
        self.require_upload()?;
        Some(EnhancementJob::spawn(self.pipeline.clone(), image))
    }

    fn require_upload(&self) -> Option<&Path> {
        let path = self.uploaded_image_path.as_deref();
        if path.is_none() {
            self.report(&EnhanceError::NothingUploaded);
        }
        path
    }

    /// Wait for a background enhancement and keep its result
    pub async fn finish(&mut self, job: EnhancementJob) -> Option<&RgbImage> {
        let result = job.wait().await;
        self.store(result)
    }

    /// Write the enhanced image to `path`, defaulting to JPEG.
    ///
    /// Returns the path actually written.
    pub fn save_image(&self, path: &Path) -> Option<PathBuf> {
        let image = match &self.upgraded_image {
            Some(image) => image,
            None => {
                self.report(&EnhanceError::NothingToSave);
                return None;
            }
        };

        let path = with_default_extension(path);
        match write_image(image, &path, self.jpeg_quality) {
            Ok(()) => {
                self.notifier.info(
                    SUCCESS_TITLE,
                    &format!("Image saved at {}", path.display()),
                );
                Some(path)
            }
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    fn store(&mut self, result: Result<RgbImage, EnhanceError>) -> Option<&RgbImage> {
        match result {
            Ok(image) => {
                self.upgraded_image = Some(image);
                self.upgraded_image.as_ref()
            }
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    fn report(&self, error: &EnhanceError) {
        tracing::warn!("Action failed: {}", error);
        self.notifier.error(ERROR_TITLE, &error.to_string());
    }
}

fn with_default_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(DEFAULT_SAVE_EXTENSION)
    }
}

/// Encode `image` according to the path's extension
pub fn write_image(image: &RgbImage, path: &Path, jpeg_quality: u8) -> Result<(), EnhanceError> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| EnhanceError::Save(format!("{}: {}", path.display(), e)))?;

    if format == ImageFormat::Jpeg {
        let file = File::create(path)
            .map_err(|e| EnhanceError::Save(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, jpeg_quality)
            .encode_image(image)
            .map_err(|e| EnhanceError::Save(format!("{}: {}", path.display(), e)))?;
        return Ok(());
    }

    image
        .save_with_format(path, format)
        .map_err(|e| EnhanceError::Save(format!("{}: {}", path.display(), e)))
}
