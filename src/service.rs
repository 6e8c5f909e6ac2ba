use crate::error::EnhanceError;
use image::RgbImage;
use serde::Serialize;

/// Description of a loaded model service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub native_scale: u32,
}

/// Trait that all image enhancement services must implement
pub trait ImageService: Send + Sync {
    /// Returns the service identifier (e.g., "realesrgan", "gfpgan")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the service
    fn description(&self) -> &'static str;

    /// Scale factor the underlying model produces on its own
    fn native_scale(&self) -> u32;

    /// Enhance an image, returning a buffer `scale` times larger
    fn enhance(&self, image: &RgbImage, scale: u32) -> Result<RgbImage, EnhanceError>;

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.name(),
            description: self.description(),
            native_scale: self.native_scale(),
        }
    }
}
