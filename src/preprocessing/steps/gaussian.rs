use crate::error::EnhanceError;
use image::RgbImage;
use imageproc::filter::gaussian_blur_f32;

/// Kernel size of the pre-filter blur. A 1x1 kernel leaves the image untouched.
pub const KERNEL_SIZE: u32 = 1;
/// 0 derives sigma from the kernel size
pub const SIGMA: f32 = 0.0;

/// Apply the pre-filter Gaussian blur
pub fn apply(image: &RgbImage) -> Result<RgbImage, EnhanceError> {
    blur(image, KERNEL_SIZE, SIGMA)
}

/// Gaussian blur parameterized like a kernel-size based blur.
///
/// Non-positive sigma is derived as `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
pub fn blur(image: &RgbImage, kernel_size: u32, sigma: f32) -> Result<RgbImage, EnhanceError> {
    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(EnhanceError::Preprocessing(format!(
            "Gaussian kernel size must be odd, got {}",
            kernel_size
        )));
    }

    // Single-tap kernel is [1.0]
    if kernel_size == 1 {
        return Ok(image.clone());
    }

    let sigma = if sigma > 0.0 {
        sigma
    } else {
        sigma_for_kernel(kernel_size)
    };

    Ok(gaussian_blur_f32(image, sigma))
}

pub(crate) fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}
