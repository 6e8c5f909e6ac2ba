use crate::error::EnhanceError;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;

/// Canny hysteresis thresholds
pub const LOW_THRESHOLD: f32 = 80.0;
pub const HIGH_THRESHOLD: f32 = 180.0;

/// Compute a Canny edge map over all three channels and expand it back to
/// three identical channels so it can be blended with the color branches.
///
/// A pixel is an edge if it is an edge in any channel, so boundaries between
/// colors of equal brightness are kept. imageproc's Canny smooths each
/// channel with a sigma 1.4 Gaussian and uses the L2 gradient norm first,
/// which thins edges slightly compared to an unsmoothed L1 detector.
pub fn apply(image: &RgbImage) -> Result<RgbImage, EnhanceError> {
    let (width, height) = image.dimensions();
    let channel_edges: Vec<GrayImage> = (0..3)
        .map(|c| {
            let channel = GrayImage::from_fn(width, height, |x, y| {
                image::Luma([image.get_pixel(x, y).0[c]])
            });
            canny(&channel, LOW_THRESHOLD, HIGH_THRESHOLD)
        })
        .collect();

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let v = channel_edges
            .iter()
            .map(|edges| edges.get_pixel(x, y).0[0])
            .max()
            .unwrap_or(0);
        Rgb([v, v, v])
    }))
}
