use crate::error::EnhanceError;
use image::{Rgb, RgbImage};

/// Weight of the bilateral-smoothed branch in the first blend
pub const BILATERAL_WEIGHT: f32 = 0.7;
/// Weight of the Gaussian-blurred branch in the first blend
pub const GAUSSIAN_WEIGHT: f32 = 0.6;
/// Weight of the first blend's result in the second blend
pub const COMBINED_WEIGHT: f32 = 0.8;
/// Weight of the edge map in the second blend
pub const EDGE_WEIGHT: f32 = 0.01;
/// Offset added to both blends
pub const GAMMA: f32 = 0.0;

/// Per-pixel `a * alpha + b * beta + gamma`, rounded and saturated to u8
pub fn add_weighted(
    a: &RgbImage,
    alpha: f32,
    b: &RgbImage,
    beta: f32,
    gamma: f32,
) -> Result<RgbImage, EnhanceError> {
    if a.dimensions() != b.dimensions() {
        return Err(EnhanceError::Preprocessing(format!(
            "Cannot blend {}x{} with {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }

    Ok(RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let pa = a.get_pixel(x, y).0;
        let pb = b.get_pixel(x, y).0;
        let mix = |c: usize| saturate(pa[c] as f32 * alpha + pb[c] as f32 * beta + gamma);
        Rgb([mix(0), mix(1), mix(2)])
    }))
}

/// Blend the three filter branches with the fixed pre-filter weights
pub fn combine(
    bilateral: &RgbImage,
    gaussian: &RgbImage,
    edges: &RgbImage,
) -> Result<RgbImage, EnhanceError> {
    let smoothed = add_weighted(bilateral, BILATERAL_WEIGHT, gaussian, GAUSSIAN_WEIGHT, GAMMA)?;
    add_weighted(&smoothed, COMBINED_WEIGHT, edges, EDGE_WEIGHT, GAMMA)
}

fn saturate(v: f32) -> u8 {
    v.round_ties_even().clamp(0.0, 255.0) as u8
}
