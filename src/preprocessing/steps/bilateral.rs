use crate::error::EnhanceError;
use image::{Rgb, RgbImage};

/// Neighbourhood diameter in pixels
pub const DIAMETER: u32 = 9;
pub const SIGMA_COLOR: f32 = 75.0;
pub const SIGMA_SPACE: f32 = 75.0;

/// Edge-preserving smoothing of the whole image
pub fn apply(image: &RgbImage) -> Result<RgbImage, EnhanceError> {
    Ok(bilateral(image, DIAMETER, SIGMA_COLOR, SIGMA_SPACE))
}

/// Bilateral filter over a circular window.
///
/// Range distance is the sum of absolute channel differences; borders are
/// reflected without repeating the edge pixel.
pub fn bilateral(image: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    let radius = (diameter / 2).max(1) as i64;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    // Range weights indexed by L1 color distance (0..=765)
    let color_weights: Vec<f32> = (0..=255 * 3)
        .map(|d: u32| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut window = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist_sq = (dx * dx + dy * dy) as f32;
            if dist_sq.sqrt() > radius as f32 {
                continue;
            }
            window.push((dx, dy, (dist_sq * space_coeff).exp()));
        }
    }

    RgbImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y).0;
        let mut sum = [0.0f32; 3];
        let mut weight_sum = 0.0f32;

        for &(dx, dy, space_weight) in &window {
            let sx = reflect_101(x as i64 + dx, width);
            let sy = reflect_101(y as i64 + dy, height);
            let p = image.get_pixel(sx, sy).0;

            let dist = (0..3)
                .map(|c| (p[c] as i32 - center[c] as i32).unsigned_abs())
                .sum::<u32>();
            let weight = space_weight * color_weights[dist as usize];

            for c in 0..3 {
                sum[c] += p[c] as f32 * weight;
            }
            weight_sum += weight;
        }

        let out = |c: usize| (sum[c] / weight_sum).round().clamp(0.0, 255.0) as u8;
        Rgb([out(0), out(1), out(2)])
    })
}

/// Map an out-of-range coordinate back inside `0..len` by mirroring
/// around the edge pixels (`dcb|abcd|cba`).
fn reflect_101(mut i: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * (len - 1) - i;
        } else {
            return i as u32;
        }
    }
}
