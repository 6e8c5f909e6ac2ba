//! Splitting large images into overlapping tiles for fixed-scale models

use crate::error::EnhanceError;
use image::imageops::FilterType;
use image::{imageops, Rgb, RgbImage};

/// How a fixed-scale model walks over its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileOptions {
    /// Tile size, 0 processes the whole image at once
    pub tile: u32,
    pub tile_pad: u32,
    /// Reflect padding added at the bottom and right before inference
    pub pre_pad: u32,
}

/// Upscale `image` by `scale` using `infer`, a model that always enlarges by
/// `native_scale`. Other scales resample the native result with Lanczos3.
pub fn upscale<F>(
    image: &RgbImage,
    scale: u32,
    native_scale: u32,
    options: TileOptions,
    infer: F,
) -> Result<RgbImage, EnhanceError>
where
    F: FnMut(&RgbImage) -> Result<RgbImage, EnhanceError>,
{
    if scale == 0 {
        return Err(EnhanceError::service("super-resolution", "scale must be at least 1"));
    }

    let (width, height) = image.dimensions();
    let padded = pad_reflect(image, options.pre_pad);
    let mut output = process_tiles(&padded, options.tile, options.tile_pad, native_scale, infer)?;

    if options.pre_pad > 0 {
        output = imageops::crop_imm(&output, 0, 0, width * native_scale, height * native_scale)
            .to_image();
    }

    if scale == native_scale {
        return Ok(output);
    }
    tracing::debug!("Resampling {}x output to {}x", native_scale, scale);
    Ok(imageops::resize(
        &output,
        width * scale,
        height * scale,
        FilterType::Lanczos3,
    ))
}

/// Pad the bottom and right edges by mirroring (`dcb|abcd|cba`)
pub fn pad_reflect(image: &RgbImage, pad: u32) -> RgbImage {
    if pad == 0 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width + pad, height + pad, |x, y| {
        *image.get_pixel(mirror(x, width), mirror(y, height))
    })
}

fn mirror(i: u32, len: u32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = i % period;
    if i < len {
        i
    } else {
        period - i
    }
}

/// Run `infer` over `tile`-sized pieces of `image`, each extended by
/// `tile_pad` pixels of context, and stitch the `scale`-times larger results.
///
/// `tile == 0` processes the whole image in one call.
pub fn process_tiles<F>(
    image: &RgbImage,
    tile: u32,
    tile_pad: u32,
    scale: u32,
    mut infer: F,
) -> Result<RgbImage, EnhanceError>
where
    F: FnMut(&RgbImage) -> Result<RgbImage, EnhanceError>,
{
    let (width, height) = image.dimensions();
    if tile == 0 || (width <= tile && height <= tile) {
        let output = infer(image)?;
        check_scaled(&output, width, height, scale)?;
        return Ok(output);
    }

    let mut output = RgbImage::from_pixel(width * scale, height * scale, Rgb([0, 0, 0]));
    let tiles_x = width.div_ceil(tile);
    let tiles_y = height.div_ceil(tile);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile;
            let y0 = ty * tile;
            let x1 = (x0 + tile).min(width);
            let y1 = (y0 + tile).min(height);

            let px0 = x0.saturating_sub(tile_pad);
            let py0 = y0.saturating_sub(tile_pad);
            let px1 = (x1 + tile_pad).min(width);
            let py1 = (y1 + tile_pad).min(height);

            let patch = imageops::crop_imm(image, px0, py0, px1 - px0, py1 - py0).to_image();
            let upscaled = infer(&patch)?;
            check_scaled(&upscaled, patch.width(), patch.height(), scale)?;

            let piece = imageops::crop_imm(
                &upscaled,
                (x0 - px0) * scale,
                (y0 - py0) * scale,
                (x1 - x0) * scale,
                (y1 - y0) * scale,
            )
            .to_image();
            imageops::replace(&mut output, &piece, (x0 * scale) as i64, (y0 * scale) as i64);

            tracing::debug!(
                "Tile {}/{} done",
                ty * tiles_x + tx + 1,
                tiles_x * tiles_y
            );
        }
    }

    Ok(output)
}

fn check_scaled(output: &RgbImage, width: u32, height: u32, scale: u32) -> Result<(), EnhanceError> {
    if output.dimensions() != (width * scale, height * scale) {
        return Err(EnhanceError::service(
            "super-resolution",
            format!(
                "unexpected output size {}x{}, expected {}x{}",
                output.width(),
                output.height(),
                width * scale,
                height * scale
            ),
        ));
    }
    Ok(())
}
