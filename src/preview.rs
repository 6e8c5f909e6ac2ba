//! Display-sized copies of images and the two-pane before/after view

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Largest size of a freshly loaded image before it is shown
pub const LOAD_THUMBNAIL: (u32, u32) = (1000, 1000);
/// Size of each preview pane
pub const PANE_SIZE: (u32, u32) = (400, 400);

/// Scale an image so it fits inside `max_width` x `max_height`,
/// keeping the aspect ratio. Small images are enlarged.
pub fn fit_within(image: &RgbImage, max_width: u32, max_height: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let scale = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);

    if (new_width, new_height) == (width, height) {
        return image.clone();
    }
    imageops::resize(image, new_width, new_height, FilterType::Lanczos3)
}

/// Shrink an image to fit inside the bounds; never enlarges
pub fn thumbnail(image: &RgbImage, max_width: u32, max_height: u32) -> RgbImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image.clone();
    }
    fit_within(image, max_width, max_height)
}

/// Preview shown right after an image is loaded
pub fn load_preview(image: &RgbImage) -> RgbImage {
    let thumb = thumbnail(image, LOAD_THUMBNAIL.0, LOAD_THUMBNAIL.1);
    fit_within(&thumb, PANE_SIZE.0, PANE_SIZE.1)
}

/// Render the uploaded and upgraded images next to each other on a white
/// canvas, each fitted into its own pane and vertically centered
pub fn side_by_side(
    left: &RgbImage,
    right: &RgbImage,
    pane_width: u32,
    pane_height: u32,
    gap: u32,
) -> RgbImage {
    let left = fit_within(left, pane_width, pane_height);
    let right = fit_within(right, pane_width, pane_height);

    let mut canvas = RgbImage::from_pixel(pane_width * 2 + gap, pane_height, Rgb([255, 255, 255]));

    let place = |canvas: &mut RgbImage, pane: &RgbImage, pane_x: u32| {
        let x = pane_x + (pane_width - pane.width().min(pane_width)) / 2;
        let y = (pane_height - pane.height().min(pane_height)) / 2;
        imageops::replace(canvas, pane, x as i64, y as i64);
    };

    place(&mut canvas, &left, 0);
    place(&mut canvas, &right, pane_width + gap);
    canvas
}
