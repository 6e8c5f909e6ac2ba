//! Face restoration flow, independent of the models that detect and restore

use super::face::{self, FaceDetection, FACE_SIZE};
use crate::error::EnhanceError;
use crate::service::ImageService;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Shortest side the detector sees; smaller images are enlarged first
pub const DETECTION_SIZE: u32 = 640;
pub const DETECTION_THRESHOLD: f32 = 0.97;
pub const NMS_THRESHOLD: f32 = 0.4;
/// Faces whose eyes are closer than this many pixels are ignored
pub const EYE_DISTANCE_THRESHOLD: f32 = 5.0;

const NAME: &str = "gfpgan";

#[derive(Debug, Clone, Copy, Default)]
pub struct FaceRestoreOptions {
    /// The input already is an aligned 512x512 face
    pub has_aligned: bool,
    pub only_center_face: bool,
}

/// Factor the image is resized by before detection. Never shrinks.
pub fn detection_factor(width: u32, height: u32) -> f32 {
    (DETECTION_SIZE as f32 / width.min(height).max(1) as f32).max(1.0)
}

/// Run `detect` on a detection-sized copy of `image` and return the selected
/// faces in `image` coordinates
pub fn detect_faces<D>(
    image: &RgbImage,
    only_center_face: bool,
    detect: D,
) -> Result<Vec<FaceDetection>, EnhanceError>
where
    D: FnOnce(&RgbImage) -> Result<Vec<FaceDetection>, EnhanceError>,
{
    let factor = detection_factor(image.width(), image.height());
    let detections = if factor > 1.0 {
        let width = (image.width() as f32 * factor) as u32;
        let height = (image.height() as f32 * factor) as u32;
        let resized = imageops::resize(image, width, height, FilterType::Triangle);
        detect(&resized)?
            .into_iter()
            .map(|d| d.scaled(1.0 / factor))
            .collect()
    } else {
        detect(image)?
    };

    let detections = face::non_max_suppression(detections, NMS_THRESHOLD);
    Ok(face::select_faces(
        detections,
        EYE_DISTANCE_THRESHOLD,
        only_center_face,
        image.dimensions(),
    ))
}

/// Upscale `image` by `scale` with the upsampler, or Lanczos3 without one,
/// forcing the exact target size
pub fn upscale_background(
    image: &RgbImage,
    scale: u32,
    upsampler: Option<&dyn ImageService>,
) -> Result<RgbImage, EnhanceError> {
    let (width, height) = (image.width() * scale, image.height() * scale);
    let background = match upsampler {
        Some(upsampler) => upsampler.enhance(image, scale)?,
        None => imageops::resize(image, width, height, FilterType::Lanczos3),
    };

    if background.dimensions() == (width, height) {
        Ok(background)
    } else {
        tracing::debug!(
            "Background upsampler returned {}x{}, resizing to {}x{}",
            background.width(),
            background.height(),
            width,
            height
        );
        Ok(imageops::resize(&background, width, height, FilterType::Lanczos3))
    }
}

/// Detect, align, restore and paste back every face of `image` into a
/// background `scale` times larger.
///
/// A face whose restoration fails is pasted back unrestored. In aligned mode
/// the input is treated as a single face and only the restored face is returned.
pub fn restore_faces<D, R>(
    image: &RgbImage,
    scale: u32,
    options: FaceRestoreOptions,
    upsampler: Option<&dyn ImageService>,
    detect: D,
    mut restore: R,
) -> Result<RgbImage, EnhanceError>
where
    D: FnOnce(&RgbImage) -> Result<Vec<FaceDetection>, EnhanceError>,
    R: FnMut(&RgbImage) -> Result<RgbImage, EnhanceError>,
{
    if scale == 0 {
        return Err(EnhanceError::service(NAME, "scale must be at least 1"));
    }

    if options.has_aligned {
        let aligned = imageops::resize(image, FACE_SIZE, FACE_SIZE, FilterType::Triangle);
        return restore(&aligned);
    }

    let faces = detect_faces(image, options.only_center_face, detect)?;
    tracing::info!("Detected {} face(s)", faces.len());

    let mut restored = Vec::with_capacity(faces.len());
    for (index, detection) in faces.iter().enumerate() {
        let alignment = face::alignment_transform(detection)?;
        let crop = face::warp_face(image, &alignment)?;
        let face = match restore(&crop) {
            Ok(face) => face,
            Err(e) => {
                tracing::warn!("Failed to restore face {}: {}", index, e);
                crop
            }
        };
        restored.push((face, alignment));
    }

    let mut background = upscale_background(image, scale, upsampler)?;
    let upscale = scale as f32;
    for (face, alignment) in &restored {
        let inverse = face::paste_transform(alignment, upscale)?;
        face::paste_face(&mut background, face, &inverse, upscale)?;
    }

    Ok(background)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::face::FACE_TEMPLATE_512;
    use image::Rgb;
    use std::cell::RefCell;

    /// A face covering the middle of a 200x200 image
    fn centered_face() -> FaceDetection {
        FaceDetection {
            bbox: [36.0, 36.0, 164.0, 164.0],
            score: 0.99,
            landmarks: FACE_TEMPLATE_512.map(|[x, y]| [x * 0.25 + 36.0, y * 0.25 + 36.0]),
        }
    }

    /// Detector that reports `face` in the coordinates of whatever it is given
    fn detector(
        face: FaceDetection,
        source_width: u32,
    ) -> impl FnOnce(&RgbImage) -> Result<Vec<FaceDetection>, EnhanceError> {
        move |img: &RgbImage| Ok(vec![face.scaled(img.width() as f32 / source_width as f32)])
    }

    fn gray(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))
    }

    /// Upsampler that ignores the requested scale
    struct WrongSize;

    impl ImageService for WrongSize {
        fn name(&self) -> &'static str {
            "wrong-size"
        }

        fn description(&self) -> &'static str {
            "returns its input unchanged"
        }

        fn native_scale(&self) -> u32 {
            1
        }

        fn enhance(&self, image: &RgbImage, _scale: u32) -> Result<RgbImage, EnhanceError> {
            Ok(image.clone())
        }
    }

    #[test]
    fn test_detection_factor_only_enlarges() {
        assert_eq!(detection_factor(4000, 3000), 1.0);
        assert_eq!(detection_factor(640, 2000), 1.0);
        assert!((detection_factor(400, 320) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_large_images_are_detected_at_full_resolution() {
        let image = gray(1600, 1200);
        let seen = RefCell::new(None);
        detect_faces(&image, false, |img: &RgbImage| {
            *seen.borrow_mut() = Some(img.dimensions());
            Ok(Vec::new())
        })
        .unwrap();
        assert_eq!(*seen.borrow(), Some((1600, 1200)));
    }

    #[test]
    fn test_small_images_are_enlarged_and_mapped_back() {
        let image = gray(200, 200);
        let seen = RefCell::new(None);
        let face = centered_face();
        let faces = detect_faces(&image, false, |img: &RgbImage| {
            *seen.borrow_mut() = Some(img.dimensions());
            detector(face.clone(), 200)(img)
        })
        .unwrap();

        assert_eq!(*seen.borrow(), Some((640, 640)));
        assert_eq!(faces.len(), 1);
        for (got, want) in faces[0].bbox.iter().zip(centered_face().bbox.iter()) {
            assert!((got - want).abs() < 1e-3);
        }
    }

    #[test]
    fn test_failed_restoration_keeps_the_crop() {
        let image = RgbImage::from_fn(200, 200, |x, y| Rgb([x as u8, y as u8, 100]));

        let kept = restore_faces(
            &image,
            2,
            FaceRestoreOptions::default(),
            None,
            detector(centered_face(), 200),
            |_: &RgbImage| Err(EnhanceError::service("gfpgan", "out of memory")),
        )
        .unwrap();
        let identity = restore_faces(
            &image,
            2,
            FaceRestoreOptions::default(),
            None,
            detector(centered_face(), 200),
            |crop: &RgbImage| Ok(crop.clone()),
        )
        .unwrap();

        assert_eq!(kept.dimensions(), (400, 400));
        assert_eq!(kept, identity);
    }

    #[test]
    fn test_restored_face_is_pasted_back() {
        let image = gray(200, 200);
        let calls = RefCell::new(0);

        let output = restore_faces(
            &image,
            2,
            FaceRestoreOptions::default(),
            None,
            detector(centered_face(), 200),
            |crop: &RgbImage| {
                *calls.borrow_mut() += 1;
                assert_eq!(crop.dimensions(), (FACE_SIZE, FACE_SIZE));
                Ok(RgbImage::from_pixel(FACE_SIZE, FACE_SIZE, Rgb([250, 250, 250])))
            },
        )
        .unwrap();

        assert_eq!(*calls.borrow(), 1);
        // Face center brightened, far corner untouched
        assert!(output.get_pixel(200, 200).0[0] > 200);
        let corner = output.get_pixel(2, 2).0[0];
        assert!((88..=92).contains(&corner), "corner changed to {}", corner);
    }

    #[test]
    fn test_wrong_size_background_is_resized() {
        let image = gray(30, 20);
        let output = restore_faces(
            &image,
            3,
            FaceRestoreOptions::default(),
            Some(&WrongSize),
            |_: &RgbImage| Ok(Vec::new()),
            |_: &RgbImage| panic!("no faces to restore"),
        )
        .unwrap();
        assert_eq!(output.dimensions(), (90, 60));
    }

    #[test]
    fn test_aligned_input_returns_restored_face() {
        let image = gray(256, 256);
        let output = restore_faces(
            &image,
            10,
            FaceRestoreOptions {
                has_aligned: true,
                only_center_face: false,
            },
            None,
            |_: &RgbImage| panic!("aligned input skips detection"),
            |crop: &RgbImage| {
                assert_eq!(crop.dimensions(), (FACE_SIZE, FACE_SIZE));
                Ok(RgbImage::from_pixel(FACE_SIZE, FACE_SIZE, Rgb([1, 2, 3])))
            },
        )
        .unwrap();
        assert_eq!(output.dimensions(), (FACE_SIZE, FACE_SIZE));
        assert_eq!(output.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn test_zero_scale_is_rejected() {
        let result = restore_faces(
            &gray(4, 4),
            0,
            FaceRestoreOptions::default(),
            None,
            |_: &RgbImage| Ok(Vec::new()),
            |crop: &RgbImage| Ok(crop.clone()),
        );
        assert!(matches!(result, Err(EnhanceError::Service { .. })));
    }
}
