//! Face geometry shared by the face-restoration service
//!
//! Detection post-processing, five-point alignment to the 512x512 template
//! and pasting restored faces back into the upscaled image. Nothing here
//! depends on a model backend.

use crate::error::EnhanceError;
use crate::preprocessing::steps::gaussian;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::morphology::erode;

/// Side of the square aligned face crop
pub const FACE_SIZE: u32 = 512;

/// Landmark positions (eyes, nose, mouth corners) in the 512x512 aligned face
pub const FACE_TEMPLATE_512: [[f32; 2]; 5] = [
    [192.98138, 239.94708],
    [318.90277, 240.1936],
    [256.63416, 314.01935],
    [201.26117, 371.41043],
    [313.08905, 371.15118],
];

/// Fill color for crop pixels that fall outside the source image
pub const CROP_BORDER: Rgb<u8> = Rgb([132, 133, 135]);

/// A detected face in image pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    /// x1, y1, x2, y2
    pub bbox: [f32; 4],
    pub score: f32,
    /// left eye, right eye, nose, left mouth corner, right mouth corner
    pub landmarks: [[f32; 2]; 5],
}

impl FaceDetection {
    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    pub fn center(&self) -> [f32; 2] {
        [
            (self.bbox[0] + self.bbox[2]) / 2.0,
            (self.bbox[1] + self.bbox[3]) / 2.0,
        ]
    }

    pub fn eye_distance(&self) -> f32 {
        let [lx, ly] = self.landmarks[0];
        let [rx, ry] = self.landmarks[1];
        ((lx - rx).powi(2) + (ly - ry).powi(2)).sqrt()
    }

    /// Multiply every coordinate by `factor`
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            bbox: self.bbox.map(|v| v * factor),
            score: self.score,
            landmarks: self.landmarks.map(|[x, y]| [x * factor, y * factor]),
        }
    }
}

/// Intersection over union of two boxes
pub fn iou(a: &FaceDetection, b: &FaceDetection) -> f32 {
    let x1 = a.bbox[0].max(b.bbox[0]);
    let y1 = a.bbox[1].max(b.bbox[1]);
    let x2 = a.bbox[2].min(b.bbox[2]);
    let y2 = a.bbox[3].min(b.bbox[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Keep the highest scoring box of every overlapping group
pub fn non_max_suppression(
    mut detections: Vec<FaceDetection>,
    iou_threshold: f32,
) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<FaceDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Apply the eye-distance filter and optionally keep only the face whose
/// center is closest to the image center
pub fn select_faces(
    detections: Vec<FaceDetection>,
    eye_distance_threshold: f32,
    only_center_face: bool,
    image_size: (u32, u32),
) -> Vec<FaceDetection> {
    let faces: Vec<FaceDetection> = detections
        .into_iter()
        .filter(|d| d.eye_distance() >= eye_distance_threshold)
        .collect();

    if !only_center_face || faces.len() <= 1 {
        return faces;
    }

    let cx = image_size.0 as f32 / 2.0;
    let cy = image_size.1 as f32 / 2.0;
    let distance = |d: &FaceDetection| {
        let [x, y] = d.center();
        (x - cx).powi(2) + (y - cy).powi(2)
    };

    faces
        .into_iter()
        .min_by(|a, b| distance(a).total_cmp(&distance(b)))
        .into_iter()
        .collect()
}

/// 2x3 affine transform: `x' = a*x + b*y + c`, `y' = d*x + e*y + f`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(pub [f32; 6]);

impl Affine {
    pub fn apply(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        let [a, b, c, d, e, f] = self.0;
        [a * x + b * y + c, d * x + e * y + f]
    }

    pub fn invert(&self) -> Option<Affine> {
        let [a, b, c, d, e, f] = self.0;
        let det = a * e - b * d;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;
        Some(Affine([
            ia,
            ib,
            -(ia * c + ib * f),
            id,
            ie,
            -(id * c + ie * f),
        ]))
    }

    /// Scale the output coordinates
    pub fn scaled(&self, factor: f32) -> Affine {
        Affine(self.0.map(|v| v * factor))
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Affine {
        let [a, b, c, d, e, f] = self.0;
        Affine([a, b, c + dx, d, e, f + dy])
    }

    fn projection(&self) -> Result<Projection, EnhanceError> {
        let [a, b, c, d, e, f] = self.0;
        Projection::from_matrix([a, b, c, d, e, f, 0.0, 0.0, 1.0]).ok_or_else(|| {
            EnhanceError::service("face-restoration", "face transform is not invertible")
        })
    }
}

/// Least-squares similarity transform (rotation, uniform scale, translation)
/// mapping `src` points onto `dst` points
pub fn similarity_transform(src: &[[f32; 2]], dst: &[[f32; 2]]) -> Option<Affine> {
    if src.len() != dst.len() || src.len() < 2 {
        return None;
    }
    let n = src.len() as f32;

    let mean = |pts: &[[f32; 2]]| {
        let (sx, sy) = pts
            .iter()
            .fold((0.0f32, 0.0f32), |(ax, ay), [x, y]| (ax + x, ay + y));
        [sx / n, sy / n]
    };
    let [msx, msy] = mean(src);
    let [mdx, mdy] = mean(dst);

    let mut dot = 0.0f32;
    let mut cross = 0.0f32;
    let mut norm = 0.0f32;
    for ([sx, sy], [dx, dy]) in src.iter().zip(dst.iter()) {
        let (sx, sy) = (sx - msx, sy - msy);
        let (dx, dy) = (dx - mdx, dy - mdy);
        dot += sx * dx + sy * dy;
        cross += sx * dy - sy * dx;
        norm += sx * sx + sy * sy;
    }
    if norm <= f32::EPSILON {
        return None;
    }

    let a = dot / norm;
    let b = cross / norm;
    Some(Affine([
        a,
        -b,
        mdx - (a * msx - b * msy),
        b,
        a,
        mdy - (b * msx + a * msy),
    ]))
}

/// Transform that aligns a detected face onto the 512x512 template
pub fn alignment_transform(face: &FaceDetection) -> Result<Affine, EnhanceError> {
    similarity_transform(&face.landmarks, &FACE_TEMPLATE_512).ok_or_else(|| {
        EnhanceError::service("face-restoration", "degenerate face landmarks")
    })
}

/// Cut the aligned face out of `image`
pub fn warp_face(image: &RgbImage, affine: &Affine) -> Result<RgbImage, EnhanceError> {
    let projection = affine.projection()?;
    let mut out = RgbImage::from_pixel(FACE_SIZE, FACE_SIZE, CROP_BORDER);
    warp_into(image, &projection, Interpolation::Bilinear, CROP_BORDER, &mut out);
    Ok(out)
}

/// Inverse of an alignment transform, expressed in the coordinates of an
/// image `upscale` times larger than the one the face was cropped from
pub fn paste_transform(alignment: &Affine, upscale: f32) -> Result<Affine, EnhanceError> {
    let inverse = alignment.invert().ok_or_else(|| {
        EnhanceError::service("face-restoration", "face transform is not invertible")
    })?;
    let inverse = inverse.scaled(upscale);
    if upscale > 1.0 {
        let offset = 0.5 * upscale;
        Ok(inverse.translated(offset, offset))
    } else {
        Ok(inverse)
    }
}

/// Blend a restored face back into `background` through `inverse`,
/// feathering the seam with an eroded, blurred mask
pub fn paste_face(
    background: &mut RgbImage,
    face: &RgbImage,
    inverse: &Affine,
    upscale: f32,
) -> Result<(), EnhanceError> {
    let (bg_width, bg_height) = background.dimensions();
    let (fw, fh) = (face.width() as f32, face.height() as f32);

    let corners = [[0.0, 0.0], [fw, 0.0], [0.0, fh], [fw, fh]].map(|p| inverse.apply(p));
    let margin = 4.0;
    let min_x = corners.iter().map(|p| p[0]).fold(f32::MAX, f32::min) - margin;
    let min_y = corners.iter().map(|p| p[1]).fold(f32::MAX, f32::min) - margin;
    let max_x = corners.iter().map(|p| p[0]).fold(f32::MIN, f32::max) + margin;
    let max_y = corners.iter().map(|p| p[1]).fold(f32::MIN, f32::max) + margin;

    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(bg_width);
    let y1 = (max_y.ceil().max(0.0) as u32).min(bg_height);
    if x1 <= x0 || y1 <= y0 {
        return Ok(());
    }
    let (region_w, region_h) = (x1 - x0, y1 - y0);

    // Work in a window around the face instead of the whole background
    let local = inverse.translated(-(x0 as f32), -(y0 as f32)).projection()?;

    let mut warped_face = RgbImage::new(region_w, region_h);
    warp_into(face, &local, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut warped_face);

    let full_mask = GrayImage::from_pixel(face.width(), face.height(), Luma([255]));
    let mut mask = GrayImage::new(region_w, region_h);
    warp_into(&full_mask, &local, Interpolation::Bilinear, Luma([0]), &mut mask);

    let seam = upscale.round().clamp(0.0, 255.0) as u8;
    let mask = if seam > 0 {
        erode(&mask, Norm::LInf, seam)
    } else {
        mask
    };

    let face_area: f64 = mask.pixels().map(|p| p.0[0] as f64 / 255.0).sum();
    let edge = (face_area.sqrt() as u32) / 20;

    let center = if edge > 0 {
        erode(&mask, Norm::LInf, edge.min(255) as u8)
    } else {
        mask.clone()
    };
    let blur_size = edge * 2;
    let soft = if blur_size > 0 {
        gaussian_blur_f32(&center, gaussian::sigma_for_kernel(blur_size + 1))
    } else {
        center
    };

    for y in 0..region_h {
        for x in 0..region_w {
            let s = soft.get_pixel(x, y).0[0] as f32 / 255.0;
            if s <= 0.0 {
                continue;
            }
            let m = mask.get_pixel(x, y).0[0] as f32 / 255.0;
            let f = warped_face.get_pixel(x, y).0;
            let bg = background.get_pixel_mut(x0 + x, y0 + y);
            for c in 0..3 {
                let v = s * m * f[c] as f32 + (1.0 - s) * bg.0[c] as f32;
                bg.0[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Ok(())
}
