use image::imageops::{self, FilterType};
use image::RgbImage;
use photo_enhance::error::EnhanceError;
use photo_enhance::pipeline::EnhancementPipeline;
use photo_enhance::service::ImageService;
use photo_enhance::session::Notifier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Stand-in model service that resamples by the requested scale
pub struct Scale {
    pub name: &'static str,
    pub fail: Arc<AtomicBool>,
}

impl Scale {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ImageService for Scale {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "nearest-neighbour resampling"
    }

    fn native_scale(&self) -> u32 {
        1
    }

    fn enhance(&self, image: &RgbImage, scale: u32) -> Result<RgbImage, EnhanceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EnhanceError::service(self.name, "model exploded"));
        }
        Ok(imageops::resize(
            image,
            image.width() * scale,
            image.height() * scale,
            FilterType::Nearest,
        ))
    }
}

/// Pipeline over two resampling stubs, plus the switch that makes face
/// restoration fail
#[allow(dead_code)]
pub fn stub_pipeline() -> (Arc<EnhancementPipeline>, Arc<AtomicBool>) {
    let face = Scale::new("face-stub");
    let fail = face.fail.clone();
    let pipeline = EnhancementPipeline::new(Arc::new(Scale::new("sr-stub")), Arc::new(face));
    (Arc::new(pipeline), fail)
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub errors: Mutex<Vec<(String, String)>>,
    pub infos: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn error(&self, title: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }

    fn info(&self, title: &str, message: &str) {
        self.infos
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn last_error(&self) -> Option<String> {
        self.errors.lock().unwrap().last().map(|(_, m)| m.clone())
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

/// Small gradient image
pub fn sample_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 20) as u8, (y * 30) as u8, 128])
    })
}
