//! Background enhancement with a progress channel and cancellation

use crate::error::EnhanceError;
use crate::pipeline::{CancellationToken, EnhancementPipeline};
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to an enhancement running on the blocking thread pool
pub struct EnhancementJob {
    /// Progress checkpoints (50, then 100)
    pub progress: mpsc::UnboundedReceiver<u8>,
    token: CancellationToken,
    handle: JoinHandle<Result<RgbImage, EnhanceError>>,
}

impl EnhancementJob {
    /// Start enhancing `image`. Must be called from within a tokio runtime.
    pub fn spawn(pipeline: Arc<EnhancementPipeline>, image: RgbImage) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let job_token = token.clone();

        let handle = tokio::task::spawn_blocking(move || {
            pipeline.run(
                &image,
                |percent| {
                    // Receiver may already be gone, the result still matters
                    let _ = tx.send(percent);
                },
                Some(&job_token),
            )
        });

        Self {
            progress: rx,
            token,
            handle,
        }
    }

    /// Request cancellation. Takes effect before the next stage starts.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the enhancement to finish
    pub async fn wait(self) -> Result<RgbImage, EnhanceError> {
        self.handle
            .await
            .map_err(|e| EnhanceError::Internal(format!("Enhancement task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ImageService;
    use std::sync::mpsc as std_mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Scale;

    impl ImageService for Scale {
        fn name(&self) -> &'static str {
            "scale"
        }
        fn description(&self) -> &'static str {
            "nearest-neighbour upscale"
        }
        fn native_scale(&self) -> u32 {
            1
        }
        fn enhance(&self, image: &RgbImage, scale: u32) -> Result<RgbImage, EnhanceError> {
            Ok(image::imageops::resize(
                image,
                image.width() * scale,
                image.height() * scale,
                image::imageops::FilterType::Nearest,
            ))
        }
    }

    /// Blocks inside `enhance` until released, so a test can cancel mid-run
    struct Gate {
        entered: Mutex<Option<std_mpsc::Sender<()>>>,
        release: Mutex<std_mpsc::Receiver<()>>,
    }

    impl ImageService for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }
        fn description(&self) -> &'static str {
            "waits for the test"
        }
        fn native_scale(&self) -> u32 {
            1
        }
        fn enhance(&self, image: &RgbImage, _scale: u32) -> Result<RgbImage, EnhanceError> {
            if let Some(tx) = self.entered.lock().unwrap().take() {
                let _ = tx.send(());
            }
            let _ = self
                .release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5));
            Ok(image.clone())
        }
    }

    #[tokio::test]
    async fn test_job_reports_progress_and_result() {
        let pipeline = Arc::new(EnhancementPipeline::new(Arc::new(Scale), Arc::new(Scale)));
        let mut job = EnhancementJob::spawn(pipeline, RgbImage::new(3, 2));

        let mut seen = Vec::new();
        while let Some(p) = job.progress.recv().await {
            seen.push(p);
        }
        let image = job.wait().await.unwrap();

        assert_eq!(seen, vec![50, 100]);
        assert_eq!(image.dimensions(), (120, 80));
    }

    #[tokio::test]
    async fn test_job_cancelled_mid_run() {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let gate = Gate {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        };
        let pipeline = Arc::new(EnhancementPipeline::new(Arc::new(gate), Arc::new(Scale)));
        let mut job = EnhancementJob::spawn(pipeline, RgbImage::new(4, 4));

        // Wait until super-resolution is running, then cancel and let it finish
        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        job.cancel();
        release_tx.send(()).unwrap();

        let mut seen = Vec::new();
        while let Some(p) = job.progress.recv().await {
            seen.push(p);
        }
        let result = job.wait().await;

        assert!(matches!(result, Err(EnhanceError::Cancelled)));
        assert_eq!(seen, vec![50]);
    }
}
