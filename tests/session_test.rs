mod common;

use common::{sample_image, stub_pipeline, RecordingNotifier};
use photo_enhance::session::Session;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn session_with_notifier() -> (Session, Arc<RecordingNotifier>, Arc<AtomicBool>) {
    let (pipeline, fail) = stub_pipeline();
    let notifier = Arc::new(RecordingNotifier::default());
    (Session::new(pipeline, notifier.clone()), notifier, fail)
}

fn write_sample(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    sample_image(width, height).save(&path).unwrap();
    path
}

#[test]
fn test_missing_image_reports_error() {
    let (mut session, notifier, _) = session_with_notifier();

    let preview = session.load_image(Path::new("/nonexistent/photo.png"));

    assert!(preview.is_none());
    assert!(session.uploaded_image_path().is_none());
    let message = notifier.last_error().unwrap();
    assert!(message.starts_with("Cannot load image"), "got: {}", message);
}

#[test]
fn test_enhance_before_upload_is_rejected() {
    let (mut session, notifier, _) = session_with_notifier();

    assert!(session.enhance(|_| {}).is_none());
    assert_eq!(
        notifier.last_error().as_deref(),
        Some("No image has been uploaded yet!")
    );
}

#[test]
fn test_save_before_enhance_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (session, notifier, _) = session_with_notifier();
    let target = dir.path().join("out.jpg");

    assert!(!session.can_save());
    assert!(session.save_image(&target).is_none());
    assert!(!target.exists());
    assert_eq!(
        notifier.last_error().as_deref(),
        Some("No image has been upgraded yet!")
    );
}

#[test]
fn test_load_enhance_save_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_sample(dir.path(), "portrait.png", 8, 4);
    let (mut session, notifier, _) = session_with_notifier();

    let preview = session.load_image(&input).unwrap();
    assert_eq!(preview.dimensions(), (400, 200));

    let mut checkpoints = Vec::new();
    let enhanced = session.enhance(|p| checkpoints.push(p)).unwrap();
    assert_eq!(enhanced.dimensions(), (320, 160));
    assert_eq!(checkpoints, vec![50, 100]);
    assert!(session.can_save());

    // No extension: saved as JPEG
    let saved = session.save_image(&dir.path().join("result")).unwrap();
    assert_eq!(saved, dir.path().join("result.jpg"));

    let reloaded = image::open(&saved).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (320, 160));

    let infos = notifier.infos.lock().unwrap();
    assert_eq!(infos.len(), 1);
    assert!(infos[0].1.starts_with("Image saved at"));
    assert_eq!(notifier.error_count(), 0);
}

#[test]
fn test_failed_enhancement_keeps_previous_result() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_sample(dir.path(), "first.png", 4, 4);
    let second = write_sample(dir.path(), "second.png", 8, 4);
    let (mut session, notifier, fail) = session_with_notifier();

    session.load_image(&first).unwrap();
    session.enhance(|_| {}).unwrap();

    session.load_image(&second).unwrap();
    fail.store(true, Ordering::SeqCst);
    let mut checkpoints = Vec::new();
    assert!(session.enhance(|p| checkpoints.push(p)).is_none());

    assert_eq!(checkpoints, vec![50]);
    assert_eq!(session.upgraded_image().unwrap().dimensions(), (160, 160));
    assert!(notifier
        .last_error()
        .unwrap()
        .contains("face-stub failed: model exploded"));

    // Session stays usable
    fail.store(false, Ordering::SeqCst);
    assert_eq!(
        session.enhance(|_| {}).unwrap().dimensions(),
        (320, 160)
    );
}

#[test]
fn test_unwritable_save_path_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_sample(dir.path(), "in.png", 4, 4);
    let (mut session, notifier, _) = session_with_notifier();

    session.load_image(&input).unwrap();
    session.enhance(|_| {}).unwrap();

    let target = dir.path().join("missing-dir").join("out.jpg");
    assert!(session.save_image(&target).is_none());
    assert!(notifier.last_error().unwrap().starts_with("Cannot save image"));
    assert!(session.can_save());
}

#[tokio::test]
async fn test_background_enhancement() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_sample(dir.path(), "bg.png", 5, 3);
    let (mut session, _, _) = session_with_notifier();

    session.load_image(&input).unwrap();
    let mut job = session.spawn_enhancement().unwrap();

    let mut checkpoints = Vec::new();
    while let Some(percent) = job.progress.recv().await {
        checkpoints.push(percent);
    }
    assert_eq!(checkpoints, vec![50, 100]);

    let enhanced = session.finish(job).await.unwrap();
    assert_eq!(enhanced.dimensions(), (200, 120));
}

#[tokio::test]
async fn test_spawn_without_upload() {
    let (session, notifier, _) = session_with_notifier();
    assert!(session.spawn_enhancement().is_none());
    assert_eq!(notifier.error_count(), 1);
}

#[tokio::test]
async fn test_enhancing_decoded_upload() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_sample(dir.path(), "decoded.png", 8, 4);
    let (mut session, notifier, _) = session_with_notifier();

    let image = image::open(&input).unwrap().into_rgb8();
    let preview = session.accept_upload(&input, &image);
    assert_eq!(preview.dimensions(), (400, 200));
    assert_eq!(session.uploaded_image_path(), Some(input.as_path()));

    // The file is no longer needed once decoded
    std::fs::remove_file(&input).unwrap();

    let job = session.spawn_enhancement_of(image).unwrap();
    let enhanced = session.finish(job).await.unwrap();
    assert_eq!(enhanced.dimensions(), (320, 160));
    assert_eq!(notifier.error_count(), 0);
}

#[tokio::test]
async fn test_enhancing_decoded_pixels_requires_upload() {
    let (session, notifier, _) = session_with_notifier();
    assert!(session.spawn_enhancement_of(sample_image(4, 4)).is_none());
    assert_eq!(
        notifier.last_error().as_deref(),
        Some("No image has been uploaded yet!")
    );
}
