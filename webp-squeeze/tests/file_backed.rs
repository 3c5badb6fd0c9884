//! The engine over the on-disk store and a real image directory

use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use webp_squeeze::catalog::LocalLibrary;
use webp_squeeze::config::SqueezeConfig;
use webp_squeeze::jobs::{JobEngine, JobStatus};
use webp_squeeze::store::{FileStore, StateStore};
use webp_squeeze::testing::drive_to_completion;

fn write_png(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 128]))
        .save(path)
        .unwrap();
}

async fn engine_at(library: &Path, state: &Path) -> JobEngine {
    let store: Arc<dyn StateStore> = Arc::new(FileStore::open(state).await.unwrap());
    let library = Arc::new(LocalLibrary::new(library, store.clone()));
    JobEngine::new(store, library.clone(), library, &SqueezeConfig::default())
}

#[tokio::test]
async fn test_job_survives_reopening_the_store() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    let state = dir.path().join("state").join("squeeze.json");
    for name in ["a.png", "b.png", "2024/c.png", "2024/d.PNG"] {
        write_png(&uploads.join(name));
    }
    std::fs::write(uploads.join("2024/broken.jpg"), b"not a jpeg").unwrap();

    let engine = engine_at(&uploads, &state).await;
    let job = engine.create_job("full").await.unwrap();
    assert_eq!(job.total, 5);
    engine.process_batch(Some(2)).await.unwrap();
    drop(engine);

    let engine = engine_at(&uploads, &state).await;
    assert!(engine.recover_if_needed().await.unwrap().is_noop());
    let progress = engine.progress().await.unwrap();
    assert_eq!(progress.job_id, job.id);
    assert_eq!(progress.remaining, 3);

    let reports = drive_to_completion(&engine, 2).await.unwrap();
    let last = reports.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.done, 4);
    assert_eq!(last.failed, 1);

    assert!(uploads.join("a.png.webp").exists());
    assert!(uploads.join("2024/d.PNG.webp").exists());
    assert!(!uploads.join("2024/broken.jpg.webp").exists());
    assert!(uploads.join("2024/broken.jpg").exists());

    engine.recover_if_needed().await.unwrap();
    let stats = engine.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_items, 5);
    assert_eq!(stats.optimized_items, 4);
    assert_eq!(stats.failed_items, 1);
    assert!(stats.active_job.is_none());

    let retry = engine.create_job("retry").await.unwrap();
    assert_eq!(retry.total, 1);
}

#[tokio::test]
async fn test_wipe_resets_persisted_state() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    let state = dir.path().join("squeeze.json");
    write_png(&uploads.join("only.png"));

    let engine = engine_at(&uploads, &state).await;
    engine.create_job("full").await.unwrap();
    engine.process_batch(Some(1)).await.unwrap();
    assert_eq!(engine.history_log().entries().await.unwrap().len(), 1);

    engine.wipe().await.unwrap();

    let engine = engine_at(&uploads, &state).await;
    assert!(engine.history_log().entries().await.unwrap().is_empty());
    assert_eq!(engine.history_log().total_saved_bytes().await.unwrap(), 0);
    assert!(engine.progress().await.is_err());
}

#[tokio::test]
async fn test_cancel_from_second_handle_reaches_the_first() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    let state = dir.path().join("squeeze.json");
    for name in ["a.png", "b.png", "c.png"] {
        write_png(&uploads.join(name));
    }

    let server = engine_at(&uploads, &state).await;
    let cli = engine_at(&uploads, &state).await;

    let job = server.create_job("full").await.unwrap();
    server.process_batch(Some(1)).await.unwrap();

    let cancelled = cli.cancel_job().await.unwrap();
    assert_eq!(cancelled.id, job.id);
    assert_eq!(cancelled.done, 1);

    let err = server.process_batch(Some(1)).await.unwrap_err();
    assert!(matches!(err, webp_squeeze::jobs::JobError::NoActiveJob));
    server.recover_if_needed().await.unwrap();

    let reopened = engine_at(&uploads, &state).await;
    let entries = reopened.history_log().entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, JobStatus::Cancelled);
    assert!(reopened.progress().await.is_err());
}
