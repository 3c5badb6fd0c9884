//! CLI commands against a library directory and an on-disk store

use std::path::Path;
use tempfile::TempDir;
use webp_squeeze_cli_lib::commands::{
    HistoryCommand, JobsCommand, StatsCommand, UploadCommand, WipeCommand,
};
use webp_squeeze_cli_lib::{GlobalOptions, Runtime};

/// Writes a config file pointing the store into `dir`
fn options(dir: &Path, extra: &str) -> GlobalOptions {
    let state = dir.join("state.json");
    let config = dir.join("squeeze.toml");
    std::fs::write(
        &config,
        format!(
            "[store]\nbackend = \"file\"\npath = \"{}\"\n{extra}",
            state.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let mut options = GlobalOptions::for_library(dir.join("uploads"));
    options.config = Some(config);
    options
}

#[tokio::test]
async fn test_run_then_reopen() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("uploads/2024")).unwrap();
    std::fs::write(dir.path().join("uploads/2024/broken.png"), b"not a png").unwrap();
    let options = options(dir.path(), "");

    let runtime = Runtime::open(&options).await.unwrap();
    JobsCommand::Run {
        size: Some(10),
        create: Some("full".to_string()),
    }
    .execute(&runtime)
    .await
    .unwrap();
    drop(runtime);

    let runtime = Runtime::open(&options).await.unwrap();
    let entries = runtime.engine().history_log().entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].failed, 1);

    StatsCommand { json: true }.execute(&runtime).await.unwrap();
    HistoryCommand::List {
        page: 1,
        limit: 5,
        job_type: None,
        json: false,
    }
    .execute(&runtime)
    .await
    .unwrap();

    WipeCommand { force: true }.execute(&runtime).await.unwrap();
    let runtime = Runtime::open(&options).await.unwrap();
    assert!(runtime
        .engine()
        .history_log()
        .entries()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_upload_respects_config() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
    std::fs::write(dir.path().join("uploads/new.jpg"), b"garbage").unwrap();

    let disabled = Runtime::open(&options(dir.path(), "")).await.unwrap();
    assert!(!disabled.config().codec.optimize_on_upload);
    UploadCommand::new("new.jpg")
        .execute(&disabled)
        .await
        .unwrap();

    let enabled = Runtime::open(&options(
        dir.path(),
        "[codec]\noptimize_on_upload = true\nquality = 20\n",
    ))
    .await
    .unwrap();
    assert_eq!(enabled.config().codec.quality, 50);
    assert!(UploadCommand::new("new.jpg")
        .execute(&enabled)
        .await
        .is_err());
}
