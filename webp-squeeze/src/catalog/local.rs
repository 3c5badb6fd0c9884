//! Directory-backed library
//!
//! Every `.jpg`, `.jpeg` and `.png` file below a root directory is an item,
//! identified by its `/`-separated path relative to the root. A conversion
//! writes `<file>.webp` next to the source and never touches the original.
//! Outcomes are kept in the [`StateStore`] under `item:{id}`.

use super::{
    CatalogError, CatalogQuery, CodecFailure, ItemCodec, ItemId, ItemOutcome, LibrarySummary,
    SelectionMode, Transcoded,
};
use crate::store::{self, keys, StateStore};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Catalog and codec over a local directory tree.
#[derive(Clone)]
pub struct LocalLibrary {
    root: PathBuf,
    store: Arc<dyn StateStore>,
}

impl std::fmt::Debug for LocalLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLibrary")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl LocalLibrary {
    /// Library rooted at `root`, recording outcomes in `store`.
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn StateStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an item, rejecting ids that escape the root.
    fn resolve(&self, item: &ItemId) -> Option<PathBuf> {
        let relative = Path::new(item.as_str());
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        contained.then(|| self.root.join(relative))
    }

    fn scan(&self) -> Result<Vec<ItemId>, CatalogError> {
        let mut items = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| CatalogError::Scan(e.to_string()))?;
            if !entry.file_type().is_file() || !is_convertible(entry.path()) {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            items.push(ItemId::from(id));
        }

        items.sort();
        Ok(items)
    }

    async fn outcome(&self, item: &ItemId) -> Result<Option<ItemOutcome>, CatalogError> {
        let stored = store::read::<ItemOutcome>(self.store.as_ref(), &keys::item(item.as_str())).await?;
        Ok(stored.map(|v| v.value))
    }

    async fn record(&self, item: &ItemId, outcome: &ItemOutcome) -> Result<(), CodecFailure> {
        store::write(self.store.as_ref(), &keys::item(item.as_str()), outcome)
            .await
            .map(|_| ())
            .map_err(|e| CodecFailure::new(format!("could not record outcome: {e}")))
    }
}

fn is_convertible(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Path of the derivative for `source`: the full file name plus `.webp`.
fn webp_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".webp");
    PathBuf::from(name)
}

/// Decode `source`, write its WebP derivative and return bytes saved.
fn convert(source: &Path) -> Result<u64, String> {
    let original = std::fs::read(source).map_err(|e| format!("Source image not readable: {e}"))?;

    let image = ImageReader::new(Cursor::new(&original))
        .with_guessed_format()
        .map_err(|e| format!("Failed to read image: {e}"))?
        .decode()
        .map_err(|e| format!("Failed to decode image: {e}"))?;

    // the WebP encoder only accepts 8-bit RGB(A)
    let image = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };

    let mut encoded = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::WebP)
        .map_err(|e| format!("Failed to encode WebP: {e}"))?;

    std::fs::write(webp_path(source), &encoded)
        .map_err(|e| format!("Failed to write WebP file: {e}"))?;

    Ok((original.len() as u64).saturating_sub(encoded.len() as u64))
}

#[async_trait]
impl CatalogQuery for LocalLibrary {
    async fn find_candidates(&self, mode: SelectionMode) -> Result<Vec<ItemId>, CatalogError> {
        let mut candidates = Vec::new();

        for item in self.scan()? {
            let outcome = self.outcome(&item).await?;
            let selected = match mode {
                SelectionMode::Unoptimized => !outcome.is_some_and(|o| o.optimized),
                SelectionMode::Failed => outcome.is_some_and(|o| o.failed),
            };
            if selected {
                candidates.push(item);
            }
        }

        Ok(candidates)
    }

    async fn summary(&self) -> Result<LibrarySummary, CatalogError> {
        let mut summary = LibrarySummary::default();

        for item in self.scan()? {
            summary.total += 1;
            if let Some(outcome) = self.outcome(&item).await? {
                summary.optimized += u64::from(outcome.optimized);
                summary.failed += u64::from(outcome.failed);
            }
        }

        Ok(summary)
    }
}

#[async_trait]
impl ItemCodec for LocalLibrary {
    async fn transcode(&self, item: &ItemId, quality: u8) -> Result<Transcoded, CodecFailure> {
        let Some(source) = self.resolve(item) else {
            return Err(CodecFailure::new(format!("Item {item} is outside the library")));
        };

        // image's WebP encoder is lossless; quality is recorded for tracing only
        tracing::debug!(item = %item, quality, "Converting item to WebP");

        let result = tokio::task::spawn_blocking(move || convert(&source))
            .await
            .map_err(|e| CodecFailure::new(format!("Conversion task failed: {e}")))?;

        match result {
            Ok(bytes_saved) => {
                self.record(item, &ItemOutcome::success(bytes_saved)).await?;
                Ok(Transcoded { bytes_saved })
            }
            Err(reason) => {
                let previous = self.outcome(item).await.ok().flatten();
                let outcome = ItemOutcome::failure(previous.as_ref(), reason.clone());
                self.record(item, &outcome).await?;
                Err(CodecFailure::new(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn library_with_files() -> (TempDir, LocalLibrary) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("2024/05")).unwrap();

        RgbImage::from_pixel(16, 16, Rgb([200, 40, 40]))
            .save(dir.path().join("2024/05/red.png"))
            .unwrap();
        RgbImage::from_pixel(8, 8, Rgb([10, 10, 10]))
            .save(dir.path().join("dark.JPG"))
            .unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"definitely not a jpeg").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let library = LocalLibrary::new(dir.path(), Arc::new(MemoryStore::new()));
        (dir, library)
    }

    #[tokio::test]
    async fn test_scan_finds_raster_files() {
        let (_dir, library) = library_with_files();
        let items = library
            .find_candidates(SelectionMode::Unoptimized)
            .await
            .unwrap();

        assert_eq!(
            items,
            vec![
                ItemId::from("2024/05/red.png"),
                ItemId::from("broken.jpg"),
                ItemId::from("dark.JPG"),
            ]
        );
    }

    #[tokio::test]
    async fn test_transcode_writes_derivative() {
        let (dir, library) = library_with_files();
        library
            .transcode(&ItemId::from("2024/05/red.png"), 80)
            .await
            .unwrap();

        assert!(dir.path().join("2024/05/red.png.webp").exists());
        assert!(dir.path().join("2024/05/red.png").exists());

        let remaining = library
            .find_candidates(SelectionMode::Unoptimized)
            .await
            .unwrap();
        assert!(!remaining.contains(&ItemId::from("2024/05/red.png")));
    }

    #[tokio::test]
    async fn test_broken_file_is_marked_failed() {
        let (_dir, library) = library_with_files();
        let err = library
            .transcode(&ItemId::from("broken.jpg"), 80)
            .await
            .unwrap_err();
        assert!(!err.reason.is_empty());

        let failed = library.find_candidates(SelectionMode::Failed).await.unwrap();
        assert_eq!(failed, vec![ItemId::from("broken.jpg")]);

        let summary = library.summary().await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.optimized, 0);
    }

    #[tokio::test]
    async fn test_rejects_escaping_ids() {
        let (_dir, library) = library_with_files();
        let err = library
            .transcode(&ItemId::from("../etc/passwd"), 80)
            .await
            .unwrap_err();
        assert!(err.reason.contains("outside"));
    }

    #[test]
    fn test_webp_path_appends_extension() {
        assert_eq!(
            webp_path(Path::new("/srv/media/cat.jpeg")),
            PathBuf::from("/srv/media/cat.jpeg.webp")
        );
    }
}
