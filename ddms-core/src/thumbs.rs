//! JPEG preview generation and artifact cleanup.
//!
//! Previews live under `<root>/.thumbnails/<hash-prefix>.jpg`, named by the
//! item's content hash so a moved file keeps its artifact. Generation
//! failure never aborts the enclosing item mutation; the item is simply
//! stored without a thumbnail reference.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::{debug, warn};

use ddms_config::IndexConfig;
use ddms_model::ContentHash;

/// Preview bounding box, matching the original deployment's 200x200 JPEGs.
const THUMB_WIDTH: u32 = 200;
const THUMB_HEIGHT: u32 = 200;

#[derive(Debug, Clone)]
pub struct Thumbnailer {
    directory: PathBuf,
    /// Root-relative prefix stored in thumbnail references.
    rel_prefix: String,
}

impl Thumbnailer {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            directory: config.thumbnail_directory(),
            rel_prefix: config.thumbnail_dir_name.clone(),
        }
    }

    /// Render a preview for the file at `source`, returning the
    /// root-relative reference, or `None` when the file has no renderable
    /// image content or rendering failed.
    pub async fn generate(&self, source: &Path, hash: &ContentHash) -> Option<String> {
        let artifact = self.artifact_path(hash);
        let reference = format!("{}/{}.jpg", self.rel_prefix, hash.short());
        let source_display = source.display().to_string();
        let source = source.to_owned();
        let directory = self.directory.clone();

        let rendered = tokio::task::spawn_blocking(move || -> Result<(), String> {
            std::fs::create_dir_all(&directory).map_err(|e| e.to_string())?;
            let img = image::open(&source).map_err(|e| e.to_string())?;
            let thumb = img.resize(THUMB_WIDTH, THUMB_HEIGHT, FilterType::Triangle);
            thumb
                .to_rgb8()
                .save_with_format(&artifact, image::ImageFormat::Jpeg)
                .map_err(|e| e.to_string())
        })
        .await;

        match rendered {
            Ok(Ok(())) => Some(reference),
            Ok(Err(reason)) => {
                // Most indexed documents are not images; this path is routine.
                debug!(source = %source_display, %reason, "no preview generated");
                None
            }
            Err(join) => {
                warn!("preview task panicked: {join}");
                None
            }
        }
    }

    /// Delete a preview artifact by stored reference. Best effort; a missing
    /// artifact is not an error.
    pub async fn remove(&self, reference: &str) {
        let Some(name) = reference.rsplit('/').next() else {
            return;
        };
        let path = self.directory.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove thumbnail {}: {err}", path.display()),
        }
    }

    /// Remove the artifact referenced by an optional column value.
    pub async fn remove_opt(&self, reference: Option<&str>) {
        if let Some(reference) = reference {
            self.remove(reference).await;
        }
    }

    fn artifact_path(&self, hash: &ContentHash) -> PathBuf {
        self.directory.join(format!("{}.jpg", hash.short()))
    }
}
