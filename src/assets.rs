//! Asset copy and image compression.
//!
//! Fonts are mirrored verbatim. Images are mirrored, then every JPEG and PNG
//! in the *output* copy is re-encoded in place in parallel:
//!
//! | Format | Encoder setting |
//! |---|---|
//! | JPEG | lossy, `images.quality` (default 70) |
//! | PNG | lossy, quantized to a palette at `images.quality` |
//!
//! A re-encoded file replaces the copy only when it is smaller. Other
//! formats (SVG, GIF, WebP, ...) are copied and left alone.
//!
//! Compression tolerates per-file failure: a file that cannot be decoded or
//! encoded keeps its verbatim copy, is logged, and is counted in the
//! [`ImageReport`]. The batch as a whole still succeeds.

use crate::config::Project;
use crate::imaging::{CompressOutcome, CompressParams, ImageBackend, Quality, RasterFormat};
use crate::pipeline::BuildEvent;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot walk {0}")]
    Walk(#[from] walkdir::Error),
}

/// Files mirrored by [`copy_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub files: Vec<PathBuf>,
    pub bytes: u64,
}

/// Outcome of the image task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReport {
    pub copied: usize,
    pub compressed: usize,
    /// Re-encoded but not smaller; the copy was kept.
    pub kept: usize,
    /// Files whose compression failed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Mirror `src` into `dst`, creating directories as needed. Hidden files
/// and directories are skipped.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<CopyReport, AssetError> {
    let mut report = CopyReport::default();
    fs::create_dir_all(dst)?;

    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            report.bytes += fs::copy(entry.path(), &target)?;
            report.files.push(target);
        }
    }
    Ok(report)
}

/// Run the font task: copy `fonts.source` into the output tree.
pub fn build_fonts(project: &Project) -> Result<CopyReport, AssetError> {
    let config = &project.config.fonts;
    copy_dir(&project.path(&config.source), &project.output_path(&config.output))
}

/// Run the image task: copy `images.source`, then compress the copies.
pub fn build_images(
    project: &Project,
    backend: &dyn ImageBackend,
    events: Option<&Sender<BuildEvent>>,
) -> Result<ImageReport, AssetError> {
    let config = &project.config.images;
    let copied = copy_dir(&project.path(&config.source), &project.output_path(&config.output))?;
    let quality = Quality::new(config.quality);

    let jobs: Vec<CompressParams> = copied
        .files
        .iter()
        .filter_map(|path| {
            RasterFormat::from_path(path).map(|format| CompressParams {
                path: path.clone(),
                format,
                quality,
            })
        })
        .collect();

    let results: Vec<(PathBuf, Result<CompressOutcome, String>)> = jobs
        .par_iter()
        .map(|params| {
            let result = backend.compress(params).map_err(|e| e.to_string());
            match &result {
                Ok(outcome) => {
                    if let Some(tx) = events {
                        tx.send(BuildEvent::ImageCompressed {
                            path: params.path.clone(),
                            outcome: *outcome,
                        })
                        .ok();
                    }
                }
                Err(error) => {
                    tracing::warn!(path = %params.path.display(), %error, "image compression failed, keeping original");
                    if let Some(tx) = events {
                        tx.send(BuildEvent::ImageFailed {
                            path: params.path.clone(),
                            error: error.clone(),
                        })
                        .ok();
                    }
                }
            }
            (params.path.clone(), result)
        })
        .collect();

    let mut report = ImageReport {
        copied: copied.files.len(),
        ..ImageReport::default()
    };
    for (path, result) in results {
        match result {
            Ok(CompressOutcome::Compressed { before, after }) => {
                report.compressed += 1;
                report.bytes_before += before;
                report.bytes_after += after;
            }
            Ok(CompressOutcome::Kept { size }) => {
                report.kept += 1;
                report.bytes_before += size;
                report.bytes_after += size;
            }
            Err(error) => report.failed.push((path, error)),
        }
    }
    Ok(report)
}
