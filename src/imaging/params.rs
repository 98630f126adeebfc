//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the callers deciding which files to touch (asset
//! compression, favicon rendering) and the [`backend`](super::backend) doing
//! the pixel work, so a mock backend can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100). Clamped on construction.
//! - [`RasterFormat`] — The raster formats the compressor re-encodes.
//! - [`CompressParams`] — One in-place compression.
//! - [`IconParams`] — One logo → fixed-size PNG icon render.
//! - [`IcoParams`] — One logo → multi-resolution `.ico` render.

use std::path::{Path, PathBuf};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Raster formats the compressor knows how to re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    Png,
}

impl RasterFormat {
    /// Detect a compressible format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(RasterFormat::Jpeg),
            "png" => Some(RasterFormat::Png),
            _ => None,
        }
    }
}

/// Re-encode `path` in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressParams {
    pub path: PathBuf,
    pub format: RasterFormat,
    pub quality: Quality,
}

/// Result of a compression attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// The re-encoded file was smaller and replaced the original.
    Compressed { before: u64, after: u64 },
    /// Re-encoding did not help; the original bytes were kept.
    Kept { size: u64 },
}

/// Render the logo centered on a `width`×`height` canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct IconParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Opaque fill; `None` keeps the canvas transparent.
    pub background: Option<[u8; 4]>,
    /// Fraction of each edge left empty around the logo (0.0–0.5).
    pub margin: f32,
}

/// Render the logo into a multi-resolution ICO container.
#[derive(Debug, Clone, PartialEq)]
pub struct IcoParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub sizes: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_70() {
        assert_eq!(Quality::default().value(), 70);
    }

    #[test]
    fn raster_format_from_extension() {
        assert_eq!(
            RasterFormat::from_path(Path::new("a/b.JPG")),
            Some(RasterFormat::Jpeg)
        );
        assert_eq!(
            RasterFormat::from_path(Path::new("b.jpeg")),
            Some(RasterFormat::Jpeg)
        );
        assert_eq!(
            RasterFormat::from_path(Path::new("c.png")),
            Some(RasterFormat::Png)
        );
        assert_eq!(RasterFormat::from_path(Path::new("d.svg")), None);
        assert_eq!(RasterFormat::from_path(Path::new("noext")), None);
    }
}
