//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the pipeline
//! needs: in-place compression, logo → icon render, and logo → ICO render.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate and statically linked into the binary.

use super::params::{CompressOutcome, CompressParams, IcoParams, IconParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Re-encode a raster image in place, keeping it only if smaller.
    fn compress(&self, params: &CompressParams) -> Result<CompressOutcome, BackendError>;

    /// Render a single PNG icon from the source logo.
    fn render_icon(&self, params: &IconParams) -> Result<(), BackendError>;

    /// Render a multi-resolution `.ico` from the source logo.
    fn render_ico(&self, params: &IcoParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// Icon renders write a placeholder file so callers that copy or
    /// fingerprint outputs see them on disk.
    #[derive(Default)]
    pub struct MockBackend {
        /// File names (not paths) whose compression should fail.
        pub failing: Vec<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Compress {
            path: String,
            quality: u32,
        },
        Icon {
            output: String,
            width: u32,
            height: u32,
            background: bool,
        },
        Ico {
            output: String,
            sizes: Vec<u32>,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|n| n.to_string()).collect(),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn touch(path: &Path) -> Result<(), BackendError> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, b"mock")?;
            Ok(())
        }
    }

    impl ImageBackend for MockBackend {
        fn compress(&self, params: &CompressParams) -> Result<CompressOutcome, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Compress {
                path: params.path.to_string_lossy().to_string(),
                quality: params.quality.value(),
            });
            let name = params
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if self.failing.contains(&name) {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock failure for {name}"
                )));
            }
            Ok(CompressOutcome::Compressed {
                before: 100,
                after: 60,
            })
        }

        fn render_icon(&self, params: &IconParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Icon {
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                background: params.background.is_some(),
            });
            Self::touch(&params.output)
        }

        fn render_ico(&self, params: &IcoParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Ico {
                output: params.output.to_string_lossy().to_string(),
                sizes: params.sizes.clone(),
            });
            Self::touch(&params.output)
        }
    }

    #[test]
    fn mock_records_compress() {
        let backend = MockBackend::new();
        let outcome = backend
            .compress(&CompressParams {
                path: "/img/photo.jpg".into(),
                format: crate::imaging::RasterFormat::Jpeg,
                quality: crate::imaging::Quality::new(70),
            })
            .unwrap();
        assert!(matches!(outcome, CompressOutcome::Compressed { .. }));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Compress { quality: 70, .. }));
    }

    #[test]
    fn mock_fails_on_configured_names() {
        let backend = MockBackend::failing_on(&["broken.png"]);
        let result = backend.compress(&CompressParams {
            path: "/img/broken.png".into(),
            format: crate::imaging::RasterFormat::Png,
            quality: crate::imaging::Quality::default(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn mock_icon_writes_placeholder() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("nested/icon.png");
        let backend = MockBackend::new();
        backend
            .render_icon(&IconParams {
                source: "/logo.png".into(),
                output: output.clone(),
                width: 32,
                height: 32,
                background: None,
                margin: 0.0,
            })
            .unwrap();
        assert!(output.exists());
    }
}
