//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Compress** | JPEG/PNG re-encode, kept only when smaller |
//! | **Icon** | Lanczos3 resize + centered overlay on a sized canvas |
//! | **ICO** | One PNG frame per size in an `.ico` container |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{center_offset, content_box, fit_within};
pub use params::{CompressOutcome, CompressParams, IcoParams, IconParams, Quality, RasterFormat};
pub use rust_backend::RustBackend;
