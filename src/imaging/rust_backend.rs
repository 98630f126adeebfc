//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | JPEG re-encode | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | PNG palette reduction | `imagequant` (target quality = `images.quality`, dithered remap) |
//! | Indexed PNG write | `png::Encoder` (1/2/4/8-bit palette + `tRNS`, `High` deflate) |
//! | Icon resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Icon composite | `image::imageops::overlay` onto a filled or transparent canvas |
//! | ICO container | `image::codecs::ico::IcoEncoder` with one PNG frame per size |

use super::backend::{BackendError, ImageBackend};
use super::calculations::{center_offset, content_box, fit_within};
use super::params::{CompressOutcome, CompressParams, IcoParams, IconParams, RasterFormat};
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageFormat, ImageReader, Rgba, RgbaImage};
use imagequant::RGBA;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Encode `img` into memory in the requested format.
fn encode(img: &DynamicImage, format: RasterFormat, quality: u8) -> Result<Vec<u8>, BackendError> {
    match format {
        RasterFormat::Jpeg => {
            let mut buf = Vec::new();
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
            Ok(buf)
        }
        RasterFormat::Png => encode_indexed_png(img, quality),
    }
}

/// Reduce to a palette of at most 256 colours and write an indexed PNG.
///
/// `quality` is the `imagequant` target: lower values accept a smaller
/// palette and more error.
fn encode_indexed_png(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    let quant_err =
        |e: imagequant::Error| BackendError::ProcessingFailed(format!("PNG quantize failed: {e}"));
    let png_err =
        |e: png::EncodingError| BackendError::ProcessingFailed(format!("PNG encode failed: {e}"));

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<RGBA> = rgba
        .pixels()
        .map(|p| RGBA::new(p[0], p[1], p[2], p[3]))
        .collect();

    let mut attr = imagequant::new();
    attr.set_speed(4).map_err(quant_err)?;
    attr.set_quality(0, quality.min(100)).map_err(quant_err)?;
    let mut image = attr
        .new_image(pixels, width as usize, height as usize, 0.0)
        .map_err(quant_err)?;
    let mut result = attr.quantize(&mut image).map_err(quant_err)?;
    result.set_dithering_level(1.0).map_err(quant_err)?;
    let (palette, indices) = result.remapped(&mut image).map_err(quant_err)?;

    let (depth, bits) = match palette.len() {
        0..=2 => (png::BitDepth::One, 1),
        3..=4 => (png::BitDepth::Two, 2),
        5..=16 => (png::BitDepth::Four, 4),
        _ => (png::BitDepth::Eight, 8),
    };
    let data = pack_indices(&indices, width as usize, bits);

    let rgb: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    let alpha: Vec<u8> = palette.iter().map(|c| c.a).collect();

    let mut buf = Vec::new();
    let mut encoder = png::Encoder::new(&mut buf, width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(depth);
    encoder.set_compression(png::Compression::High);
    encoder.set_palette(rgb);
    // tRNS may stop after the last translucent entry
    if let Some(last) = alpha.iter().rposition(|&a| a < 255) {
        encoder.set_trns(alpha[..=last].to_vec());
    }
    let mut writer = encoder.write_header().map_err(png_err)?;
    writer.write_image_data(&data).map_err(png_err)?;
    writer.finish().map_err(png_err)?;
    Ok(buf)
}

/// Pack one palette index per pixel into rows of `bits`-wide samples,
/// most significant first.
fn pack_indices(indices: &[u8], width: usize, bits: usize) -> Vec<u8> {
    if bits == 8 || width == 0 {
        return indices.to_vec();
    }
    let per_byte = 8 / bits;
    let mut out = Vec::with_capacity(indices.len() / per_byte + indices.len() / width + 1);
    for row in indices.chunks(width) {
        for chunk in row.chunks(per_byte) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &index)| byte | index << (8 - bits * (i + 1)));
            out.push(byte);
        }
    }
    out
}

/// Render the logo centered on a `width`×`height` canvas.
fn compose_icon(
    logo: &DynamicImage,
    width: u32,
    height: u32,
    background: Option<[u8; 4]>,
    margin: f32,
) -> RgbaImage {
    let mut canvas = match background {
        Some(rgba) => RgbaImage::from_pixel(width, height, Rgba(rgba)),
        None => RgbaImage::new(width, height),
    };
    let bounds = content_box((width, height), margin);
    let (w, h) = fit_within((logo.width(), logo.height()), bounds);
    let scaled = logo.resize_exact(w, h, FilterType::Lanczos3).to_rgba8();
    let (x, y) = center_offset((w, h), (width, height));
    image::imageops::overlay(&mut canvas, &scaled, x, y);
    canvas
}

fn ensure_parent(path: &Path) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl ImageBackend for RustBackend {
    fn compress(&self, params: &CompressParams) -> Result<CompressOutcome, BackendError> {
        let before = std::fs::metadata(&params.path)?.len();
        let img = load_image(&params.path)?;
        let encoded = encode(&img, params.format, params.quality.value() as u8)?;
        let after = encoded.len() as u64;

        if after < before {
            std::fs::write(&params.path, &encoded)?;
            Ok(CompressOutcome::Compressed { before, after })
        } else {
            Ok(CompressOutcome::Kept { size: before })
        }
    }

    fn render_icon(&self, params: &IconParams) -> Result<(), BackendError> {
        let logo = load_image(&params.source)?;
        let canvas = compose_icon(
            &logo,
            params.width,
            params.height,
            params.background,
            params.margin,
        );
        ensure_parent(&params.output)?;
        canvas
            .save_with_format(&params.output, ImageFormat::Png)
            .map_err(|e| BackendError::ProcessingFailed(format!("PNG save failed: {e}")))
    }

    fn render_ico(&self, params: &IcoParams) -> Result<(), BackendError> {
        let logo = load_image(&params.source)?;
        let frames = params
            .sizes
            .iter()
            .map(|&size| {
                let canvas = compose_icon(&logo, size, size, None, 0.0);
                IcoFrame::as_png(canvas.as_raw(), size, size, ExtendedColorType::Rgba8)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::ProcessingFailed(format!("ICO frame failed: {e}")))?;

        ensure_parent(&params.output)?;
        let file = std::fs::File::create(&params.output)?;
        IcoEncoder::new(std::io::BufWriter::new(file))
            .encode_images(&frames)
            .map_err(|e| BackendError::ProcessingFailed(format!("ICO encode failed: {e}")))
    }
}
