//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `source` to fit inside `bounds`, preserving aspect ratio.
///
/// One edge matches the bound exactly, the other is no larger than its
/// bound. Neither edge drops below 1px. Upscaling is allowed: a 16px logo
/// still fills a 512px icon.
///
/// # Examples
/// ```
/// # use sitepack::imaging::fit_within;
/// // Wide logo in a square box: width is the limiting edge
/// assert_eq!(fit_within((200, 100), (64, 64)), (64, 32));
///
/// // Square logo in a wide box: height is the limiting edge
/// assert_eq!(fit_within((50, 50), (1200, 630)), (630, 630));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let (max_w, max_h) = (bounds.0.max(1) as f64, bounds.1.max(1) as f64);

    let scale = (max_w / src_w).min(max_h / src_h);
    let w = (src_w * scale).round().clamp(1.0, max_w) as u32;
    let h = (src_h * scale).round().clamp(1.0, max_h) as u32;
    (w, h)
}

/// Top-left offset that centers `inner` inside `outer`.
pub fn center_offset(inner: (u32, u32), outer: (u32, u32)) -> (i64, i64) {
    (
        (outer.0 as i64 - inner.0 as i64) / 2,
        (outer.1 as i64 - inner.1 as i64) / 2,
    )
}

/// The area left for the logo after removing `margin` (a fraction of each
/// edge) from all four sides of a `target` canvas.
pub fn content_box(target: (u32, u32), margin: f32) -> (u32, u32) {
    let margin = margin.clamp(0.0, 0.45) as f64;
    let shrink = |edge: u32| ((edge as f64) * (1.0 - 2.0 * margin)).round().max(1.0) as u32;
    (shrink(target.0), shrink(target.1))
}
