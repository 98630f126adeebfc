//! Shared test utilities: a complete project in the conventional layout.
//!
//! ```text
//! <tmp>/
//! └── src/
//!     ├── html/views/{home,about}.html    # both include nav.html
//!     ├── html/includes/nav.html
//!     ├── js/{index,util}.js
//!     ├── scss/style.scss                 # imports the icon font partial
//!     ├── img/{photo.jpg,logo.png}
//!     ├── fonts/body.woff2
//!     ├── iconfont/{home,search}.svg
//!     └── favicon/favicon.png
//! ```
//!
//! Raster files are generated with `image`, so they decode for real.

use crate::config::{BuildConfig, Project};
use image::{ImageFormat, Rgba, RgbaImage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

pub const HOME_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Home</title>
  <link rel="stylesheet" href="css/style.bundle.css">
</head>
<body>
  <%= require('../includes/nav.html') %>
  <h1>Home</h1>
  <script src="js/bundle.js"></script>
</body>
</html>
"#;

pub const ABOUT_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>About</title></head>
<body>
  <%= require('raw-loader!../includes/nav.html') %>
  <h1>About</h1>
</body>
</html>
"#;

pub const NAV_HTML: &str = r#"<nav><a href="home.html">Home</a> <a href="about.html">About</a></nav>"#;

pub const INDEX_JS: &str = r#"/*! fixture v1 | MIT */
import { greet } from './util.js';
document.title = greet('world');
"#;

pub const UTIL_JS: &str = r#"export function greet(name) {
  return 'Hello, ' + name;
}
"#;

pub const STYLE_SCSS: &str = r#"@import 'iconfont_iconfont';
$accent: #336699;
nav {
  a { color: $accent; }
}
"#;

pub const HOME_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24"><path d="M2 12 L12 2 L22 12 L20 12 L20 22 L4 22 L4 12 Z"/></svg>"#;

pub const SEARCH_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24"><circle cx="10" cy="10" r="7"/></svg>"#;

/// Write `content` at `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Save a `width`×`height` gradient image at `root/rel`.
pub fn write_image(root: &Path, rel: &str, width: u32, height: u32, format: ImageFormat) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 255 / width) as u8, (y * 255 / height) as u8, 128, 255])
    });
    match format {
        ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .save_with_format(&path, format)
            .unwrap(),
        _ => img.save_with_format(&path, format).unwrap(),
    }
}

/// Build the fixture project in a fresh temp directory with stock config.
pub fn fixture_project() -> (TempDir, Project) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write_file(root, "src/html/views/home.html", HOME_HTML);
    write_file(root, "src/html/views/about.html", ABOUT_HTML);
    write_file(root, "src/html/includes/nav.html", NAV_HTML);
    write_file(root, "src/js/index.js", INDEX_JS);
    write_file(root, "src/js/util.js", UTIL_JS);
    write_file(root, "src/scss/style.scss", STYLE_SCSS);
    write_file(root, "src/fonts/body.woff2", b"wOF2fixture");
    write_file(root, "src/iconfont/home.svg", HOME_SVG);
    write_file(root, "src/iconfont/search.svg", SEARCH_SVG);
    write_image(root, "src/img/photo.jpg", 64, 48, ImageFormat::Jpeg);
    write_image(root, "src/img/logo.png", 32, 32, ImageFormat::Png);
    write_image(root, "src/favicon/favicon.png", 64, 64, ImageFormat::Png);

    let project = Project::new(root, BuildConfig::default());
    (tmp, project)
}
