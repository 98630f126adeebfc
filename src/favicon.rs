//! Favicon generation: one source logo → the platform icon set, web
//! manifests, and the `<head>` markup that references them.
//!
//! ## Categories
//!
//! Each category is switched on or off under `[favicon.icons]`:
//!
//! | Category | Files | Background |
//! |---|---|---|
//! | `android` | `android-chrome-{36..512}.png`, `manifest.json` | transparent |
//! | `apple_icon` | `apple-touch-icon-{57..180}.png`, `apple-touch-icon.png`, `apple-touch-icon-precomposed.png` | filled |
//! | `apple_startup` | `apple-touch-startup-image-WxH.png` | filled |
//! | `coast` | `coast-228x228.png` | filled |
//! | `favicons` | `favicon-{16,32}.png`, `favicon.ico` | transparent |
//! | `firefox` | `firefox_app_{60,128,512}.png`, `manifest.webapp` | transparent |
//! | `opengraph` | `open-graph.png` | filled |
//! | `twitter` | `twitter.png` | filled |
//! | `yandex` | `yandex-browser-50x50.png`, `yandex-browser-manifest.json` | transparent |
//! | `windows` | `mstile-*.png`, `browserconfig.xml` | filled |
//!
//! "Filled" categories are painted with `favicon.background` because the
//! platforms show them without transparency.
//!
//! ## Persistent cache
//!
//! The set is rendered into `.sitepack-cache/favicon/` and then copied into
//! the output under `favicon.prefix`. The fingerprint covers the logo bytes
//! and every favicon option; while it matches, the cached set is copied
//! without rendering anything. This survives the production clean stage,
//! which only removes the output directory.

use crate::cache::{self, CacheRecord, CacheStatus, Fingerprinter};
use crate::config::{FaviconConfig, FaviconIcons, Project, parse_hex_color};
use crate::imaging::{BackendError, IcoParams, IconParams, ImageBackend};
use maud::{Markup, html};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaviconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("icon rendering failed: {0}")]
    Backend(#[from] BackendError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

const CACHE_KEY: &str = "favicon";

/// Sizes packed into `favicon.ico`.
pub const ICO_SIZES: [u32; 5] = [16, 24, 32, 48, 64];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Android,
    AppleIcon,
    AppleStartup,
    Coast,
    Favicons,
    Firefox,
    OpenGraph,
    Twitter,
    Yandex,
    Windows,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Android,
        Category::AppleIcon,
        Category::AppleStartup,
        Category::Coast,
        Category::Favicons,
        Category::Firefox,
        Category::OpenGraph,
        Category::Twitter,
        Category::Yandex,
        Category::Windows,
    ];

    pub fn enabled(self, icons: &FaviconIcons) -> bool {
        match self {
            Category::Android => icons.android,
            Category::AppleIcon => icons.apple_icon,
            Category::AppleStartup => icons.apple_startup,
            Category::Coast => icons.coast,
            Category::Favicons => icons.favicons,
            Category::Firefox => icons.firefox,
            Category::OpenGraph => icons.opengraph,
            Category::Twitter => icons.twitter,
            Category::Yandex => icons.yandex,
            Category::Windows => icons.windows,
        }
    }

    /// Platforms that display the icon without transparency.
    fn opaque(self) -> bool {
        matches!(
            self,
            Category::AppleIcon
                | Category::AppleStartup
                | Category::Coast
                | Category::OpenGraph
                | Category::Twitter
                | Category::Windows
        )
    }

    fn margin(self) -> f32 {
        match self {
            Category::AppleStartup => 0.35,
            Category::OpenGraph | Category::Twitter => 0.2,
            Category::AppleIcon | Category::Coast | Category::Windows => 0.1,
            _ => 0.0,
        }
    }
}

/// One PNG of the icon set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconSpec {
    pub category: Category,
    pub file: String,
    pub width: u32,
    pub height: u32,
}

const ANDROID_SIZES: [u32; 9] = [36, 48, 72, 96, 144, 192, 256, 384, 512];
const APPLE_SIZES: [u32; 10] = [57, 60, 72, 76, 114, 120, 144, 152, 167, 180];
const FIREFOX_SIZES: [u32; 3] = [60, 128, 512];
/// (width, height, device pixel ratio)
const APPLE_STARTUP: [(u32, u32, u32); 10] = [
    (640, 1136, 2),
    (750, 1334, 2),
    (828, 1792, 2),
    (1125, 2436, 3),
    (1242, 2208, 3),
    (1242, 2688, 3),
    (1536, 2048, 2),
    (1668, 2224, 2),
    (1668, 2388, 2),
    (2048, 2732, 2),
];
const WINDOWS_TILES: [(u32, u32); 5] = [(70, 70), (144, 144), (150, 150), (310, 150), (310, 310)];

fn spec(category: Category, file: String, width: u32, height: u32) -> IconSpec {
    IconSpec {
        category,
        file,
        width,
        height,
    }
}

/// Every PNG the enabled categories need, in table order.
pub fn icon_specs(icons: &FaviconIcons) -> Vec<IconSpec> {
    let mut specs = Vec::new();
    for category in Category::ALL.into_iter().filter(|c| c.enabled(icons)) {
        match category {
            Category::Android => specs.extend(ANDROID_SIZES.iter().map(|&s| {
                spec(category, format!("android-chrome-{s}x{s}.png"), s, s)
            })),
            Category::AppleIcon => {
                specs.extend(APPLE_SIZES.iter().map(|&s| {
                    spec(category, format!("apple-touch-icon-{s}x{s}.png"), s, s)
                }));
                specs.push(spec(category, "apple-touch-icon.png".into(), 180, 180));
                specs.push(spec(
                    category,
                    "apple-touch-icon-precomposed.png".into(),
                    180,
                    180,
                ));
            }
            Category::AppleStartup => specs.extend(APPLE_STARTUP.iter().map(|&(w, h, _)| {
                spec(category, format!("apple-touch-startup-image-{w}x{h}.png"), w, h)
            })),
            Category::Coast => specs.push(spec(category, "coast-228x228.png".into(), 228, 228)),
            Category::Favicons => {
                specs.push(spec(category, "favicon-16x16.png".into(), 16, 16));
                specs.push(spec(category, "favicon-32x32.png".into(), 32, 32));
            }
            Category::Firefox => specs.extend(FIREFOX_SIZES.iter().map(|&s| {
                spec(category, format!("firefox_app_{s}x{s}.png"), s, s)
            })),
            Category::OpenGraph => specs.push(spec(category, "open-graph.png".into(), 1200, 630)),
            Category::Twitter => specs.push(spec(category, "twitter.png".into(), 1024, 512)),
            Category::Yandex => {
                specs.push(spec(category, "yandex-browser-50x50.png".into(), 50, 50))
            }
            Category::Windows => specs.extend(WINDOWS_TILES.iter().map(|&(w, h)| {
                spec(category, format!("mstile-{w}x{h}.png"), w, h)
            })),
        }
    }
    specs
}

// =============================================================================
// Manifests and markup
// =============================================================================

/// Public URL of a generated file, as referenced from pages.
fn href(config: &FaviconConfig, file: &str) -> String {
    format!("{}{}", config.prefix, file)
}

/// URL of a generated file as seen from a manifest next to it.
fn sibling_src(config: &FaviconConfig, file: &str) -> String {
    let name_prefix = config.prefix.rsplit('/').next().unwrap_or("");
    format!("{name_prefix}{file}")
}

/// Manifest files for the enabled categories: `(file name, contents)`.
pub fn manifests(config: &FaviconConfig) -> Result<Vec<(String, String)>, FaviconError> {
    let icons = &config.icons;
    let bg = &config.background;
    let mut out = Vec::new();

    if icons.android {
        let entries: Vec<_> = ANDROID_SIZES
            .iter()
            .map(|s| {
                json!({
                    "src": sibling_src(config, &format!("android-chrome-{s}x{s}.png")),
                    "sizes": format!("{s}x{s}"),
                    "type": "image/png",
                })
            })
            .collect();
        let manifest = json!({
            "name": config.app_name,
            "short_name": config.app_name,
            "icons": entries,
            "theme_color": bg,
            "background_color": bg,
            "display": "standalone",
        });
        out.push((
            "manifest.json".to_string(),
            serde_json::to_string_pretty(&manifest)?,
        ));
    }
    if icons.firefox {
        let mut entries = serde_json::Map::new();
        for s in FIREFOX_SIZES {
            entries.insert(
                s.to_string(),
                json!(sibling_src(config, &format!("firefox_app_{s}x{s}.png"))),
            );
        }
        let manifest = json!({
            "version": "1.0",
            "name": config.app_name,
            "icons": entries,
        });
        out.push((
            "manifest.webapp".to_string(),
            serde_json::to_string_pretty(&manifest)?,
        ));
    }
    if icons.yandex {
        let manifest = json!({
            "version": "1.0",
            "api_version": 1,
            "layout": {
                "logo": sibling_src(config, "yandex-browser-50x50.png"),
                "color": bg,
                "show_title": true,
            },
        });
        out.push((
            "yandex-browser-manifest.json".to_string(),
            serde_json::to_string_pretty(&manifest)?,
        ));
    }
    if icons.windows {
        let tile = |w: u32, h: u32| sibling_src(config, &format!("mstile-{w}x{h}.png"));
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<browserconfig>\n  <msapplication>\n    <tile>\n      <square70x70logo src=\"{}\"/>\n      <square150x150logo src=\"{}\"/>\n      <wide310x150logo src=\"{}\"/>\n      <square310x310logo src=\"{}\"/>\n      <TileColor>{}</TileColor>\n    </tile>\n  </msapplication>\n</browserconfig>\n",
            tile(70, 70),
            tile(150, 150),
            tile(310, 150),
            tile(310, 310),
            bg
        );
        out.push(("browserconfig.xml".to_string(), xml));
    }
    Ok(out)
}

/// The `<head>` tags for the enabled categories, one entry per tag.
pub fn markup_tags(config: &FaviconConfig) -> Vec<String> {
    let icons = &config.icons;
    let bg = config.background.as_str();
    let app_name = (!config.app_name.is_empty()).then_some(config.app_name.as_str());
    let mut tags: Vec<Markup> = Vec::new();

    if icons.android {
        tags.push(html! { link rel="manifest" href=(href(config, "manifest.json")); });
        tags.push(html! { meta name="mobile-web-app-capable" content="yes"; });
        tags.push(html! { meta name="theme-color" content=(bg); });
        if let Some(name) = app_name {
            tags.push(html! { meta name="application-name" content=(name); });
        }
    }
    if icons.apple_icon {
        for s in APPLE_SIZES {
            let file = format!("apple-touch-icon-{s}x{s}.png");
            tags.push(html! {
                link rel="apple-touch-icon" sizes=(format!("{s}x{s}")) href=(href(config, &file));
            });
        }
        tags.push(html! { meta name="apple-mobile-web-app-capable" content="yes"; });
        tags.push(html! {
            meta name="apple-mobile-web-app-status-bar-style" content="black-translucent";
        });
        if let Some(name) = app_name {
            tags.push(html! { meta name="apple-mobile-web-app-title" content=(name); });
        }
    }
    if icons.apple_startup {
        for (w, h, ratio) in APPLE_STARTUP {
            let media = format!(
                "(device-width: {}px) and (device-height: {}px) and (-webkit-device-pixel-ratio: {ratio})",
                w / ratio,
                h / ratio
            );
            let file = format!("apple-touch-startup-image-{w}x{h}.png");
            tags.push(html! {
                link rel="apple-touch-startup-image" media=(media) href=(href(config, &file));
            });
        }
    }
    if icons.coast {
        tags.push(html! {
            link rel="icon" type="image/png" sizes="228x228" href=(href(config, "coast-228x228.png"));
        });
    }
    if icons.favicons {
        tags.push(html! {
            link rel="icon" type="image/png" sizes="32x32" href=(href(config, "favicon-32x32.png"));
        });
        tags.push(html! {
            link rel="icon" type="image/png" sizes="16x16" href=(href(config, "favicon-16x16.png"));
        });
        tags.push(html! { link rel="shortcut icon" href=(href(config, "favicon.ico")); });
    }
    if icons.opengraph {
        tags.push(html! { meta property="og:image" content=(href(config, "open-graph.png")); });
        tags.push(html! { meta property="og:image:width" content="1200"; });
        tags.push(html! { meta property="og:image:height" content="630"; });
    }
    if icons.twitter {
        tags.push(html! { meta name="twitter:card" content="summary_large_image"; });
        tags.push(html! { meta name="twitter:image" content=(href(config, "twitter.png")); });
    }
    if icons.yandex {
        tags.push(html! {
            link rel="yandex-tableau-widget" href=(href(config, "yandex-browser-manifest.json"));
        });
    }
    if icons.windows {
        tags.push(html! { meta name="msapplication-TileColor" content=(bg); });
        tags.push(html! {
            meta name="msapplication-TileImage" content=(href(config, "mstile-144x144.png"));
        });
        tags.push(html! {
            meta name="msapplication-config" content=(href(config, "browserconfig.xml"));
        });
    }

    tags.into_iter().map(|m| m.into_string()).collect()
}

/// All tags concatenated, ready for injection into a page head.
pub fn render_markup(config: &FaviconConfig) -> String {
    markup_tags(config).concat()
}

// =============================================================================
// Task
// =============================================================================

/// What the favicon task produced.
#[derive(Debug, Clone)]
pub struct FaviconReport {
    pub status: CacheStatus,
    /// Output paths of every file in the set.
    pub files: Vec<PathBuf>,
    pub markup: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IconStats<'a> {
    output_file_prefix: &'a str,
    html: Vec<String>,
    files: Vec<String>,
}

/// File names of the whole set (PNGs, ICO, manifests), unprefixed.
pub fn set_files(config: &FaviconConfig) -> Result<Vec<String>, FaviconError> {
    let mut files: Vec<String> = icon_specs(&config.icons)
        .into_iter()
        .map(|s| s.file)
        .collect();
    if config.icons.favicons {
        files.push("favicon.ico".to_string());
    }
    files.extend(manifests(config)?.into_iter().map(|(name, _)| name));
    Ok(files)
}

/// Render the full set into `dir`, replacing whatever was there.
fn render_set(
    config: &FaviconConfig,
    logo: &Path,
    dir: &Path,
    backend: &dyn ImageBackend,
) -> Result<(), FaviconError> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    let background = parse_hex_color(&config.background).unwrap_or([255, 255, 255, 255]);
    let specs = icon_specs(&config.icons);
    specs.par_iter().try_for_each(|icon| {
        backend.render_icon(&IconParams {
            source: logo.to_path_buf(),
            output: dir.join(&icon.file),
            width: icon.width,
            height: icon.height,
            background: icon.category.opaque().then_some(background),
            margin: icon.category.margin(),
        })
    })?;

    if config.icons.favicons {
        backend.render_ico(&IcoParams {
            source: logo.to_path_buf(),
            output: dir.join("favicon.ico"),
            sizes: ICO_SIZES.to_vec(),
        })?;
    }
    for (name, contents) in manifests(config)? {
        fs::write(dir.join(name), contents)?;
    }
    Ok(())
}

/// Run the favicon task. `force` re-renders even when the cache is fresh.
pub fn build_favicons(
    project: &Project,
    backend: &dyn ImageBackend,
    force: bool,
) -> Result<FaviconReport, FaviconError> {
    let config = &project.config.favicon;
    let logo = project.path(&config.logo);
    let cache_dir = project.cache_dir();
    let staging = cache_dir.join(CACHE_KEY);
    let files = set_files(config)?;

    let fp = Fingerprinter::new(CACHE_KEY)
        .options(config)?
        .file(&config.logo, &logo)?
        .finish();

    let reuse = config.persistent_cache
        && !force
        && cache::lookup(&cache_dir, CACHE_KEY, &fp, &staging) == CacheStatus::Cached;

    let status = if reuse {
        tracing::debug!(files = files.len(), "favicon set unchanged, reusing cache");
        CacheStatus::Cached
    } else {
        render_set(config, &logo, &staging, backend)?;
        CacheRecord::new(fp, files.clone()).save(&cache_dir, CACHE_KEY)?;
        tracing::debug!(files = files.len(), "favicon set rendered");
        CacheStatus::Generated
    };

    let mut outputs = Vec::with_capacity(files.len());
    for file in &files {
        let target = project.output_path(&href(config, file));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(staging.join(file), &target)?;
        outputs.push(target);
    }

    let tags = markup_tags(config);
    if config.emit_stats {
        let stats = IconStats {
            output_file_prefix: &config.prefix,
            html: tags.clone(),
            files: files.iter().map(|f| href(config, f)).collect(),
        };
        let path = project.output_path(&href(config, "iconstats.json"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(&stats)?)?;
        outputs.push(path);
    }

    Ok(FaviconReport {
        status,
        files: outputs,
        markup: tags.concat(),
    })
}
