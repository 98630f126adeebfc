//! Project configuration module.
//!
//! Handles loading, validating, and merging `sitepack.toml`. The stock
//! defaults describe the conventional project layout, so a project that
//! follows it needs no config file at all:
//!
//! ```text
//! project/
//! ├── sitepack.toml            # Optional overrides
//! └── src/
//!     ├── html/views/          # One page per template
//!     ├── html/includes/       # Raw partials pulled in by templates
//!     ├── js/index.js          # Script entry
//!     ├── scss/style.scss      # Stylesheet entry
//!     ├── img/                 # Copied + compressed
//!     ├── fonts/               # Copied verbatim
//!     ├── iconfont/*.svg       # Icon font source set
//!     └── favicon/favicon.png  # Favicon source logo
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_dir = "dist"
//!
//! [templates]
//! dir = "src/html/views"
//! includes_dir = "src/html/includes"
//! extensions = ["html"]       # Empty list = accept every file with an extension
//!
//! [script]
//! enabled = true
//! entry = "src/js/index.js"
//! output = "js/bundle.js"
//! source_map = true
//! extract_comments = true
//!
//! [style]
//! enabled = true
//! entry = "src/scss/style.scss"
//! output = "css/style.bundle.css"
//! browsers = ["ie >= 10", "last 4 versions"]
//! source_map = true
//! load_paths = []
//!
//! [images]
//! enabled = true
//! source = "src/img"
//! output = "img"
//! quality = 70
//!
//! [fonts]
//! enabled = true
//! source = "src/fonts"
//! output = "fonts"
//!
//! [iconfont]
//! enabled = true
//! source = "src/iconfont"
//! family = "iconfont"
//! font = "src/fonts/[family].[type]"
//! css = "src/scss/_iconfont_[family].scss"
//! watch = "src/iconfont/**/*.svg"
//! font_url = "../fonts/"
//! start_codepoint = 0xEA01
//!
//! [favicon]
//! enabled = true
//! logo = "src/favicon/favicon.png"
//! prefix = "favicon/"
//! app_name = ""
//! background = "#fff"
//! persistent_cache = true
//! inject = true
//! emit_stats = false
//!
//! [favicon.icons]
//! android = true
//! apple_icon = true
//! apple_startup = false
//! coast = true
//! favicons = true
//! firefox = true
//! opengraph = false
//! twitter = true
//! yandex = true
//! windows = false
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the optional config file at the project root.
pub const CONFIG_FILENAME: &str = "sitepack.toml";

/// Directory (relative to the project root) holding fingerprint caches.
pub const CACHE_DIRNAME: &str = ".sitepack-cache";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which kind of build is running.
///
/// Only [`BuildProfile::Production`] enables the clean stage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    #[default]
    Development,
    Production,
}

impl BuildProfile {
    pub fn is_production(self) -> bool {
        self == BuildProfile::Production
    }
}

impl std::fmt::Display for BuildProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildProfile::Development => f.write_str("development"),
            BuildProfile::Production => f.write_str("production"),
        }
    }
}

/// Build configuration loaded from `sitepack.toml`.
///
/// All paths are relative to the project root. Output paths inside sections
/// (`script.output`, `images.output`, ...) are relative to `output_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Output root, wiped by the clean stage in production builds.
    pub output_dir: String,
    pub templates: TemplatesConfig,
    pub script: ScriptConfig,
    pub style: StyleConfig,
    pub images: ImagesConfig,
    pub fonts: FontsConfig,
    pub iconfont: IconFontConfig,
    pub favicon: FaviconConfig,
    pub processing: ProcessingConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: "dist".to_string(),
            templates: TemplatesConfig::default(),
            script: ScriptConfig::default(),
            style: StyleConfig::default(),
            images: ImagesConfig::default(),
            fonts: FontsConfig::default(),
            iconfont: IconFontConfig::default(),
            favicon: FaviconConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".into(),
            ));
        }
        for (key, value) in [
            ("script.output", &self.script.output),
            ("style.output", &self.style.output),
            ("images.output", &self.images.output),
            ("fonts.output", &self.fonts.output),
            ("favicon.prefix", &self.favicon.prefix),
        ] {
            if !is_contained_relative(value) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a relative path inside output_dir, got {value:?}"
                )));
            }
        }
        if self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 0-100".into(),
            ));
        }
        if self
            .templates
            .extensions
            .iter()
            .any(|e| e.is_empty() || e.starts_with('.'))
        {
            return Err(ConfigError::Validation(
                "templates.extensions entries must be non-empty and have no leading dot".into(),
            ));
        }
        if self.iconfont.family.trim().is_empty() {
            return Err(ConfigError::Validation(
                "iconfont.family must not be empty".into(),
            ));
        }
        if self.iconfont.watch.trim().is_empty() {
            return Err(ConfigError::Validation(
                "iconfont.watch must not be empty".into(),
            ));
        }
        if !(0xE000..=0xF8FF).contains(&self.iconfont.start_codepoint) {
            return Err(ConfigError::Validation(
                "iconfont.start_codepoint must be inside the private use area (0xE000-0xF8FF)"
                    .into(),
            ));
        }
        if parse_hex_color(&self.favicon.background).is_none() {
            return Err(ConfigError::Validation(format!(
                "favicon.background is not a hex color: {:?}",
                self.favicon.background
            )));
        }
        Ok(())
    }
}

/// Template discovery and page assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Directory scanned for page templates (one output page per file).
    pub dir: String,
    /// Only files under this directory may be pulled in with `require(...)`.
    pub includes_dir: String,
    /// Accepted template extensions. Empty accepts every file that has one.
    pub extensions: Vec<String>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: "src/html/views".to_string(),
            includes_dir: "src/html/includes".to_string(),
            extensions: vec!["html".to_string()],
        }
    }
}

/// Script bundle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptConfig {
    pub enabled: bool,
    pub entry: String,
    pub output: String,
    pub source_map: bool,
    /// Move legal comments into `<output>.LICENSE.txt`.
    pub extract_comments: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entry: "src/js/index.js".to_string(),
            output: "js/bundle.js".to_string(),
            source_map: true,
            extract_comments: true,
        }
    }
}

/// Stylesheet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    pub enabled: bool,
    pub entry: String,
    pub output: String,
    /// Browserslist queries driving vendor prefixes.
    pub browsers: Vec<String>,
    pub source_map: bool,
    /// Extra directories searched by `@import`/`@use`.
    pub load_paths: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entry: "src/scss/style.scss".to_string(),
            output: "css/style.bundle.css".to_string(),
            browsers: vec!["ie >= 10".to_string(), "last 4 versions".to_string()],
            source_map: true,
            load_paths: Vec::new(),
        }
    }
}

/// Image copy + compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub enabled: bool,
    pub source: String,
    pub output: String,
    /// Lossy encoding quality (0 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: "src/img".to_string(),
            output: "img".to_string(),
            quality: 70,
        }
    }
}

/// Font copy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    pub enabled: bool,
    pub source: String,
    pub output: String,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: "src/fonts".to_string(),
            output: "fonts".to_string(),
        }
    }
}

/// Icon font generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IconFontConfig {
    pub enabled: bool,
    /// Directory holding the `.svg` icons.
    pub source: String,
    /// `font-family` name, also used as the CSS class prefix.
    pub family: String,
    /// Font output path; `[family]` and `[type]` are substituted.
    pub font: String,
    /// Generated SCSS partial path; `[family]` is substituted.
    pub css: String,
    /// Glob (relative to the project root) selecting the icons.
    pub watch: String,
    /// URL prefix of the font file as seen from the compiled stylesheet.
    pub font_url: String,
    /// First code point assigned, in file-name order.
    pub start_codepoint: u32,
}

impl Default for IconFontConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: "src/iconfont".to_string(),
            family: "iconfont".to_string(),
            font: "src/fonts/[family].[type]".to_string(),
            css: "src/scss/_iconfont_[family].scss".to_string(),
            watch: "src/iconfont/**/*.svg".to_string(),
            font_url: "../fonts/".to_string(),
            start_codepoint: 0xEA01,
        }
    }
}

impl IconFontConfig {
    /// Font path with placeholders substituted for the given font type.
    pub fn font_path(&self, font_type: &str) -> String {
        self.font
            .replace("[family]", &self.family)
            .replace("[type]", font_type)
    }

    /// Stylesheet partial path with placeholders substituted.
    pub fn css_path(&self) -> String {
        self.css.replace("[family]", &self.family)
    }
}

/// Favicon generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaviconConfig {
    pub enabled: bool,
    pub logo: String,
    /// Prefix for every generated file, relative to `output_dir`.
    pub prefix: String,
    /// Application name written into the web manifests.
    pub app_name: String,
    /// Background fill for opaque icon categories.
    pub background: String,
    /// Reuse the previous icon set while logo + options are unchanged.
    pub persistent_cache: bool,
    /// Inject the favicon markup into every generated page.
    pub inject: bool,
    /// Write `<prefix>iconstats.json`.
    pub emit_stats: bool,
    pub icons: FaviconIcons,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            logo: "src/favicon/favicon.png".to_string(),
            prefix: "favicon/".to_string(),
            app_name: String::new(),
            background: "#fff".to_string(),
            persistent_cache: true,
            inject: true,
            emit_stats: false,
            icons: FaviconIcons::default(),
        }
    }
}

/// Per-category favicon switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaviconIcons {
    pub android: bool,
    pub apple_icon: bool,
    pub apple_startup: bool,
    pub coast: bool,
    pub favicons: bool,
    pub firefox: bool,
    pub opengraph: bool,
    pub twitter: bool,
    pub yandex: bool,
    pub windows: bool,
}

impl Default for FaviconIcons {
    fn default() -> Self {
        Self {
            android: true,
            apple_icon: true,
            apple_startup: false,
            coast: true,
            favicons: true,
            firefox: true,
            opengraph: false,
            twitter: true,
            yandex: true,
            windows: false,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into RGBA components.
pub fn parse_hex_color(value: &str) -> Option<[u8; 4]> {
    let hex = value.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 | 8 => {
            let r = channel(&hex[0..2])?;
            let g = channel(&hex[2..4])?;
            let b = channel(&hex[4..6])?;
            let a = if hex.len() == 8 {
                channel(&hex[6..8])?
            } else {
                255
            };
            Some([r, g, b, a])
        }
        _ => None,
    }
}

/// True if `value` is a relative path that cannot climb out of its base.
fn is_contained_relative(value: &str) -> bool {
    let path = Path::new(value);
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

// =============================================================================
// Project: config + root
// =============================================================================

/// A loaded project: the validated config plus the directory it applies to.
///
/// Built once at startup and shared by reference with every task.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: BuildConfig,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: BuildConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Resolve a root-relative config path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path(&self.config.output_dir)
    }

    /// Resolve an output-relative path.
    pub fn output_path(&self, relative: &str) -> PathBuf {
        self.output_dir().join(relative)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIRNAME)
    }
}

/// Load the project at `root`, reading `sitepack.toml` (or `config_file`
/// when given) on top of the stock defaults.
pub fn load_project(root: &Path, config_file: Option<&Path>) -> Result<Project, ConfigError> {
    let overlay = match config_file {
        Some(path) => Some(load_raw_config_file(path)?),
        None => load_raw_config(root)?,
    };
    let config = resolve_config(stock_defaults_value(), overlay)?;
    Ok(Project::new(root, config))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuildConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `sitepack.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    load_raw_config_file(&config_path).map(Some)
}

fn load_raw_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `sitepack.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitepack configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Paths are relative to the project
# root; section `output` paths are relative to output_dir.
# Unknown keys will cause an error.

# Output root. Production builds delete it before writing.
output_dir = "dist"

# ---------------------------------------------------------------------------
# Pages: one <name>.html per template file
# ---------------------------------------------------------------------------
[templates]
dir = "src/html/views"
# Templates may pull raw partials from here with <%= require('...') %>.
includes_dir = "src/html/includes"
# Accepted template extensions. An empty list accepts every file.
extensions = ["html"]

# ---------------------------------------------------------------------------
# Script bundle
# ---------------------------------------------------------------------------
[script]
enabled = true
entry = "src/js/index.js"
output = "js/bundle.js"
source_map = true
# Move /*! ... */ and @license comments into <output>.LICENSE.txt.
extract_comments = true

# ---------------------------------------------------------------------------
# Stylesheet
# ---------------------------------------------------------------------------
[style]
enabled = true
entry = "src/scss/style.scss"
output = "css/style.bundle.css"
# Browserslist queries used for vendor prefixes.
browsers = ["ie >= 10", "last 4 versions"]
source_map = true
load_paths = []

# ---------------------------------------------------------------------------
# Images: copied, then JPEG/PNG compressed in place
# ---------------------------------------------------------------------------
[images]
enabled = true
source = "src/img"
output = "img"
# Lossy quality (0 = worst, 100 = best).
quality = 70

# ---------------------------------------------------------------------------
# Fonts: copied verbatim
# ---------------------------------------------------------------------------
[fonts]
enabled = true
source = "src/fonts"
output = "fonts"

# ---------------------------------------------------------------------------
# Icon font: SVG icons -> font file + SCSS partial
# ---------------------------------------------------------------------------
[iconfont]
enabled = true
source = "src/iconfont"
family = "iconfont"
font = "src/fonts/[family].[type]"
css = "src/scss/_iconfont_[family].scss"
# Icons matching this glob are included; changes to them trigger a rebuild.
watch = "src/iconfont/**/*.svg"
# Font URL prefix as seen from the compiled stylesheet.
font_url = "../fonts/"
start_codepoint = 0xEA01

# ---------------------------------------------------------------------------
# Favicons
# ---------------------------------------------------------------------------
[favicon]
enabled = true
logo = "src/favicon/favicon.png"
prefix = "favicon/"
app_name = ""
background = "#fff"
# Keep the generated set until the logo or these options change.
persistent_cache = true
# Add the favicon <link>/<meta> tags to every page.
inject = true
emit_stats = false

[favicon.icons]
android = true
apple_icon = true
apple_startup = false
coast = true
favicons = true
firefox = true
opengraph = false
twitter = true
yandex = true
windows = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_mirrors_conventional_layout() {
        let config = BuildConfig::default();
        assert_eq!(config.output_dir, "dist");
        assert_eq!(config.templates.dir, "src/html/views");
        assert_eq!(config.script.output, "js/bundle.js");
        assert_eq!(config.style.output, "css/style.bundle.css");
        assert_eq!(config.images.quality, 70);
        assert_eq!(config.favicon.prefix, "favicon/");
    }

    #[test]
    fn default_favicon_categories() {
        let icons = FaviconIcons::default();
        assert!(icons.android && icons.apple_icon && icons.coast && icons.favicons);
        assert!(icons.firefox && icons.twitter && icons.yandex);
        assert!(!icons.apple_startup && !icons.opengraph && !icons.windows);
    }

    #[test]
    fn iconfont_paths_substitute_placeholders() {
        let config = IconFontConfig::default();
        assert_eq!(config.font_path("svg"), "src/fonts/iconfont.svg");
        assert_eq!(config.css_path(), "src/scss/_iconfont_iconfont.scss");
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[images]
quality = 55
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.images.quality, 55);
        // Defaults preserved
        assert_eq!(config.images.source, "src/img");
        assert_eq!(config.fonts.output, "fonts");
    }

    #[test]
    fn parse_hex_start_codepoint() {
        let toml = r#"
[iconfont]
start_codepoint = 0xF101
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.iconfont.start_codepoint, 0xF101);
    }

    #[test]
    fn profile_display_and_production_flag() {
        assert_eq!(BuildProfile::Production.to_string(), "production");
        assert!(BuildProfile::Production.is_production());
        assert!(!BuildProfile::default().is_production());
    }

    // =========================================================================
    // load_project tests
    // =========================================================================

    #[test]
    fn load_project_without_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let project = load_project(tmp.path(), None).unwrap();
        assert_eq!(project.config.output_dir, "dist");
        assert_eq!(project.output_dir(), tmp.path().join("dist"));
        assert_eq!(project.cache_dir(), tmp.path().join(".sitepack-cache"));
    }

    #[test]
    fn load_project_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r##"
output_dir = "public"

[favicon]
background = "#123456"
"##,
        )
        .unwrap();

        let project = load_project(tmp.path(), None).unwrap();
        assert_eq!(project.config.output_dir, "public");
        assert_eq!(project.config.favicon.background, "#123456");
        assert_eq!(project.config.favicon.prefix, "favicon/");
    }

    #[test]
    fn load_project_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("alt.toml");
        fs::write(&path, "[script]\nenabled = false\n").unwrap();
        let project = load_project(tmp.path(), Some(&path)).unwrap();
        assert!(!project.config.script.enabled);
    }

    #[test]
    fn load_project_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();
        let result = load_project(tmp.path(), None);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[images]
source = "src/img"
quality = 70
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[images]\nquality = 40\n").unwrap();
        let merged = merge_toml(base, overlay);
        let images = merged.get("images").unwrap();
        assert_eq!(images.get("quality").unwrap().as_integer(), Some(40));
        assert_eq!(images.get("source").unwrap().as_str(), Some("src/img"));
    }

    #[test]
    fn merge_toml_array_replaced_not_appended() {
        let base: toml::Value = toml::from_str(r#"browsers = ["a", "b"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"browsers = ["c"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("browsers").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<BuildConfig, _> = toml::from_str("[images]\nqualty = 90\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_favicon_category_rejected() {
        let result: Result<BuildConfig, _> = toml::from_str("[favicon.icons]\nandroidd = true\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_too_high() {
        let mut config = BuildConfig::default();
        config.images.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn validate_output_path_cannot_escape() {
        let mut config = BuildConfig::default();
        config.script.output = "../js/bundle.js".to_string();
        assert!(config.validate().is_err());

        let mut config = BuildConfig::default();
        config.style.output = "/css/style.css".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_codepoint_outside_private_use_area() {
        let mut config = BuildConfig::default();
        config.iconfont.start_codepoint = 0x41;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_background_color() {
        let mut config = BuildConfig::default();
        config.favicon.background = "white".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_template_extension_with_dot() {
        let mut config = BuildConfig::default();
        config.templates.extensions = vec![".html".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_project_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[images]\nquality = 200\n").unwrap();
        let result = load_project(tmp.path(), None);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#fff"), Some([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#102030"), Some([16, 32, 48, 255]));
        assert_eq!(parse_hex_color("#10203040"), Some([16, 32, 48, 64]));
        assert_eq!(parse_hex_color("fff"), None);
        assert_eq!(parse_hex_color("#ggg"), None);
        assert_eq!(parse_hex_color("#ffff"), None);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BuildConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BuildConfig::default();
        assert_eq!(config.output_dir, defaults.output_dir);
        assert_eq!(config.style.browsers, defaults.style.browsers);
        assert_eq!(config.iconfont.start_codepoint, 0xEA01);
        assert!(!config.favicon.icons.windows);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for section in [
            "templates",
            "script",
            "style",
            "images",
            "fonts",
            "iconfont",
            "favicon",
            "processing",
        ] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}
